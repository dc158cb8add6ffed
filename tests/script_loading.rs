//! Injection pipeline scenarios: resolver output fed through the loader
//! with sanitization in place.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pagebridge::{
    ExternalScriptLoader, PolicyCell, ResourceDeclaration, ResourceResolver, SanitizationPolicy,
    ScriptHost,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingHost {
    appended: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn appended(&self) -> Vec<String> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptHost for RecordingHost {
    async fn append_script(&self, url: &str) -> Result<(), String> {
        self.appended.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

fn block_on<T>(future: impl Future<Output = T>) -> T {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let runtime = asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("runtime build");
    runtime.block_on(future)
}

#[test]
fn declared_requires_load_in_declaration_order() {
    block_on(async {
        let declarations = vec![
            ResourceDeclaration {
                name: "dep".to_string(),
                source_url: Some("http://cdn.example/dep.js".to_string()),
            },
            ResourceDeclaration {
                name: "main".to_string(),
                source_url: Some("https://cdn.example/main.js".to_string()),
            },
        ];
        let resolver = ResourceResolver::from_declarations(&declarations, &HashMap::new());

        let urls = ["dep", "main"]
            .into_iter()
            .map(|name| resolver.url(name).expect("declared url"))
            .collect::<Vec<_>>();

        let host = Arc::new(RecordingHost::default());
        let loader =
            ExternalScriptLoader::new(host.clone() as Arc<dyn ScriptHost>, PolicyCell::with_default());
        loader.load_scripts(&urls).await.expect("load all");

        // Declaration order preserved, http upgraded on the way in.
        assert_eq!(
            host.appended(),
            vec!["https://cdn.example/dep.js", "https://cdn.example/main.js"]
        );
    });
}

#[test]
fn text_backed_resources_inject_as_data_urls() {
    block_on(async {
        let declarations = vec![ResourceDeclaration {
            name: "inline".to_string(),
            source_url: Some("https://cdn.example/inline.js".to_string()),
        }];
        let mut texts = HashMap::new();
        texts.insert("inline".to_string(), "console.log(1)".to_string());
        let resolver = ResourceResolver::from_declarations(&declarations, &texts);

        let url = resolver.url("inline").expect("data url");
        assert!(url.starts_with("data:text/javascript;base64,"));

        let host = Arc::new(RecordingHost::default());
        let loader =
            ExternalScriptLoader::new(host.clone() as Arc<dyn ScriptHost>, PolicyCell::with_default());
        loader.load_script(&url).await.expect("load data url");
        assert_eq!(host.appended(), vec![url]);
    });
}

#[test]
fn repeated_loads_across_scripts_sharing_a_dependency_inject_once() {
    block_on(async {
        let host = Arc::new(RecordingHost::default());
        let loader =
            ExternalScriptLoader::new(host.clone() as Arc<dyn ScriptHost>, PolicyCell::with_default());

        let first_script = vec![
            "https://cdn.example/shared.js".to_string(),
            "https://cdn.example/one.js".to_string(),
        ];
        let second_script = vec![
            "https://cdn.example/shared.js".to_string(),
            "https://cdn.example/two.js".to_string(),
        ];
        loader.load_scripts(&first_script).await.unwrap();
        loader.load_scripts(&second_script).await.unwrap();

        assert_eq!(
            host.appended(),
            vec![
                "https://cdn.example/shared.js",
                "https://cdn.example/one.js",
                "https://cdn.example/two.js",
            ]
        );
    });
}

#[test]
fn sanitized_html_is_safe_to_embed_next_to_injected_scripts() {
    let policy = SanitizationPolicy::new();
    let cleaned =
        policy.sanitize_html("<script>bad()</script>hello<div onclick='x()'>world</div>");
    assert_eq!(cleaned, "hello<div>world</div>");
}
