//! Resource resolution for a script's declared external resources.
//!
//! A [`ResourceResolver`] is built once from a script's declarations and is
//! immutable afterwards. When text content is available it is preferred over
//! the network: `url` synthesizes a base64 data URL so the resource stays
//! usable even when the original address is unreachable or blocked by
//! policy.

use std::collections::HashMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// One declared resource: `{name, sourceUrl}` as supplied by the script
/// descriptor provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDeclaration {
    pub name: String,
    #[serde(default, alias = "sourceUrl")]
    pub source_url: Option<String>,
}

/// A declared resource plus whatever text content was fetched for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceEntry {
    pub source_url: Option<String>,
    pub text: Option<String>,
}

/// Maps a script's declared resource names to usable text/URL values.
#[derive(Debug, Clone, Default)]
pub struct ResourceResolver {
    entries: HashMap<String, ResourceEntry>,
}

impl ResourceResolver {
    #[must_use]
    pub fn new(entries: HashMap<String, ResourceEntry>) -> Self {
        Self { entries }
    }

    /// Build a resolver from a script's declaration list plus its
    /// name-to-text content map.
    #[must_use]
    pub fn from_declarations(
        declarations: &[ResourceDeclaration],
        texts: &HashMap<String, String>,
    ) -> Self {
        let entries = declarations
            .iter()
            .map(|declaration| {
                let entry = ResourceEntry {
                    source_url: declaration.source_url.clone(),
                    text: texts.get(&declaration.name).cloned(),
                };
                (declaration.name.clone(), entry)
            })
            .collect();
        Self { entries }
    }

    /// Declared text content, verbatim.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.entries.get(name)?.text.as_deref()
    }

    /// A retrievable URL for the resource.
    ///
    /// Text content wins: it is wrapped into `data:<mime>;base64,<encoded>`
    /// with the MIME type inferred from the declared source URL's suffix.
    /// Without text the declared source URL is returned unchanged; without
    /// either there is nothing to return.
    #[must_use]
    pub fn url(&self, name: &str) -> Option<String> {
        let entry = self.entries.get(name)?;
        if let Some(text) = &entry.text {
            let mime = mime_for_url(entry.source_url.as_deref().unwrap_or_default());
            let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
            return Some(format!("data:{mime};base64,{encoded}"));
        }
        entry.source_url.clone()
    }
}

/// Infer a MIME type from a URL's file-extension suffix, case-insensitively.
fn mime_for_url(url: &str) -> &'static str {
    let suffix = url
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match suffix.as_str() {
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver() -> ResourceResolver {
        let declarations = vec![
            ResourceDeclaration {
                name: "theme".to_string(),
                source_url: Some("https://cdn.example/styles/THEME.CSS".to_string()),
            },
            ResourceDeclaration {
                name: "remote-only".to_string(),
                source_url: Some("https://cdn.example/lib.js".to_string()),
            },
            ResourceDeclaration {
                name: "no-suffix".to_string(),
                source_url: Some("https://cdn.example/blob".to_string()),
            },
        ];
        let mut texts = HashMap::new();
        texts.insert("theme".to_string(), "body { color: red }".to_string());
        texts.insert("no-suffix".to_string(), "opaque".to_string());
        ResourceResolver::from_declarations(&declarations, &texts)
    }

    #[test]
    fn text_is_returned_verbatim() {
        let resolver = resolver();
        assert_eq!(resolver.text("theme"), Some("body { color: red }"));
        assert_eq!(resolver.text("remote-only"), None);
        assert_eq!(resolver.text("missing"), None);
    }

    #[test]
    fn url_synthesizes_a_css_data_url_from_text() {
        let resolver = resolver();
        let url = resolver.url("theme").expect("url");
        assert!(url.starts_with("data:text/css;base64,"), "got {url}");

        let encoded = url.rsplit(',').next().unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .expect("valid base64");
        assert_eq!(decoded, b"body { color: red }");
    }

    #[test]
    fn url_falls_back_to_the_declared_source_url() {
        let resolver = resolver();
        assert_eq!(
            resolver.url("remote-only").as_deref(),
            Some("https://cdn.example/lib.js")
        );
    }

    #[test]
    fn url_is_absent_for_undeclared_names() {
        assert_eq!(resolver().url("missing"), None);
    }

    #[test]
    fn unknown_suffix_defaults_to_octet_stream() {
        let resolver = resolver();
        let url = resolver.url("no-suffix").expect("url");
        assert!(url.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn mime_inference_is_case_insensitive() {
        assert_eq!(mime_for_url("https://a/x.Js"), "text/javascript");
        assert_eq!(mime_for_url("https://a/x.HTM"), "text/html");
        assert_eq!(mime_for_url("https://a/x.svg"), "image/svg+xml");
        assert_eq!(mime_for_url(""), "application/octet-stream");
    }

    #[test]
    fn entry_without_text_or_url_resolves_to_nothing() {
        let mut entries = HashMap::new();
        entries.insert("empty".to_string(), ResourceEntry::default());
        let resolver = ResourceResolver::new(entries);
        assert_eq!(resolver.url("empty"), None);
        assert_eq!(resolver.text("empty"), None);
    }
}
