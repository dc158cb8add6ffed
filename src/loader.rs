//! Sequential, deduplicated injection of external script URLs.
//!
//! Dependent scripts assume their predecessors have already executed, so
//! [`ExternalScriptLoader::load_scripts`] never starts a URL before the
//! previous one has settled. Dedup is by exact URL string; two
//! differently-written but equivalent URLs count as distinct.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::sanitize::PolicyCell;

/// Page-DOM seam for script injection.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Append a script element for `url` in document order — the element
    /// must not be marked for out-of-order/async execution — and resolve
    /// once its load event fires. The error event surfaces as an `Err`
    /// carrying the host's message.
    async fn append_script(&self, url: &str) -> std::result::Result<(), String>;
}

/// Injects external scripts into one page context.
pub struct ExternalScriptLoader {
    host: Arc<dyn ScriptHost>,
    policy: PolicyCell,
    loaded: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for ExternalScriptLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalScriptLoader")
            .field("loaded", &self.loaded.lock().unwrap().len())
            .finish_non_exhaustive()
    }
}

impl ExternalScriptLoader {
    #[must_use]
    pub fn new(host: Arc<dyn ScriptHost>, policy: PolicyCell) -> Self {
        Self {
            host,
            policy,
            loaded: Mutex::new(HashSet::new()),
        }
    }

    /// Whether `url` (exact string) has already been injected.
    #[must_use]
    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.lock().unwrap().contains(url)
    }

    /// Inject one script URL, resolving once it has loaded.
    ///
    /// Already-loaded URLs resolve immediately without re-injecting. An
    /// `http://` scheme is upgraded to `https://` before injection. The URL
    /// is recorded as loaded only after the injection settles successfully,
    /// so a failed load can be retried. Overlapping calls for the same URL
    /// issued before either has recorded completion can both inject.
    pub async fn load_script(&self, url: &str) -> Result<()> {
        if self.is_loaded(url) {
            tracing::trace!(url, "Script already loaded; skipping");
            return Ok(());
        }

        let upgraded = upgrade_scheme(url);
        let inject_url = self.policy.get().map_or_else(
            || upgraded.clone(),
            |policy| policy.create_script_url(&upgraded).to_string(),
        );

        self.host
            .append_script(&inject_url)
            .await
            .map_err(|message| Error::script_load(url, message))?;

        self.loaded.lock().unwrap().insert(url.to_string());
        Ok(())
    }

    /// Inject every URL strictly in input order, awaiting each load before
    /// starting the next.
    pub async fn load_scripts(&self, urls: &[String]) -> Result<()> {
        for url in urls {
            self.load_script(url).await?;
        }
        Ok(())
    }
}

/// Upgrade a case-insensitive `http://` prefix to `https://`. Everything
/// else passes through untouched.
fn upgrade_scheme(url: &str) -> String {
    match url.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("http://") => {
            format!("https://{}", &url[7..])
        }
        _ => url.to_string(),
    }
}
