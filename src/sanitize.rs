//! Best-effort content sanitization required by a strict content-security
//! policy.
//!
//! The HTML pass strips the injection vectors this system itself produces
//! (`<script>` blocks, inline `on*` handlers, `javascript:` references); it
//! is not a general-purpose sanitizer. The script and script-URL passes are
//! identity transforms: the policy exists to satisfy the platform
//! requirement, not to add a trust boundary.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::Result;

fn script_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script regex"))
}

fn event_handler_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\son\w+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("handler regex")
    })
}

fn javascript_scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)javascript:").expect("scheme regex"))
}

/// A live sanitization policy for one context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizationPolicy;

impl SanitizationPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Strip `<script>` blocks, inline event handlers, and
    /// `javascript:`-scheme references.
    #[must_use]
    pub fn sanitize_html(&self, html: &str) -> String {
        let without_scripts = script_block_regex().replace_all(html, "");
        let without_handlers = event_handler_regex().replace_all(&without_scripts, "");
        javascript_scheme_regex()
            .replace_all(&without_handlers, "")
            .into_owned()
    }

    /// Identity transform for inline script content.
    #[must_use]
    pub fn create_script<'a>(&self, source: &'a str) -> &'a str {
        source
    }

    /// Identity transform for script URLs, consumed by the loader.
    #[must_use]
    pub fn create_script_url<'a>(&self, url: &'a str) -> &'a str {
        url
    }
}

/// Host capability that creates the policy. Absent when the platform offers
/// no policy support; may fail on first use.
pub type PolicyFactory = Arc<dyn Fn() -> Result<SanitizationPolicy> + Send + Sync>;

/// Lazily creates the context's policy at most once.
///
/// After a failed creation attempt the policy is permanently absent for this
/// cell's lifetime; there is no retry. Owned by whichever object drives
/// content injection for the context, never ambient global state.
pub struct PolicyCell {
    factory: Option<PolicyFactory>,
    cell: OnceLock<Option<Arc<SanitizationPolicy>>>,
}

impl std::fmt::Debug for PolicyCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyCell")
            .field("has_factory", &self.factory.is_some())
            .field("initialized", &self.cell.get().is_some())
            .finish()
    }
}

impl PolicyCell {
    #[must_use]
    pub fn new(factory: Option<PolicyFactory>) -> Self {
        Self {
            factory,
            cell: OnceLock::new(),
        }
    }

    /// Cell backed by the built-in policy, which always constructs.
    #[must_use]
    pub fn with_default() -> Self {
        Self::new(Some(Arc::new(|| Ok(SanitizationPolicy::new()))))
    }

    /// Cell for a context with no sanitization capability at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// The context's policy, creating it on first use. `None` when the
    /// capability is absent or creation failed.
    #[must_use]
    pub fn get(&self) -> Option<Arc<SanitizationPolicy>> {
        self.cell
            .get_or_init(|| {
                let factory = self.factory.as_ref()?;
                match factory() {
                    Ok(policy) => Some(Arc::new(policy)),
                    Err(err) => {
                        tracing::warn!(error = %err, "Sanitization policy creation failed; continuing without one");
                        None
                    }
                }
            })
            .clone()
    }
}

impl Default for PolicyCell {
    fn default() -> Self {
        Self::with_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn strips_script_blocks_and_event_handlers() {
        let policy = SanitizationPolicy::new();
        let cleaned = policy.sanitize_html("<script>bad()</script>hello<div onclick='x()'>");
        assert!(cleaned.contains("hello"));
        assert!(!cleaned.contains("<script"));
        assert!(!cleaned.contains("onclick"));
        assert!(cleaned.contains("<div"));
    }

    #[test]
    fn strips_multiline_and_mixed_case_scripts() {
        let policy = SanitizationPolicy::new();
        let html = "before<SCRIPT type=\"text/javascript\">\nevil();\n</Script >after";
        assert_eq!(policy.sanitize_html(html), "beforeafter");
    }

    #[test]
    fn script_stripping_is_non_greedy_across_multiple_blocks() {
        let policy = SanitizationPolicy::new();
        let html = "<script>a()</script>keep<script>b()</script>";
        assert_eq!(policy.sanitize_html(html), "keep");
    }

    #[test]
    fn strips_javascript_scheme_references() {
        let policy = SanitizationPolicy::new();
        let cleaned = policy.sanitize_html("<a href=\"JavaScript:steal()\">link</a>");
        assert!(!cleaned.to_ascii_lowercase().contains("javascript:"));
        assert!(cleaned.contains("link"));
    }

    #[test]
    fn script_and_url_passes_are_identity() {
        let policy = SanitizationPolicy::new();
        assert_eq!(policy.create_script("let x = 1;"), "let x = 1;");
        assert_eq!(
            policy.create_script_url("https://a/x.js"),
            "https://a/x.js"
        );
    }

    #[test]
    fn absent_capability_means_no_policy() {
        let cell = PolicyCell::disabled();
        assert!(cell.get().is_none());
        assert!(cell.get().is_none());
    }

    #[test]
    fn failed_creation_is_permanent_and_never_retried() {
        static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);
        let cell = PolicyCell::new(Some(Arc::new(|| {
            ATTEMPTS.fetch_add(1, Ordering::SeqCst);
            Err(Error::validation("host refused policy creation"))
        })));

        assert!(cell.get().is_none());
        assert!(cell.get().is_none());
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn successful_creation_happens_exactly_once() {
        static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);
        let cell = PolicyCell::new(Some(Arc::new(|| {
            ATTEMPTS.fetch_add(1, Ordering::SeqCst);
            Ok(SanitizationPolicy::new())
        })));

        assert!(cell.get().is_some());
        assert!(cell.get().is_some());
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 1);
    }
}
