//! Configuration for one context's bridge wiring.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatcher::DispatchMode;
use crate::error::{Error, Result};

/// Bridge configuration for one execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Opaque identity of the script this bridge serves. Blank means
    /// "generate one".
    #[serde(alias = "callerId")]
    pub caller_id: String,

    /// Opaque extension/session identity requests are addressed to.
    #[serde(alias = "originId")]
    pub origin_id: String,

    /// Which context this bridge runs in.
    pub mode: DispatchMode,

    /// Optional bound for calls made through the timeout wrapper. `None`
    /// means calls wait indefinitely.
    #[serde(alias = "callTimeoutMs")]
    pub call_timeout_ms: Option<u64>,

    /// Route injected HTML through the sanitization policy when one exists.
    #[serde(alias = "sanitizeInjectedHtml")]
    pub sanitize_injected_html: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            caller_id: String::new(),
            origin_id: String::new(),
            mode: DispatchMode::PageContext,
            call_timeout_ms: None,
            sanitize_injected_html: true,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration document. A blank caller id
    /// is replaced with a fresh UUID.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        if self.caller_id.trim().is_empty() {
            self.caller_id = Uuid::new_v4().to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.origin_id.trim().is_empty() {
            return Err(Error::validation("origin_id must not be blank"));
        }
        Ok(())
    }

    /// The configured call bound, if any.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}
