//! Extension-owned service contract and the closed action catalog.
//!
//! The service is the privileged backend that actually performs storage,
//! network, clipboard, and notification work. The catalog of actions it
//! accepts is closed: anything outside [`ServiceAction`] must be rejected
//! with an explicit application error, never passed through silently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;
use crate::messages::{ErrorReport, ServiceRequest, ServiceResponse};

/// The closed catalog of privileged actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    /// Read one key from the caller's persistent store.
    ValueGet,
    /// Write one key into the caller's persistent store.
    ValueSet,
    /// Delete one key from the caller's persistent store.
    ValueDelete,
    /// List the keys in the caller's persistent store.
    ValueList,
    /// Resolve a declared resource name to a retrievable URL.
    ResourceUrl,
    /// Show a desktop notification.
    Notification,
    /// Open a browser tab.
    OpenTab,
    /// Register a menu command for the calling script.
    RegisterMenuCommand,
    /// Replace the clipboard contents.
    SetClipboard,
    /// Perform an outbound HTTP request on the caller's behalf.
    HttpRequest,
}

/// Every catalog member, for exhaustive iteration in tests.
pub const SERVICE_ACTIONS: [ServiceAction; 10] = [
    ServiceAction::ValueGet,
    ServiceAction::ValueSet,
    ServiceAction::ValueDelete,
    ServiceAction::ValueList,
    ServiceAction::ResourceUrl,
    ServiceAction::Notification,
    ServiceAction::OpenTab,
    ServiceAction::RegisterMenuCommand,
    ServiceAction::SetClipboard,
    ServiceAction::HttpRequest,
];

impl ServiceAction {
    /// Parse a wire tag. Returns `None` for tags outside the catalog.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "value_get" => Some(Self::ValueGet),
            "value_set" => Some(Self::ValueSet),
            "value_delete" => Some(Self::ValueDelete),
            "value_list" => Some(Self::ValueList),
            "resource_url" => Some(Self::ResourceUrl),
            "notification" => Some(Self::Notification),
            "open_tab" => Some(Self::OpenTab),
            "register_menu_command" => Some(Self::RegisterMenuCommand),
            "set_clipboard" => Some(Self::SetClipboard),
            "http_request" => Some(Self::HttpRequest),
            _ => None,
        }
    }

    /// Wire tag for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValueGet => "value_get",
            Self::ValueSet => "value_set",
            Self::ValueDelete => "value_delete",
            Self::ValueList => "value_list",
            Self::ResourceUrl => "resource_url",
            Self::Notification => "notification",
            Self::OpenTab => "open_tab",
            Self::RegisterMenuCommand => "register_menu_command",
            Self::SetClipboard => "set_clipboard",
            Self::HttpRequest => "http_request",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract for the extension-owned service.
///
/// `invoke` returning `Err` is a transport-level failure; an `error` field
/// inside an `Ok` response is an application-level failure. Transport
/// failures take precedence when both could apply.
#[async_trait]
pub trait ScriptService: Send + Sync {
    /// Perform one privileged call and answer with exactly one of
    /// `{result}` or `{error}`.
    async fn invoke(&self, request: ServiceRequest) -> Result<ServiceResponse>;

    /// Accept a fire-and-forget error report. No acknowledgment is relayed
    /// back to the page.
    async fn report_error(&self, report: ErrorReport) -> Result<()>;
}

#[derive(Default)]
struct MemoryServiceInner {
    values: HashMap<String, BTreeMap<String, Value>>,
    resource_urls: HashMap<String, String>,
    http_responses: HashMap<String, Value>,
    notifications: Vec<Value>,
    opened_tabs: Vec<String>,
    menu_commands: Vec<(String, String)>,
    clipboard: Option<String>,
    reports: Vec<ErrorReport>,
}

/// In-memory reference implementation of [`ScriptService`].
///
/// Stores values per caller id, records side-effecting actions for
/// inspection, and answers HTTP requests from a canned response table.
#[derive(Default)]
pub struct MemoryScriptService {
    inner: Mutex<MemoryServiceInner>,
}

impl MemoryScriptService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the URL answered for a `resource_url` call.
    pub fn register_resource_url(&self, name: impl Into<String>, url: impl Into<String>) {
        let mut guard = self.inner.lock().unwrap();
        guard.resource_urls.insert(name.into(), url.into());
    }

    /// Register the canned body answered for an `http_request` to `url`.
    pub fn register_http_response(&self, url: impl Into<String>, body: Value) {
        let mut guard = self.inner.lock().unwrap();
        guard.http_responses.insert(url.into(), body);
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Value> {
        self.inner.lock().unwrap().notifications.clone()
    }

    #[must_use]
    pub fn opened_tabs(&self) -> Vec<String> {
        self.inner.lock().unwrap().opened_tabs.clone()
    }

    #[must_use]
    pub fn menu_commands(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().menu_commands.clone()
    }

    #[must_use]
    pub fn clipboard(&self) -> Option<String> {
        self.inner.lock().unwrap().clipboard.clone()
    }

    #[must_use]
    pub fn reported_errors(&self) -> Vec<ErrorReport> {
        self.inner.lock().unwrap().reports.clone()
    }

    fn handle(&self, action: ServiceAction, request: &ServiceRequest) -> ServiceResponse {
        let mut guard = self.inner.lock().unwrap();
        let payload = &request.payload;
        match action {
            ServiceAction::ValueGet => {
                let Some(key) = payload.get("key").and_then(Value::as_str) else {
                    return ServiceResponse::err("value_get requires a key");
                };
                let value = guard
                    .values
                    .get(&request.caller_id)
                    .and_then(|store| store.get(key))
                    .cloned();
                ServiceResponse::ok(Some(value.unwrap_or(Value::Null)))
            }
            ServiceAction::ValueSet => {
                let Some(key) = payload.get("key").and_then(Value::as_str) else {
                    return ServiceResponse::err("value_set requires a key");
                };
                let value = payload.get("value").cloned().unwrap_or(Value::Null);
                guard
                    .values
                    .entry(request.caller_id.clone())
                    .or_default()
                    .insert(key.to_string(), value);
                ServiceResponse::ok(None)
            }
            ServiceAction::ValueDelete => {
                let Some(key) = payload.get("key").and_then(Value::as_str) else {
                    return ServiceResponse::err("value_delete requires a key");
                };
                if let Some(store) = guard.values.get_mut(&request.caller_id) {
                    store.remove(key);
                }
                ServiceResponse::ok(None)
            }
            ServiceAction::ValueList => {
                let keys = guard
                    .values
                    .get(&request.caller_id)
                    .map(|store| store.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();
                ServiceResponse::ok(Some(json!(keys)))
            }
            ServiceAction::ResourceUrl => {
                let Some(name) = payload.get("name").and_then(Value::as_str) else {
                    return ServiceResponse::err("resource_url requires a name");
                };
                guard.resource_urls.get(name).map_or_else(
                    || ServiceResponse::err(format!("Unknown resource: {name}")),
                    |url| ServiceResponse::ok(Some(json!(url))),
                )
            }
            ServiceAction::Notification => {
                guard.notifications.push(payload.clone());
                ServiceResponse::ok(None)
            }
            ServiceAction::OpenTab => {
                let Some(url) = payload.get("url").and_then(Value::as_str) else {
                    return ServiceResponse::err("open_tab requires a url");
                };
                guard.opened_tabs.push(url.to_string());
                ServiceResponse::ok(Some(json!({ "url": url })))
            }
            ServiceAction::RegisterMenuCommand => {
                let Some(caption) = payload.get("caption").and_then(Value::as_str) else {
                    return ServiceResponse::err("register_menu_command requires a caption");
                };
                guard
                    .menu_commands
                    .push((request.caller_id.clone(), caption.to_string()));
                ServiceResponse::ok(None)
            }
            ServiceAction::SetClipboard => {
                let Some(text) = payload.get("text").and_then(Value::as_str) else {
                    return ServiceResponse::err("set_clipboard requires text");
                };
                guard.clipboard = Some(text.to_string());
                ServiceResponse::ok(None)
            }
            ServiceAction::HttpRequest => {
                let Some(url) = payload.get("url").and_then(Value::as_str) else {
                    return ServiceResponse::err("http_request requires a url");
                };
                guard.http_responses.get(url).map_or_else(
                    || ServiceResponse::err(format!("No response recorded for {url}")),
                    |body| ServiceResponse::ok(Some(body.clone())),
                )
            }
        }
    }
}

#[async_trait]
impl ScriptService for MemoryScriptService {
    async fn invoke(&self, request: ServiceRequest) -> Result<ServiceResponse> {
        let Some(action) = ServiceAction::parse(&request.action) else {
            return Ok(ServiceResponse::err(format!(
                "Unknown action: {}",
                request.action
            )));
        };
        Ok(self.handle(action, &request))
    }

    async fn report_error(&self, report: ErrorReport) -> Result<()> {
        self.inner.lock().unwrap().reports.push(report);
        Ok(())
    }
}
