//! The call bridge exposed to loaded user scripts.
//!
//! A [`CallDispatcher`] owns the pending-call table for its context and is
//! the only component allowed to touch it. In mediating-context mode it
//! talks to the extension-owned service directly; in page-context mode it
//! posts tagged requests into the page scope and waits for the relay to
//! answer with a matching correlation id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use asupersync::Cx;
use asupersync::channel::oneshot;
use asupersync::time::{timeout, wall_now};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::messages::{CallRequest, Envelope, MessageOrigin, PageMessage, ServiceRequest};
use crate::page_channel::{PageScope, PageScopeReceiver};
use crate::service::ScriptService;

/// Which execution context this dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// The page's own execution context; calls travel through the relay.
    PageContext,
    /// The privileged mediating context; calls reach the service directly.
    MediatingContext,
}

/// What the dispatcher can reach, computed once at construction instead of
/// probing the environment on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeCapabilities {
    pub can_reach_service_directly: bool,
    pub can_use_channel_relay: bool,
}

/// Settled value for one pending call: the result, or the application-level
/// error string.
type CallOutcome = std::result::Result<Value, String>;

struct DispatcherInner {
    next_correlation: u64,
    pending: HashMap<String, oneshot::Sender<CallOutcome>>,
}

/// Asynchronous call bridge for one script in one context.
pub struct CallDispatcher {
    caller_id: String,
    origin_id: String,
    mode: DispatchMode,
    capabilities: BridgeCapabilities,
    service: Option<Arc<dyn ScriptService>>,
    scope: Option<PageScope>,
    inner: Mutex<DispatcherInner>,
}

impl std::fmt::Debug for CallDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallDispatcher")
            .field("caller_id", &self.caller_id)
            .field("origin_id", &self.origin_id)
            .field("mode", &self.mode)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl CallDispatcher {
    /// Mediating-context dispatcher. Passing `None` for the service models
    /// an invalidated extension context: every call rejects immediately.
    #[must_use]
    pub fn direct(
        caller_id: impl Into<String>,
        origin_id: impl Into<String>,
        service: Option<Arc<dyn ScriptService>>,
    ) -> Self {
        let capabilities = BridgeCapabilities {
            can_reach_service_directly: service.is_some(),
            can_use_channel_relay: false,
        };
        Self {
            caller_id: caller_id.into(),
            origin_id: origin_id.into(),
            mode: DispatchMode::MediatingContext,
            capabilities,
            service,
            scope: None,
            inner: Mutex::new(DispatcherInner {
                next_correlation: 0,
                pending: HashMap::new(),
            }),
        }
    }

    /// Page-context dispatcher posting through the given scope.
    #[must_use]
    pub fn relayed(
        caller_id: impl Into<String>,
        origin_id: impl Into<String>,
        scope: Option<PageScope>,
    ) -> Self {
        let capabilities = BridgeCapabilities {
            can_reach_service_directly: false,
            can_use_channel_relay: scope.is_some(),
        };
        Self {
            caller_id: caller_id.into(),
            origin_id: origin_id.into(),
            mode: DispatchMode::PageContext,
            capabilities,
            service: None,
            scope,
            inner: Mutex::new(DispatcherInner {
                next_correlation: 0,
                pending: HashMap::new(),
            }),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> DispatchMode {
        self.mode
    }

    #[must_use]
    pub const fn capabilities(&self) -> BridgeCapabilities {
        self.capabilities
    }

    /// Number of calls still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Perform one privileged call and wait for its result.
    ///
    /// The outgoing payload is augmented with this dispatcher's caller id so
    /// the service can attribute the call without trusting the caller to
    /// identify itself. There is no timeout: a response that never arrives
    /// leaves the call pending for the dispatcher's lifetime (see
    /// [`Self::call_with_timeout`] for the bounded variant).
    pub async fn call(&self, action: &str, payload: Value) -> Result<Value> {
        match self.mode {
            DispatchMode::MediatingContext => self.call_direct(action, payload).await,
            DispatchMode::PageContext => {
                let (_, mut rx) = self.begin_relayed_call(action, payload).await?;
                let cx = Cx::for_request();
                match rx.recv(&cx).await {
                    Ok(outcome) => settle(outcome),
                    Err(_) => Err(Error::transport("Response channel dropped")),
                }
            }
        }
    }

    /// [`Self::call`] bounded by `wait`. On expiry the pending entry is
    /// evicted and the call rejects with a transport error.
    pub async fn call_with_timeout(
        &self,
        action: &str,
        payload: Value,
        wait: Duration,
    ) -> Result<Value> {
        match self.mode {
            DispatchMode::MediatingContext => {
                match timeout(wall_now(), wait, self.call_direct(action, payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::transport(format!("Call {action} timed out"))),
                }
            }
            DispatchMode::PageContext => {
                let (correlation_id, mut rx) = self.begin_relayed_call(action, payload).await?;
                let cx = Cx::for_request();
                match timeout(wall_now(), wait, rx.recv(&cx)).await {
                    Ok(Ok(outcome)) => settle(outcome),
                    Ok(Err(_)) => Err(Error::transport("Response channel dropped")),
                    Err(_) => {
                        self.inner.lock().unwrap().pending.remove(&correlation_id);
                        Err(Error::transport(format!("Call {action} timed out")))
                    }
                }
            }
        }
    }

    /// Post a fire-and-forget error report on behalf of the calling script.
    pub async fn report_error(&self, error: impl Into<String>) -> Result<()> {
        let report = crate::messages::ErrorReport {
            caller_id: self.caller_id.clone(),
            error: error.into(),
        };
        match self.mode {
            DispatchMode::MediatingContext => {
                let Some(service) = &self.service else {
                    return Err(Error::TransportUnavailable);
                };
                service.report_error(report).await
            }
            DispatchMode::PageContext => {
                let Some(scope) = &self.scope else {
                    return Err(Error::TransportUnavailable);
                };
                scope
                    .post(MessageOrigin::PageScope, PageMessage::ErrorReport(report))
                    .await;
                Ok(())
            }
        }
    }

    /// Settle the matching pending call for an incoming scope message.
    ///
    /// Returns `true` when a pending call was settled. Every failing
    /// validation (foreign-frame origin, non-response message, origin-id
    /// mismatch, unknown correlation id) ignores the message silently so
    /// unrelated postings cannot corrupt unrelated state. Removing the
    /// entry here is the only place one is ever removed on the response
    /// path, so each call settles at most once.
    pub fn handle_message(&self, envelope: &Envelope) -> bool {
        if envelope.origin != MessageOrigin::PageScope {
            tracing::trace!("Ignoring message from foreign frame");
            return false;
        }
        let PageMessage::CallResponse(response) = &envelope.message else {
            return false;
        };
        if response.origin_id != self.origin_id {
            tracing::trace!(
                origin_id = %response.origin_id,
                "Ignoring response for a different origin"
            );
            return false;
        }

        let sender = {
            let mut guard = self.inner.lock().unwrap();
            guard.pending.remove(&response.correlation_id)
        };
        let Some(sender) = sender else {
            tracing::trace!(
                correlation_id = %response.correlation_id,
                "Ignoring response with no pending call"
            );
            return false;
        };

        let outcome = response.error.clone().map_or_else(
            || Ok(response.result.clone().unwrap_or(Value::Null)),
            Err,
        );
        let cx = Cx::for_request();
        if sender.send(&cx, outcome).is_err() {
            tracing::trace!(
                correlation_id = %response.correlation_id,
                "Pending call abandoned before its response arrived"
            );
        }
        true
    }

    /// Listener loop feeding [`Self::handle_message`] until the scope closes.
    pub async fn run(&self, mut receiver: PageScopeReceiver) {
        let cx = Cx::for_request();
        while let Ok(envelope) = receiver.recv(&cx).await {
            self.handle_message(&envelope);
        }
    }

    async fn call_direct(&self, action: &str, payload: Value) -> Result<Value> {
        let Some(service) = &self.service else {
            return Err(Error::TransportUnavailable);
        };
        let request = ServiceRequest {
            action: action.to_string(),
            caller_id: self.caller_id.clone(),
            payload: self.augment_payload(payload),
        };
        let response = service.invoke(request).await?;
        if let Some(error) = response.error {
            return Err(Error::Application(error));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn begin_relayed_call(
        &self,
        action: &str,
        payload: Value,
    ) -> Result<(String, oneshot::Receiver<CallOutcome>)> {
        let Some(scope) = &self.scope else {
            return Err(Error::TransportUnavailable);
        };

        let (tx, rx) = oneshot::channel();
        let correlation_id = {
            let mut guard = self.inner.lock().unwrap();
            guard.next_correlation += 1;
            let correlation_id = format!("{}:{}", self.caller_id, guard.next_correlation);
            guard.pending.insert(correlation_id.clone(), tx);
            correlation_id
        };

        let request = CallRequest {
            caller_id: self.caller_id.clone(),
            origin_id: self.origin_id.clone(),
            correlation_id: correlation_id.clone(),
            action: action.to_string(),
            payload: self.augment_payload(payload),
        };
        scope
            .post(MessageOrigin::PageScope, PageMessage::CallRequest(request))
            .await;
        Ok((correlation_id, rx))
    }

    /// Attach the caller id to an outgoing payload. Objects gain (or have
    /// overwritten) a `caller_id` field; anything else is carried as-is
    /// since [`CallRequest`] and [`ServiceRequest`] both name the caller
    /// separately.
    fn augment_payload(&self, payload: Value) -> Value {
        match payload {
            Value::Object(mut map) => {
                map.insert("caller_id".to_string(), Value::String(self.caller_id.clone()));
                Value::Object(map)
            }
            other => other,
        }
    }
}

fn settle(outcome: CallOutcome) -> Result<Value> {
    outcome.map_err(Error::Application)
}
