//! Mediating-context relay between the page scope and the service.
//!
//! One [`RelayAgent`] runs per mediating context. It consumes page-origin
//! call requests addressed to its origin id, forwards them to the
//! extension-owned service, and posts the correlated response back into the
//! page scope. Fire-and-forget error reports are forwarded without any
//! acknowledgment.

use std::sync::Arc;

use asupersync::Cx;

use crate::messages::{
    CallRequest, CallResponse, Envelope, ErrorReport, MessageOrigin, PageMessage, ServiceRequest,
};
use crate::page_channel::{PageScope, PageScopeReceiver};
use crate::service::ScriptService;

/// Relays page-originated requests to the extension-owned service.
pub struct RelayAgent {
    origin_id: String,
    scope: PageScope,
    service: Option<Arc<dyn ScriptService>>,
}

impl std::fmt::Debug for RelayAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayAgent")
            .field("origin_id", &self.origin_id)
            .field("has_service", &self.service.is_some())
            .finish_non_exhaustive()
    }
}

impl RelayAgent {
    /// Passing `None` for the service models an invalidated extension
    /// context: every request is answered with an error response instead of
    /// being forwarded, so page-side calls never hang for that case.
    #[must_use]
    pub fn new(
        origin_id: impl Into<String>,
        scope: PageScope,
        service: Option<Arc<dyn ScriptService>>,
    ) -> Self {
        Self {
            origin_id: origin_id.into(),
            scope,
            service,
        }
    }

    /// Consume scope messages until the scope closes.
    pub async fn run(&self, mut receiver: PageScopeReceiver) {
        let cx = Cx::for_request();
        while let Ok(envelope) = receiver.recv(&cx).await {
            self.handle_envelope(envelope).await;
        }
    }

    /// Process one scope message. Returns `true` when the message was a
    /// request or report for this relay; everything else (including the
    /// relay's own reflected responses) is ignored.
    pub async fn handle_envelope(&self, envelope: Envelope) -> bool {
        if envelope.origin != MessageOrigin::PageScope {
            tracing::trace!("Ignoring message from foreign frame");
            return false;
        }
        match envelope.message {
            PageMessage::CallRequest(request) if request.origin_id == self.origin_id => {
                self.handle_request(request).await;
                true
            }
            PageMessage::ErrorReport(report) => {
                self.forward_report(report).await;
                true
            }
            PageMessage::CallRequest(_) | PageMessage::CallResponse(_) => false,
        }
    }

    async fn handle_request(&self, request: CallRequest) {
        let CallRequest {
            caller_id,
            origin_id,
            correlation_id,
            action,
            payload,
        } = request;

        let response = match &self.service {
            None => CallResponse::err(
                origin_id,
                correlation_id,
                "Messaging capability unavailable in the mediating context",
            ),
            Some(service) => {
                let service_request = ServiceRequest {
                    action,
                    caller_id,
                    payload,
                };
                match service.invoke(service_request).await {
                    // Transport failure outranks anything the service might
                    // also have put in the response.
                    Err(err) => CallResponse::err(origin_id, correlation_id, err.to_string()),
                    Ok(answer) => match answer.error {
                        Some(error) => CallResponse::err(origin_id, correlation_id, error),
                        None => CallResponse::ok(origin_id, correlation_id, answer.result),
                    },
                }
            }
        };

        self.scope
            .post(MessageOrigin::PageScope, PageMessage::CallResponse(response))
            .await;
    }

    async fn forward_report(&self, report: ErrorReport) {
        let Some(service) = &self.service else {
            tracing::debug!("Dropping error report: no service available");
            return;
        };
        if let Err(err) = service.report_error(report).await {
            tracing::debug!(error = %err, "Error report forwarding failed");
        }
    }
}
