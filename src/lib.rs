//! pagebridge — cross-context call bridge for a userscript host extension.
//!
//! Untrusted scripts running inside a hosted web page invoke privileged
//! operations (storage, clipboard, notifications, HTTP, resource loading)
//! that only a privileged extension-owned service may perform. This crate
//! implements the core that carries those calls:
//!
//! - [`dispatcher::CallDispatcher`] — the asynchronous call bridge and its
//!   request/response correlation table
//! - [`relay::RelayAgent`] — the mediating-context relay to the service
//! - [`loader::ExternalScriptLoader`] — ordered, deduplicated script
//!   injection
//! - [`resources::ResourceResolver`] — declared-resource to URL resolution
//! - [`sanitize::SanitizationPolicy`] — best-effort content sanitization
//!
//! Everything UI-, packaging-, and persistence-shaped lives outside this
//! crate; the [`service::ScriptService`] trait is the seam to the
//! extension-owned backend.

#![forbid(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod loader;
pub mod messages;
pub mod page_channel;
pub mod relay;
pub mod resources;
pub mod sanitize;
pub mod service;

pub use config::BridgeConfig;
pub use dispatcher::{BridgeCapabilities, CallDispatcher, DispatchMode};
pub use error::{Error, Result};
pub use loader::{ExternalScriptLoader, ScriptHost};
pub use messages::{CallRequest, CallResponse, Envelope, ErrorReport, MessageOrigin, PageMessage};
pub use page_channel::{PageScope, PageScopeReceiver};
pub use relay::RelayAgent;
pub use resources::{ResourceDeclaration, ResourceEntry, ResourceResolver};
pub use sanitize::{PolicyCell, SanitizationPolicy};
pub use service::{MemoryScriptService, ScriptService, ServiceAction};
