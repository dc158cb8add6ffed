//! In-process model of the page's global message scope.
//!
//! Both the page-context dispatcher and the mediating-context relay attach
//! to the same [`PageScope`]; a posted message is delivered to every
//! attached listener, mirroring message events on a shared global object.
//! Listeners therefore also see their own postings and must filter by
//! message type and origin id.

use std::sync::{Arc, Mutex};

use asupersync::Cx;
use asupersync::channel::mpsc;

use crate::messages::{Envelope, MessageOrigin, PageMessage};

/// Channel depth per attached listener.
const SCOPE_CHANNEL_CAPACITY: usize = 16;

/// Receiver half handed to an attached listener.
pub type PageScopeReceiver = mpsc::Receiver<Envelope>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, mpsc::Sender<Envelope>)>,
}

/// A shared message scope. Cloning yields another handle to the same scope.
#[derive(Clone, Default)]
pub struct PageScope {
    listeners: Arc<Mutex<Listeners>>,
}

impl std::fmt::Debug for PageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageScope").finish_non_exhaustive()
    }
}

impl PageScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener and return its receiver.
    #[must_use]
    pub fn attach(&self) -> PageScopeReceiver {
        let (tx, rx) = mpsc::channel(SCOPE_CHANNEL_CAPACITY);
        let mut guard = self.listeners.lock().unwrap();
        guard.next_id += 1;
        let id = guard.next_id;
        guard.entries.push((id, tx));
        rx
    }

    /// Number of currently attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().entries.len()
    }

    /// Post a message into the scope, delivering a clone of the envelope to
    /// every attached listener. Listeners whose receiver has been dropped
    /// are pruned by listener id, so a concurrent post interleaving at the
    /// send await cannot shift another entry under the prune.
    pub async fn post(&self, origin: MessageOrigin, message: PageMessage) {
        let cx = Cx::for_request();
        let entries = { self.listeners.lock().unwrap().entries.clone() };
        let mut dead = Vec::new();
        for (id, sender) in &entries {
            let envelope = Envelope::new(origin, message.clone());
            if sender.send(&cx, envelope).await.is_err() {
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut guard = self.listeners.lock().unwrap();
            guard.entries.retain(|(id, _)| !dead.contains(id));
        }
    }
}
