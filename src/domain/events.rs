//! Session events and observer registration
//!
//! A session owns its listener list; nothing is broadcast through ambient
//! global channels. Hosts subscribe an [`EventSink`] to receive status
//! transitions (for e.g. a status icon) and per-node insertion
//! notifications (for e.g. link-target rewriting). Dispatch is synchronous
//! and in document order for inserted nodes.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::infrastructure::dom::NodeHandle;

/// Externally visible state of a pagination session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PagerStatus {
    Enabled,
    Disabled,
    Loading,
    Error,
    Terminated,
}

impl std::fmt::Display for PagerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PagerStatus::Enabled => "enabled",
            PagerStatus::Disabled => "disabled",
            PagerStatus::Loading => "loading",
            PagerStatus::Error => "error",
            PagerStatus::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// A status transition with its emission time, for hosts that keep a
/// timeline of session activity.
#[derive(Debug, Clone)]
pub struct PagerEvent {
    pub status: PagerStatus,
    pub timestamp: DateTime<Utc>,
}

impl PagerEvent {
    pub fn now(status: PagerStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Observer interface for session notifications.
///
/// Both callbacks are fire-and-forget: the session ignores anything the
/// sink does and keeps running. Default implementations are no-ops so
/// sinks implement only what they care about.
pub trait EventSink {
    /// The session's externally visible status changed.
    fn status_changed(&self, _event: &PagerEvent) {}

    /// A content node was spliced into the live document. `parent` is the
    /// insertion parent, `node` the spliced node, `source_url` the page it
    /// was loaded from.
    fn node_inserted(&self, _parent: NodeHandle, _node: NodeHandle, _source_url: &Url) {}
}

/// Listener list owned by a session.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    sinks: Vec<Rc<dyn EventSink>>,
}

impl EventDispatcher {
    pub(crate) fn subscribe(&mut self, sink: Rc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub(crate) fn emit_status(&self, status: PagerStatus) {
        let event = PagerEvent::now(status);
        for sink in &self.sinks {
            sink.status_changed(&event);
        }
    }

    pub(crate) fn emit_inserted(&self, parent: NodeHandle, node: NodeHandle, source_url: &Url) {
        for sink in &self.sinks {
            sink.node_inserted(parent, node, source_url);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
