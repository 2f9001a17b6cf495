//! Host Abstractions
//!
//! The engine sees the page only through [`Dom`] and time only through
//! [`Scheduler`]. Browser hosts implement both over `web-sys`; the
//! [`memory`] module provides deterministic implementations for tests and
//! tooling.

pub mod memory;

use std::fmt::Debug;

use crate::selector::Selector;
use crate::types::{DomEvent, Listener, TimerId};

pub use memory::{ManualScheduler, MemoryDom, NodeId};

/// Error type for fallible host operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node is no longer in the document")]
    Detached,
    #[error("Playback was rejected: {0}")]
    PlaybackRejected(String),
    #[error("Host call failed: {0}")]
    Host(String),
}

/// The live document, as seen by the engine.
///
/// "Not found" is never an error here: lookups return `Option` or empty
/// vectors, and mutators on nodes that have left the document are no-ops.
pub trait Dom {
    type Node: Clone + Debug;

    // -- queries --------------------------------------------------------------

    /// All attached elements matching `selector`, in document order.
    fn query_all(&self, selector: &Selector) -> Vec<Self::Node>;
    /// First descendant of `root` matching `selector`.
    fn query_within(&self, root: &Self::Node, selector: &Selector) -> Option<Self::Node>;
    fn matches(&self, node: &Self::Node, selector: &Selector) -> bool;
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;
    fn body(&self) -> Option<Self::Node>;
    fn document_element(&self) -> Option<Self::Node>;
    /// Current location path plus query string.
    fn location(&self) -> String;
    fn text_content(&self, node: &Self::Node) -> String;

    /// Is `node` (or one of its descendants) a match for `selector`?
    fn contains_match(&self, node: &Self::Node, selector: &Selector) -> bool {
        self.matches(node, selector) || self.query_within(node, selector).is_some()
    }

    // -- attributes, classes, styles -------------------------------------------

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    fn add_class(&mut self, node: &Self::Node, class: &str);
    fn remove_class(&mut self, node: &Self::Node, class: &str);
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);
    /// Inline style property value; `None` when unset.
    fn style(&self, node: &Self::Node, property: &str) -> Option<String>;
    /// Set an inline style property; an empty value clears it.
    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str);
    /// Computed stacking order, when the element has a numeric one.
    fn z_index(&self, node: &Self::Node) -> Option<i32>;

    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    // -- tree mutation ---------------------------------------------------------

    fn create_element(&mut self, tag: &str) -> Result<Self::Node, DomError>;
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;
    fn set_text(&mut self, node: &Self::Node, text: &str);
    /// Detach `node` from the document. Bindings on the subtree go with it.
    fn remove(&mut self, node: &Self::Node);

    // -- events ----------------------------------------------------------------

    /// Bind `listener` to `event` on `node`. Hosts deliver matching events
    /// back through [`Engine::handle_event`](crate::Engine::handle_event).
    fn listen(&mut self, node: &Self::Node, event: DomEvent, listener: Listener);
    fn unlisten(&mut self, node: &Self::Node, event: DomEvent, listener: Listener);

    // -- media -----------------------------------------------------------------

    /// Is the media element paused? Non-media nodes report paused.
    fn is_paused(&self, media: &Self::Node) -> bool;
    fn pause(&mut self, media: &Self::Node);
    /// Start playback. Rejections surface as `Err` (sync hosts) or are logged
    /// by the host (promise-based hosts).
    fn play(&mut self, media: &Self::Node) -> Result<(), DomError>;
}

/// The host's timer queue and clock.
pub trait Scheduler {
    /// Milliseconds on a monotonic-enough clock.
    fn now_ms(&self) -> u64;
    /// Arm a one-shot timer; its expiry arrives through
    /// [`Engine::on_timer`](crate::Engine::on_timer).
    fn set_timeout(&mut self, delay_ms: u64) -> TimerId;
    fn clear_timeout(&mut self, id: TimerId);
}

/// Cancel whatever `slot` holds and arm a fresh timer in its place.
pub fn rearm<S: Scheduler + ?Sized>(scheduler: &mut S, slot: &mut Option<TimerId>, delay_ms: u64) -> TimerId {
    cancel(scheduler, slot);
    let id = scheduler.set_timeout(delay_ms);
    *slot = Some(id);
    id
}

/// Cancel whatever `slot` holds.
pub fn cancel<S: Scheduler + ?Sized>(scheduler: &mut S, slot: &mut Option<TimerId>) {
    if let Some(id) = slot.take() {
        scheduler.clear_timeout(id);
    }
}

/// Take `slot` if it holds exactly `fired`. Stale expiries leave it untouched.
pub fn claim(slot: &mut Option<TimerId>, fired: TimerId) -> bool {
    if *slot == Some(fired) {
        *slot = None;
        true
    } else {
        false
    }
}
