//! Shared event queue between the device I/O thread and the bus drain task.

use parking_lot::Mutex;

use super::events::LinkEvent;

/// Ordered queue of events waiting for the next drain cycle
///
/// Producers append from the I/O thread, the bus drain takes the whole
/// contents in one swap.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<Vec<LinkEvent>>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event
    pub fn push(&self, event: LinkEvent) {
        self.events.lock().push(event);
    }

    /// Append several events with no other producer interleaving
    pub fn extend(&self, events: impl IntoIterator<Item = LinkEvent>) {
        self.events.lock().extend(events);
    }

    /// Take everything queued so far, leaving the queue empty
    pub fn drain(&self) -> Vec<LinkEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
