//! Event deduplication by id.

use std::collections::HashSet;

/// Tracks seen event IDs for deduplication.
///
/// Never evicts, so a duplicate arriving late from a slow relay is still
/// rejected.
#[derive(Debug, Default)]
pub struct EventDedup {
    seen: HashSet<String>,
}

impl EventDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the event is new (not seen before).
    pub fn check_and_insert(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }
        self.seen.insert(event_id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
