//! Persistence Tracker - cycle guard for one persistence pass

use std::collections::HashMap;

use crate::record::{RecordIdentity, RecordRef};

/// Records already visited in the current persistence pass, by instance.
///
/// Create one per top-level persist call and pass it down the cascade. The
/// tracker holds a handle to every visited record so an identity cannot be
/// reused by a new allocation while the pass is running.
#[derive(Debug, Default)]
pub struct PersistenceTracker {
    visited: HashMap<RecordIdentity, RecordRef>,
}

impl PersistenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a record as visited. Returns false if it was already visited.
    pub fn visit(&mut self, record: &RecordRef) -> bool {
        let identity = record.identity();
        if self.visited.contains_key(&identity) {
            return false;
        }
        self.visited.insert(identity, record.clone());
        true
    }

    pub fn contains(&self, record: &RecordRef) -> bool {
        self.visited.contains_key(&record.identity())
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
