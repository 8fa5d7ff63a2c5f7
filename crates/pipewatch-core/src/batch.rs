use std::collections::HashMap;

use crate::WorkerId;

/// A single pipeline event. The reporter never looks inside.
pub type Event = serde_json::Value;

/// Events checked out to a worker and not yet acknowledged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub events: Vec<Event>,
}

impl Batch {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// In-flight batches keyed by the worker currently holding them.
///
/// Workers insert and remove entries concurrently; only read this under the
/// pipeline's synchronized scope.
pub type BatchMap = HashMap<WorkerId, Batch>;
