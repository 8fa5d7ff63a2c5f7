use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OutputInfo, SnapshotField, ThreadReport, WorkerState};

/// Everything the reporter read from the pipeline for one snapshot.
///
/// `inflight_count` and `worker_states` always come from the same read of the
/// batch map; the remaining fields may be read a moment later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub events_filtered: u64,
    pub events_consumed: u64,
    pub worker_count: usize,
    pub inflight_count: usize,
    pub worker_states: Vec<WorkerState>,
    pub output_info: Vec<OutputInfo>,
    pub thread_info: Value,
    pub stalling_threads_info: Vec<ThreadReport>,
}

impl SnapshotRecord {
    /// JSON value of a single field.
    pub fn field_value(&self, field: SnapshotField) -> Result<Value, serde_json::Error> {
        match field {
            SnapshotField::EventsFiltered => Ok(Value::from(self.events_filtered)),
            SnapshotField::EventsConsumed => Ok(Value::from(self.events_consumed)),
            SnapshotField::WorkerCount => Ok(Value::from(self.worker_count)),
            SnapshotField::InflightCount => Ok(Value::from(self.inflight_count)),
            SnapshotField::WorkerStates => serde_json::to_value(&self.worker_states),
            SnapshotField::OutputInfo => serde_json::to_value(&self.output_info),
            SnapshotField::ThreadInfo => Ok(self.thread_info.clone()),
            SnapshotField::StallingThreadsInfo => serde_json::to_value(&self.stalling_threads_info),
        }
    }
}
