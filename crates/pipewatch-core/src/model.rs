use serde::{Deserialize, Serialize};

/// Status reported for a worker thread whose status can no longer be read.
pub const DEAD_STATUS: &str = "dead";

/// State of one pipeline worker at snapshot time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub status: String,
    pub alive: bool,
    pub index: usize,
    pub inflight_count: usize,
}

/// Utilization of one output stage at snapshot time.
///
/// Single-worker outputs are normalized into the same busy/idle shape as
/// pooled ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputInfo {
    #[serde(rename = "type")]
    pub output_type: String,
    pub config: serde_json::Value,
    pub is_multi_worker: bool,
    pub workers: usize,
    pub busy_workers: usize,
    pub idle_workers: usize,
}

/// How long to wait for the pipeline's synchronized scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockWait {
    Blocking,
    Bounded(std::time::Duration),
}

impl Default for LockWait {
    fn default() -> Self {
        LockWait::Bounded(std::time::Duration::from_secs(5))
    }
}
