use std::sync::Arc;

use anyhow::Result;
use pipewatch_core::{BatchMap, LockWait, PipelineId, ReportError, ThreadReport, WorkerId};

/// A pipeline worker thread as seen from outside the pipeline.
pub trait WorkerThread: Send + Sync {
    fn id(&self) -> &WorkerId;

    /// Current status, or `None` once the thread has exited.
    fn status(&self) -> Option<String>;

    fn is_alive(&self) -> bool;
}

/// An output stage and its worker pool.
pub trait OutputStage: Send + Sync {
    fn type_name(&self) -> &str;

    fn config(&self) -> serde_json::Value;

    /// Configured number of workers.
    fn workers(&self) -> usize;

    /// Number of pool slots not currently checked out. Only meaningful when
    /// `workers() > 1`.
    fn available_workers(&self) -> usize;

    /// Whether the exclusion lock of a single-worker output is held.
    fn single_worker_locked(&self) -> bool;
}

/// What the reporter needs from a running pipeline.
///
/// Every read except the in-flight batch map is expected to be safe without
/// external locking.
pub trait Pipeline: Send + Sync {
    fn id(&self) -> &PipelineId;

    /// Run `f` with exclusive access to the in-flight batch map.
    ///
    /// With [`LockWait::Bounded`] the call gives up with
    /// [`ReportError::LockTimeout`] instead of waiting on dispatch forever.
    fn synchronize_inflight_batches<T, F>(&self, wait: LockWait, f: F) -> Result<T, ReportError>
    where
        F: FnOnce(&BatchMap) -> T;

    fn worker_threads(&self) -> Result<Vec<Arc<dyn WorkerThread>>>;

    fn events_filtered(&self) -> Result<u64>;
    fn events_consumed(&self) -> Result<u64>;

    fn outputs(&self) -> Result<Vec<Arc<dyn OutputStage>>>;

    fn plugin_threads_info(&self) -> Result<serde_json::Value>;
    fn stalling_threads_info(&self) -> Result<Vec<ThreadReport>>;
}
