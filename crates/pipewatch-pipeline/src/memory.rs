use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::{Mutex, MutexGuard, RwLock};
use pipewatch_core::{
    Batch, BatchMap, Counter, Event, LockWait, PipelineId, ReportError, ThreadReport, WorkerId,
};
use serde_json::Value;

use crate::traits::{OutputStage, Pipeline, WorkerThread};

/// In-process pipeline state for tests and the demo CLI.
///
/// Batch dispatch and the reporter contend on the same batch map lock, the
/// same way a real pipeline's workers would.
pub struct InMemoryPipeline {
    id: PipelineId,
    batches: Mutex<BatchMap>,
    workers: RwLock<Vec<Arc<WorkerHandle>>>,
    outputs: RwLock<Vec<Arc<OutputHandle>>>,
    events_filtered: Counter,
    events_consumed: Counter,
    plugin_threads: RwLock<Value>,
    stalling_threads: RwLock<Vec<ThreadReport>>,
}

impl InMemoryPipeline {
    pub fn new(id: PipelineId) -> Self {
        Self {
            id,
            batches: Mutex::new(BatchMap::new()),
            workers: RwLock::new(Vec::new()),
            outputs: RwLock::new(Vec::new()),
            events_filtered: Counter::new(),
            events_consumed: Counter::new(),
            plugin_threads: RwLock::new(Value::Array(Vec::new())),
            stalling_threads: RwLock::new(Vec::new()),
        }
    }

    pub fn add_worker(&self, id: WorkerId) -> Arc<WorkerHandle> {
        let handle = Arc::new(WorkerHandle::new(id));
        self.workers.write().push(handle.clone());
        handle
    }

    pub fn worker(&self, id: &WorkerId) -> Option<Arc<WorkerHandle>> {
        self.workers.read().iter().find(|w| &w.id == id).cloned()
    }

    pub fn set_worker_status(&self, id: &WorkerId, status: impl Into<String>) -> Result<()> {
        let worker = self.worker(id).ok_or_else(|| anyhow!("unknown worker {}", id))?;
        *worker.status.lock() = Some(status.into());
        Ok(())
    }

    /// Marks a worker as exited. Its in-flight batch, if any, stays in the
    /// map until someone finishes it.
    pub fn stop_worker(&self, id: &WorkerId) -> Result<()> {
        let worker = self.worker(id).ok_or_else(|| anyhow!("unknown worker {}", id))?;
        worker.alive.store(false, Ordering::Release);
        *worker.status.lock() = None;
        tracing::debug!(pipeline = %self.id, worker = %id, "worker stopped");
        Ok(())
    }

    /// Check a batch out to `worker`, replacing whatever it held before.
    pub fn begin_batch(&self, worker: &WorkerId, events: Vec<Event>) {
        let n = events.len() as u64;
        self.batches.lock().insert(worker.clone(), Batch::new(events));
        self.events_consumed.increment(n);
    }

    /// Acknowledge `worker`'s batch; `passed` events made it through filters.
    pub fn finish_batch(&self, worker: &WorkerId, passed: u64) -> Option<Batch> {
        let batch = self.batches.lock().remove(worker);
        if batch.is_some() {
            self.events_filtered.increment(passed);
        }
        batch
    }

    /// Direct access to the batch map, as batch dispatch would take it.
    pub fn lock_inflight_batches(&self) -> MutexGuard<'_, BatchMap> {
        self.batches.lock()
    }

    pub fn record_consumed(&self, n: u64) {
        self.events_consumed.increment(n);
    }

    pub fn record_filtered(&self, n: u64) {
        self.events_filtered.increment(n);
    }

    pub fn add_output(&self, type_name: impl Into<String>, config: Value, workers: usize) -> Arc<OutputHandle> {
        let handle = Arc::new(OutputHandle::new(type_name, config, workers));
        self.outputs.write().push(handle.clone());
        handle
    }

    pub fn output(&self, index: usize) -> Option<Arc<OutputHandle>> {
        self.outputs.read().get(index).cloned()
    }

    pub fn set_plugin_threads_info(&self, info: Value) {
        *self.plugin_threads.write() = info;
    }

    pub fn set_stalling_threads(&self, threads: Vec<ThreadReport>) {
        *self.stalling_threads.write() = threads;
    }
}

impl Pipeline for InMemoryPipeline {
    fn id(&self) -> &PipelineId {
        &self.id
    }

    fn synchronize_inflight_batches<T, F>(&self, wait: LockWait, f: F) -> Result<T, ReportError>
    where
        F: FnOnce(&BatchMap) -> T,
    {
        let guard = match wait {
            LockWait::Blocking => self.batches.lock(),
            LockWait::Bounded(timeout) => self
                .batches
                .try_lock_for(timeout)
                .ok_or(ReportError::LockTimeout { waited: timeout })?,
        };
        Ok(f(&guard))
    }

    fn worker_threads(&self) -> Result<Vec<Arc<dyn WorkerThread>>> {
        Ok(self
            .workers
            .read()
            .iter()
            .map(|w| w.clone() as Arc<dyn WorkerThread>)
            .collect())
    }

    fn events_filtered(&self) -> Result<u64> {
        Ok(self.events_filtered.value())
    }

    fn events_consumed(&self) -> Result<u64> {
        Ok(self.events_consumed.value())
    }

    fn outputs(&self) -> Result<Vec<Arc<dyn OutputStage>>> {
        Ok(self
            .outputs
            .read()
            .iter()
            .map(|o| o.clone() as Arc<dyn OutputStage>)
            .collect())
    }

    fn plugin_threads_info(&self) -> Result<Value> {
        Ok(self.plugin_threads.read().clone())
    }

    fn stalling_threads_info(&self) -> Result<Vec<ThreadReport>> {
        Ok(self.stalling_threads.read().clone())
    }
}

pub struct WorkerHandle {
    id: WorkerId,
    status: Mutex<Option<String>>,
    alive: AtomicBool,
}

impl WorkerHandle {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            status: Mutex::new(Some("run".to_string())),
            alive: AtomicBool::new(true),
        }
    }
}

impl WorkerThread for WorkerHandle {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn status(&self) -> Option<String> {
        self.status.lock().clone()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// An output stage with either a slot pool (`workers > 1`) or a single
/// exclusion lock.
pub struct OutputHandle {
    type_name: String,
    config: Value,
    workers: usize,
    available: Mutex<Vec<usize>>,
    single_worker: Mutex<()>,
}

impl OutputHandle {
    fn new(type_name: impl Into<String>, config: Value, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            type_name: type_name.into(),
            config,
            workers,
            available: Mutex::new((0..workers).collect()),
            single_worker: Mutex::new(()),
        }
    }

    pub fn is_multi_worker(&self) -> bool {
        self.workers > 1
    }

    /// Take a worker without blocking; `None` when every worker is busy.
    pub fn try_checkout(&self) -> Option<OutputWorker<'_>> {
        if self.is_multi_worker() {
            let slot = self.available.lock().pop()?;
            Some(OutputWorker { output: self, slot: Some(slot), _single: None })
        } else {
            let guard = self.single_worker.try_lock()?;
            Some(OutputWorker { output: self, slot: None, _single: Some(guard) })
        }
    }
}

impl OutputStage for OutputHandle {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn config(&self) -> Value {
        self.config.clone()
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn available_workers(&self) -> usize {
        self.available.lock().len()
    }

    fn single_worker_locked(&self) -> bool {
        self.single_worker.is_locked()
    }
}

/// A checked-out output worker; returns itself to the pool on drop.
pub struct OutputWorker<'a> {
    output: &'a OutputHandle,
    slot: Option<usize>,
    _single: Option<MutexGuard<'a, ()>>,
}

impl Drop for OutputWorker<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.output.available.lock().push(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn pipeline() -> InMemoryPipeline {
        InMemoryPipeline::new(PipelineId::from_str("main"))
    }

    #[test]
    fn test_new_pipeline_is_empty() {
        let p = pipeline();
        assert!(p.worker_threads().unwrap().is_empty());
        assert!(p.outputs().unwrap().is_empty());
        assert_eq!(p.events_filtered().unwrap(), 0);
        assert_eq!(p.events_consumed().unwrap(), 0);
        assert!(p.stalling_threads_info().unwrap().is_empty());
    }

    #[test]
    fn test_begin_and_finish_batch() {
        let p = pipeline();
        let w = WorkerId::from_str("w0");
        p.add_worker(w.clone());
        p.begin_batch(&w, vec![json!(1), json!(2)]);
        let size = p
            .synchronize_inflight_batches(LockWait::Blocking, |map| map.get(&w).map(Batch::len))
            .unwrap();
        assert_eq!(size, Some(2));
        assert_eq!(p.events_consumed().unwrap(), 2);

        let batch = p.finish_batch(&w, 1).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(p.events_filtered().unwrap(), 1);
        assert!(p.finish_batch(&w, 1).is_none());
        assert_eq!(p.events_filtered().unwrap(), 1);
    }

    #[test]
    fn test_bounded_wait_times_out_while_dispatch_holds_lock() {
        let p = pipeline();
        let _dispatch = p.lock_inflight_batches();
        let err = p
            .synchronize_inflight_batches(LockWait::Bounded(Duration::from_millis(20)), |map| map.len())
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_stop_worker_clears_status() {
        let p = pipeline();
        let w = WorkerId::from_str("w0");
        let handle = p.add_worker(w.clone());
        p.set_worker_status(&w, "sleep").unwrap();
        assert_eq!(handle.status().as_deref(), Some("sleep"));
        p.stop_worker(&w).unwrap();
        assert!(!handle.is_alive());
        assert_eq!(handle.status(), None);
        assert!(p.stop_worker(&WorkerId::from_str("missing")).is_err());
    }

    #[test]
    fn test_pooled_output_checkout_returns_slot_on_drop() {
        let p = pipeline();
        let out = p.add_output("elasticsearch", json!({}), 3);
        let a = out.try_checkout().unwrap();
        let _b = out.try_checkout().unwrap();
        assert_eq!(out.available_workers(), 1);
        drop(a);
        assert_eq!(out.available_workers(), 2);
        assert!(!out.single_worker_locked());
    }

    #[test]
    fn test_single_worker_output_uses_lock() {
        let p = pipeline();
        let out = p.add_output("stdout", json!({}), 1);
        assert!(!out.is_multi_worker());
        let held = out.try_checkout().unwrap();
        assert!(out.single_worker_locked());
        assert!(out.try_checkout().is_none());
        drop(held);
        assert!(!out.single_worker_locked());
    }

    #[test]
    fn test_zero_workers_is_treated_as_single() {
        let p = pipeline();
        let out = p.add_output("null", json!({}), 0);
        assert_eq!(out.workers(), 1);
    }
}
