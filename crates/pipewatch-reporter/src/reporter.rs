use std::sync::Arc;

use pipewatch_core::{
    Batch, BatchMap, LockWait, OutputInfo, ReportError, SnapshotRecord, SourceContext, WorkerState, DEAD_STATUS,
};
use pipewatch_pipeline::{OutputStage, Pipeline};
use tracing::{debug, warn};

use crate::{ReporterConfig, Snapshot};

/// Builds consistent snapshots of a running pipeline.
///
/// Only the in-flight batch map is read under the pipeline's lock, and only
/// for as long as it takes to derive per-worker state from it. Everything else
/// is read afterwards, so a snapshot never stalls dispatch for longer than one
/// pass over the workers.
pub struct PipelineReporter<P: Pipeline> {
    pipeline: Arc<P>,
    lock_wait: LockWait,
}

impl<P: Pipeline> PipelineReporter<P> {
    pub fn new(pipeline: Arc<P>) -> Self {
        Self::with_lock_wait(pipeline, LockWait::default())
    }

    pub fn with_lock_wait(pipeline: Arc<P>, lock_wait: LockWait) -> Self {
        Self { pipeline, lock_wait }
    }

    pub fn from_config(pipeline: Arc<P>, cfg: &ReporterConfig) -> Self {
        Self::with_lock_wait(pipeline, cfg.lock_wait())
    }

    pub fn pipeline(&self) -> &Arc<P> {
        &self.pipeline
    }

    pub fn lock_wait(&self) -> LockWait {
        self.lock_wait
    }

    pub fn snapshot(&self) -> Result<Snapshot, ReportError> {
        self.to_record().map(Snapshot::new)
    }

    /// The raw record behind [`snapshot`](Self::snapshot).
    pub fn to_record(&self) -> Result<SnapshotRecord, ReportError> {
        let span = tracing::debug_span!("snapshot", pipeline = %self.pipeline.id());
        let _enter = span.enter();

        let (worker_states, inflight_count) = match self
            .pipeline
            .synchronize_inflight_batches(self.lock_wait, |batch_map| self.inflight_under_lock(batch_map))
        {
            Ok(read) => read?,
            Err(e) => {
                if e.is_timeout() {
                    warn!(error = %e, "skipping snapshot, batch dispatch is holding the lock");
                }
                return Err(e);
            }
        };

        let record = SnapshotRecord {
            events_filtered: self.pipeline.events_filtered().source_context("events_filtered")?,
            events_consumed: self.pipeline.events_consumed().source_context("events_consumed")?,
            worker_count: worker_states.len(),
            inflight_count,
            worker_states,
            output_info: self.output_states()?,
            thread_info: self.pipeline.plugin_threads_info().source_context("plugin_threads_info")?,
            stalling_threads_info: self.pipeline.stalling_threads_info().source_context("stalling_threads_info")?,
        };

        debug!(
            workers = record.worker_count,
            inflight = record.inflight_count,
            outputs = record.output_info.len(),
            stalling = record.stalling_threads_info.len(),
            "snapshot taken"
        );
        Ok(record)
    }

    /// Must only run inside `synchronize_inflight_batches`: the map is
    /// rekeyed as workers pick up and finish batches.
    fn inflight_under_lock(&self, batch_map: &BatchMap) -> Result<(Vec<WorkerState>, usize), ReportError> {
        let states = self.worker_states(batch_map)?;
        let inflight = states.iter().map(|s| s.inflight_count).sum();
        Ok((states, inflight))
    }

    fn worker_states(&self, batch_map: &BatchMap) -> Result<Vec<WorkerState>, ReportError> {
        let threads = self.pipeline.worker_threads().source_context("worker_threads")?;
        Ok(threads
            .iter()
            .enumerate()
            .map(|(index, thread)| WorkerState {
                status: thread.status().unwrap_or_else(|| DEAD_STATUS.to_string()),
                alive: thread.is_alive(),
                index,
                inflight_count: batch_map.get(thread.id()).map_or(0, Batch::len),
            })
            .collect())
    }

    /// Busy/idle worker counts for every output stage.
    pub fn output_states(&self) -> Result<Vec<OutputInfo>, ReportError> {
        let outputs = self.pipeline.outputs().source_context("outputs")?;
        Ok(outputs.iter().map(|o| output_info(&**o)).collect())
    }
}

/// Pooled outputs report free slots; single-worker outputs report whether
/// their exclusion lock is held.
pub fn output_info(output: &dyn OutputStage) -> OutputInfo {
    let workers = output.workers();
    let is_multi_worker = workers > 1;

    let (idle, busy) = if is_multi_worker {
        let available = output.available_workers();
        (available, workers.saturating_sub(available))
    } else if output.single_worker_locked() {
        (0, 1)
    } else {
        (1, 0)
    };

    OutputInfo {
        output_type: output.type_name().to_string(),
        config: output.config(),
        is_multi_worker,
        workers,
        busy_workers: busy,
        idle_workers: idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewatch_core::{PipelineId, ThreadReport, WorkerId};
    use pipewatch_pipeline::InMemoryPipeline;
    use serde_json::json;
    use std::time::Duration;

    fn two_worker_pipeline() -> Arc<InMemoryPipeline> {
        let p = InMemoryPipeline::new(PipelineId::from_str("main"));
        let a = WorkerId::from_str("a");
        let b = WorkerId::from_str("b");
        p.add_worker(a.clone());
        p.add_worker(b.clone());
        p.set_worker_status(&a, "running").unwrap();
        p.begin_batch(&a, vec![json!(1), json!(2), json!(3)]);
        p.begin_batch(&b, vec![]);
        p.stop_worker(&b).unwrap();
        Arc::new(p)
    }

    #[test]
    fn worker_states_match_batch_map() {
        let reporter = PipelineReporter::new(two_worker_pipeline());
        let snap = reporter.snapshot().unwrap();
        assert_eq!(
            snap.worker_states(),
            &[
                WorkerState { status: "running".into(), alive: true, index: 0, inflight_count: 3 },
                WorkerState { status: "dead".into(), alive: false, index: 1, inflight_count: 0 },
            ]
        );
        assert_eq!(snap.inflight_count(), 3);
        assert_eq!(snap.worker_count(), 2);
    }

    #[test]
    fn worker_without_batch_has_zero_inflight() {
        let p = InMemoryPipeline::new(PipelineId::new());
        p.add_worker(WorkerId::from_str("idle"));
        let snap = PipelineReporter::new(Arc::new(p)).snapshot().unwrap();
        assert_eq!(snap.worker_states()[0].inflight_count, 0);
        assert_eq!(snap.inflight_count(), 0);
    }

    #[test]
    fn multi_worker_output_counts_free_slots() {
        let p = InMemoryPipeline::new(PipelineId::new());
        let out = p.add_output("elasticsearch", json!({"hosts": ["es:9200"]}), 4);
        let _w1 = out.try_checkout().unwrap();
        let _w2 = out.try_checkout().unwrap();
        let _w3 = out.try_checkout().unwrap();
        let info = output_info(&*out);
        assert_eq!(
            info,
            OutputInfo {
                output_type: "elasticsearch".into(),
                config: json!({"hosts": ["es:9200"]}),
                is_multi_worker: true,
                workers: 4,
                busy_workers: 3,
                idle_workers: 1,
            }
        );
    }

    #[test]
    fn single_worker_output_follows_its_lock() {
        let p = InMemoryPipeline::new(PipelineId::new());
        let out = p.add_output("file", json!({"path": "/tmp/out"}), 1);

        let held = out.try_checkout().unwrap();
        let info = output_info(&*out);
        assert!(!info.is_multi_worker);
        assert_eq!((info.workers, info.busy_workers, info.idle_workers), (1, 1, 0));

        drop(held);
        let info = output_info(&*out);
        assert_eq!((info.busy_workers, info.idle_workers), (0, 1));
    }

    #[test]
    fn bounded_wait_fails_whole_snapshot() {
        let p = two_worker_pipeline();
        let reporter = PipelineReporter::with_lock_wait(p.clone(), LockWait::Bounded(Duration::from_millis(10)));
        let dispatch = p.lock_inflight_batches();
        let err = reporter.snapshot().unwrap_err();
        assert!(err.is_timeout());
        drop(dispatch);
        assert!(reporter.snapshot().is_ok());
    }

    #[test]
    fn passes_thread_diagnostics_through() {
        let p = two_worker_pipeline();
        p.set_plugin_threads_info(json!([{"plugin": "beats", "state": "run"}]));
        p.set_stalling_threads(vec![ThreadReport::new().with("plugin", "http").with("id", 1)]);
        let snap = PipelineReporter::new(p).snapshot().unwrap();
        assert_eq!(snap.thread_info(), &json!([{"plugin": "beats", "state": "run"}]));
        assert_eq!(snap.stalling_threads_info().len(), 1);
        assert_eq!(snap.group_stalled_by_plugin()["http"].len(), 1);
    }

    #[test]
    fn config_selects_lock_wait() {
        let mut cfg = ReporterConfig::default();
        cfg.lock.blocking = true;
        let reporter = PipelineReporter::from_config(two_worker_pipeline(), &cfg);
        assert_eq!(reporter.lock_wait(), LockWait::Blocking);
    }
}
