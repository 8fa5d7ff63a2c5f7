use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pipewatch_core::{PipelineId, ThreadReport, WorkerId};
use pipewatch_pipeline::InMemoryPipeline;
use serde_json::json;

const OUTPUT_TYPES: [&str; 4] = ["stdout", "elasticsearch", "file", "kafka"];

/// Worker threads pushing fake batches through an in-memory pipeline.
///
/// The last worker periodically blocks inside an "http" output call and
/// reports itself as stalling while it does.
pub struct Simulation {
    pipeline: Arc<InMemoryPipeline>,
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Simulation {
    pub fn start(workers: usize, outputs: usize) -> Self {
        let pipeline = Arc::new(InMemoryPipeline::new(PipelineId::from_str("main")));
        for i in 0..outputs {
            let ty = OUTPUT_TYPES[i % OUTPUT_TYPES.len()];
            // alternate single-worker and pooled outputs
            let pool = if i % 2 == 0 { 1 } else { 2 + i };
            pipeline.add_output(ty, json!({"id": format!("{}_{}", ty, i)}), pool);
        }
        pipeline.set_plugin_threads_info(json!([
            {"plugin": "generator", "thread_id": 1, "state": "run"},
        ]));

        let stop = Arc::new(AtomicBool::new(false));
        let handles = (0..workers)
            .map(|i| {
                let id = WorkerId::from_str(format!("[main]>worker{}", i));
                pipeline.add_worker(id.clone());
                let pipeline = pipeline.clone();
                let stop = stop.clone();
                let stalls = i + 1 == workers;
                thread::spawn(move || work(&pipeline, &id, i, outputs, stalls, &stop))
            })
            .collect();

        tracing::info!(workers, outputs, "simulation started");
        Self { pipeline, stop, handles }
    }

    pub fn pipeline(&self) -> Arc<InMemoryPipeline> {
        self.pipeline.clone()
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        for h in self.handles {
            if h.join().is_err() {
                tracing::warn!("simulated worker panicked");
            }
        }
    }
}

fn work(pipeline: &InMemoryPipeline, id: &WorkerId, index: usize, outputs: usize, stalls: bool, stop: &AtomicBool) {
    let mut n = 0usize;
    while !stop.load(Ordering::Relaxed) {
        let size = (n + index) % 8 + 1;
        let events = (0..size).map(|seq| json!({"worker": index, "seq": seq})).collect();
        pipeline.begin_batch(id, events);

        let stalled = stalls && n % 20 == 19;
        if stalled {
            pipeline.set_stalling_threads(vec![ThreadReport::new()
                .with("plugin", "http")
                .with("thread_id", index)
                .with("name", id.as_str())
                .with("blocked_on", "socket read")]);
        }

        if let Some(output) = pipeline.output(n % outputs.max(1)) {
            let _worker = output.try_checkout();
            thread::sleep(Duration::from_millis(if stalled { 250 } else { 5 }));
        } else {
            thread::sleep(Duration::from_millis(5));
        }

        if stalled {
            pipeline.set_stalling_threads(vec![]);
        }
        pipeline.finish_batch(id, (size / 2) as u64);
        n += 1;
    }
    if let Err(e) = pipeline.stop_worker(id) {
        tracing::warn!(error = %e, "failed to mark worker stopped");
    }
}
