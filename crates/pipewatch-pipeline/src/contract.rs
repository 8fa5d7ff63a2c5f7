use std::time::Duration;

use anyhow::{anyhow, Result};
use pipewatch_core::LockWait;

use crate::traits::Pipeline;

/// Shared collaborator contract suite. Any `Pipeline` implementation handed to
/// the reporter should pass it while idle.
pub fn run_pipeline_contract_suite(pipeline: &impl Pipeline) -> Result<()> {
    let seen = pipeline.synchronize_inflight_batches(LockWait::Blocking, |map| map.len())?;
    let seen_bounded =
        pipeline.synchronize_inflight_batches(LockWait::Bounded(Duration::from_millis(50)), |map| map.len())?;
    if seen != seen_bounded {
        return Err(anyhow!("idle pipeline changed its in-flight batch map between reads"));
    }

    let filtered = pipeline.events_filtered()?;
    let consumed = pipeline.events_consumed()?;
    if pipeline.events_filtered()? < filtered || pipeline.events_consumed()? < consumed {
        return Err(anyhow!("event counters went backwards"));
    }

    let workers = pipeline.worker_threads()?;
    for (i, a) in workers.iter().enumerate() {
        if workers[i + 1..].iter().any(|b| b.id() == a.id()) {
            return Err(anyhow!("worker {} listed twice", a.id()));
        }
    }

    for output in pipeline.outputs()? {
        if output.workers() == 0 {
            return Err(anyhow!("output {} reports zero workers", output.type_name()));
        }
        if output.workers() > 1 && output.available_workers() > output.workers() {
            return Err(anyhow!(
                "output {} has {} free slots for {} workers",
                output.type_name(),
                output.available_workers(),
                output.workers()
            ));
        }
    }

    pipeline.plugin_threads_info()?;
    pipeline.stalling_threads_info()?;
    Ok(())
}
