use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use pipewatch_core::{OutputInfo, ReportError, SnapshotField, SnapshotRecord, ThreadReport, WorkerState};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::RenderFormat;

/// Stalled-thread diagnostics grouped by the plugin each thread is blocked in.
pub type StalledByPlugin = BTreeMap<String, Vec<ThreadReport>>;

/// Immutable point-in-time view of a pipeline, as returned by
/// [`PipelineReporter::snapshot`](crate::PipelineReporter::snapshot).
pub struct Snapshot {
    record: SnapshotRecord,
    stalled_by_plugin: OnceLock<StalledByPlugin>,
}

/// Reduced projection of a snapshot for logs and quick human checks.
#[derive(Debug, Serialize)]
pub struct CompactView<'a> {
    pub inflight_count: usize,
    pub stalling_thread_info: &'a StalledByPlugin,
}

impl Snapshot {
    pub fn new(record: SnapshotRecord) -> Self {
        Self { record, stalled_by_plugin: OnceLock::new() }
    }

    pub fn record(&self) -> &SnapshotRecord {
        &self.record
    }

    pub fn into_record(self) -> SnapshotRecord {
        self.record
    }

    pub fn events_filtered(&self) -> u64 {
        self.record.events_filtered
    }

    pub fn events_consumed(&self) -> u64 {
        self.record.events_consumed
    }

    pub fn worker_count(&self) -> usize {
        self.record.worker_count
    }

    pub fn inflight_count(&self) -> usize {
        self.record.inflight_count
    }

    pub fn worker_states(&self) -> &[WorkerState] {
        &self.record.worker_states
    }

    pub fn output_info(&self) -> &[OutputInfo] {
        &self.record.output_info
    }

    pub fn thread_info(&self) -> &Value {
        &self.record.thread_info
    }

    pub fn stalling_threads_info(&self) -> &[ThreadReport] {
        &self.record.stalling_threads_info
    }

    /// Look a field up by its record name, e.g. `"inflight_count"`.
    pub fn field(&self, name: &str) -> Result<Value, ReportError> {
        let field: SnapshotField = name.parse()?;
        self.get(field)
    }

    pub fn get(&self, field: SnapshotField) -> Result<Value, ReportError> {
        Ok(self.record.field_value(field)?)
    }

    /// Stalled threads keyed by plugin name (`"other"` when a thread names
    /// none), in pipeline order within each plugin.
    ///
    /// Grouped records are copies without their `plugin` key; the record
    /// itself is left untouched. Computed on first call.
    pub fn group_stalled_by_plugin(&self) -> &StalledByPlugin {
        self.stalled_by_plugin
            .get_or_init(|| group_by_plugin(&self.record.stalling_threads_info))
    }

    pub fn compact_view(&self) -> CompactView<'_> {
        CompactView {
            inflight_count: self.record.inflight_count,
            stalling_thread_info: self.group_stalled_by_plugin(),
        }
    }

    /// Compact view as a single line of JSON with sorted keys.
    pub fn render_text(&self) -> String {
        self.compact_view().to_value().to_string()
    }

    pub fn render(&self, format: RenderFormat) -> Result<String, ReportError> {
        match format {
            RenderFormat::Text => Ok(self.render_text()),
            RenderFormat::Json => Ok(serde_json::to_string(&self.record)?),
            RenderFormat::Pretty => Ok(serde_json::to_string_pretty(&self.record)?),
        }
    }
}

impl CompactView<'_> {
    pub fn to_value(&self) -> Value {
        let stalled: Map<String, Value> = self
            .stalling_thread_info
            .iter()
            .map(|(plugin, threads)| {
                let threads = threads.iter().cloned().map(ThreadReport::into_value).collect();
                (plugin.clone(), Value::Array(threads))
            })
            .collect();
        let mut out = Map::new();
        out.insert("inflight_count".to_string(), Value::from(self.inflight_count));
        out.insert("stalling_thread_info".to_string(), Value::Object(stalled));
        Value::Object(out)
    }
}

fn group_by_plugin(threads: &[ThreadReport]) -> StalledByPlugin {
    let mut grouped = StalledByPlugin::new();
    for thread in threads {
        grouped.entry(thread.plugin_key()).or_default().push(thread.without_plugin());
    }
    grouped
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_text())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("record", &self.record).finish()
    }
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        Self::new(record)
    }
}
