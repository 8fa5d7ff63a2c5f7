use std::fmt;
use std::str::FromStr;

use crate::ReportError;

/// Logical field names of a snapshot record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotField {
    EventsFiltered,
    EventsConsumed,
    WorkerCount,
    InflightCount,
    WorkerStates,
    OutputInfo,
    ThreadInfo,
    StallingThreadsInfo,
}

impl SnapshotField {
    pub const ALL: [SnapshotField; 8] = [
        SnapshotField::EventsFiltered,
        SnapshotField::EventsConsumed,
        SnapshotField::WorkerCount,
        SnapshotField::InflightCount,
        SnapshotField::WorkerStates,
        SnapshotField::OutputInfo,
        SnapshotField::ThreadInfo,
        SnapshotField::StallingThreadsInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotField::EventsFiltered => "events_filtered",
            SnapshotField::EventsConsumed => "events_consumed",
            SnapshotField::WorkerCount => "worker_count",
            SnapshotField::InflightCount => "inflight_count",
            SnapshotField::WorkerStates => "worker_states",
            SnapshotField::OutputInfo => "output_info",
            SnapshotField::ThreadInfo => "thread_info",
            SnapshotField::StallingThreadsInfo => "stalling_threads_info",
        }
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotField {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ReportError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_parses_from_its_name() {
        for f in SnapshotField::ALL {
            assert_eq!(f.as_str().parse::<SnapshotField>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "inflight_cuont".parse::<SnapshotField>().unwrap_err();
        assert!(matches!(err, ReportError::UnknownField(ref n) if n == "inflight_cuont"));
    }
}
