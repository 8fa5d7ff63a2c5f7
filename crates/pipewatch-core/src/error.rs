use std::time::Duration;

use thiserror::Error;

/// Why a snapshot (or a lookup into one) could not be produced.
///
/// A snapshot is all-or-nothing: every variant here means the caller got no
/// record at all.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("in-flight batch map lock not acquired within {waited:?}")]
    LockTimeout { waited: Duration },

    #[error("failed to read {source_name} from pipeline")]
    Source {
        source_name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown snapshot field: {0}")]
    UnknownField(String),

    #[error("failed to render snapshot field: {0}")]
    Render(#[from] serde_json::Error),
}

impl ReportError {
    pub fn source_read(source_name: &'static str, source: anyhow::Error) -> Self {
        Self::Source { source_name, source }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Attach the name of the pipeline sub-source to a failed read.
pub trait SourceContext<T> {
    fn source_context(self, source_name: &'static str) -> Result<T, ReportError>;
}

impl<T> SourceContext<T> for anyhow::Result<T> {
    fn source_context(self, source_name: &'static str) -> Result<T, ReportError> {
        self.map_err(|e| ReportError::source_read(source_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_context_names_the_sub_source() {
        let res: anyhow::Result<u64> = Err(anyhow::anyhow!("counter poisoned"));
        let err = res.source_context("events_filtered").unwrap_err();
        assert_eq!(err.to_string(), "failed to read events_filtered from pipeline");
        assert!(!err.is_timeout());
        let inner = std::error::Error::source(&err).unwrap();
        assert_eq!(inner.to_string(), "counter poisoned");
    }

    #[test]
    fn timeout_display_includes_wait() {
        let err = ReportError::LockTimeout { waited: Duration::from_millis(250) };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "in-flight batch map lock not acquired within 250ms");
    }
}
