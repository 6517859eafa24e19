//! Structured error types for probes
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0} is not installed or not on PATH")]
    ToolMissing(String),

    #[error("{tool} failed: {detail}")]
    ToolExecution { tool: String, detail: String },

    #[error("could not parse {tool} output: {detail}")]
    Unparseable { tool: String, detail: String },

    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("inconclusive measurement: {0}")]
    Inconclusive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub fn unparseable(tool: &str, detail: impl Into<String>) -> Self {
        ProbeError::Unparseable { tool: tool.to_string(), detail: detail.into() }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::ToolMissing(_) => FailureKind::ToolMissing,
            ProbeError::ToolExecution { .. } | ProbeError::Unparseable { .. } => {
                FailureKind::ToolExecution
            }
            ProbeError::Inconclusive(_) => FailureKind::Inconclusive,
            ProbeError::UnsupportedEnvironment(_) | ProbeError::Io(_) => FailureKind::Environment,
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to serialize report: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_missing_display() {
        let err = ProbeError::ToolMissing("mpstat".to_string());
        assert_eq!(err.to_string(), "mpstat is not installed or not on PATH");
        assert_eq!(err.kind(), FailureKind::ToolMissing);
    }

    #[test]
    fn test_unparseable_is_execution_failure() {
        let err = ProbeError::unparseable("fio", "no bandwidth line");
        assert!(err.to_string().contains("fio"));
        assert_eq!(err.kind(), FailureKind::ToolExecution);
    }
}
