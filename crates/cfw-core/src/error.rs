//! Unified error type for the ChocoForestWatch ML pipeline.
//!
//! [`CfwError`] collects every failure mode named in the error-handling
//! design: config/input problems, retriable transport failures, fatal
//! integrity violations, degenerate training data, missing stage
//! dependencies, and operator cancellation. Components return
//! [`CfwResult`]; the CLI maps each variant to a process exit code.

use thiserror::Error;

/// The closed set of error kinds the pipeline can raise.
#[derive(Error, Debug)]
pub enum CfwError {
    /// Bad CLI arguments or environment configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid polygon, unknown class label, or mismatched CRS in input data.
    #[error("input data error: {0}")]
    InputData(String),

    /// HTTP/object-store failure. Retriable by the caller's backoff policy.
    #[error("transport error: {0}")]
    Transport(String),

    /// Checksum mismatch or invariant violation. Never retried.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Degenerate training data, NaN loss, or other model-fitting failure.
    #[error("model error: {0}")]
    Model(String),

    /// A required artifact from a prior stage is missing.
    #[error("stage dependency error: {0}")]
    StageDependency(String),

    /// The unit was cancelled by an operator signal.
    #[error("cancelled")]
    Cancelled,

    /// I/O errors that don't fit a more specific category.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the workspace.
pub type CfwResult<T> = Result<T, CfwError>;

impl CfwError {
    /// The exit code `cfw-cli` reports for this error, per the CLI contract.
    pub fn exit_code(&self) -> u8 {
        match self {
            CfwError::Config(_) => 2,
            CfwError::InputData(_) => 4,
            CfwError::Transport(_) => 3,
            CfwError::Integrity(_) => 4,
            CfwError::Model(_) => 4,
            CfwError::StageDependency(_) => 4,
            CfwError::Cancelled => 5,
            CfwError::Io(_) => 3,
        }
    }

    /// Whether this error class is retriable by an outer backoff policy.
    pub fn is_retriable(&self) -> bool {
        matches!(self, CfwError::Transport(_) | CfwError::Io(_))
    }
}

impl From<anyhow::Error> for CfwError {
    fn from(err: anyhow::Error) -> Self {
        CfwError::Model(err.to_string())
    }
}

impl From<serde_json::Error> for CfwError {
    fn from(err: serde_json::Error) -> Self {
        CfwError::InputData(err.to_string())
    }
}

impl From<String> for CfwError {
    fn from(s: String) -> Self {
        CfwError::Model(s)
    }
}

impl From<&str> for CfwError {
    fn from(s: &str) -> Self {
        CfwError::Model(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_cli_contract() {
        assert_eq!(CfwError::Config("bad".into()).exit_code(), 2);
        assert_eq!(CfwError::Transport("timeout".into()).exit_code(), 3);
        assert_eq!(CfwError::Integrity("checksum".into()).exit_code(), 4);
        assert_eq!(CfwError::Cancelled.exit_code(), 5);
    }

    #[test]
    fn only_transport_and_io_are_retriable() {
        assert!(CfwError::Transport("x".into()).is_retriable());
        assert!(!CfwError::Integrity("x".into()).is_retriable());
        assert!(!CfwError::Model("x".into()).is_retriable());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let cfw_err: CfwError = io_err.into();
        assert!(matches!(cfw_err, CfwError::Io(_)));
    }
}
