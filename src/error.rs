//! Error types for the risk engine.
//!
//! Internal plumbing propagates `anyhow::Error`; the variants here are the
//! failures a caller is expected to distinguish.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias for client-facing risk operations
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors surfaced by [`crate::service::RiskService`] and the simulators.
#[derive(Error, Debug)]
pub enum RiskError {
    /// Cascade requested for a port that is not in the snapshot
    #[error("port {0} not found in network")]
    UnknownPort(String),

    /// No propagation backend could be initialised (startup only)
    #[error("propagation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Numeric backend failed while scoring a graph
    #[error("risk computation failed: {0}")]
    Computation(#[from] anyhow::Error),
}

impl RiskError {
    /// Create an unknown-port error
    pub fn unknown_port(code: impl Into<String>) -> Self {
        Self::UnknownPort(code.into())
    }

    /// Create a backend-unavailable error
    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable(reason.into())
    }

    /// Whether the error was caused by the request rather than the engine.
    ///
    /// Transports map these to a 4xx and must not retry them.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownPort(_))
    }

    /// Recover an owned error from one shared by a coalesced cache load.
    pub(crate) fn from_shared(err: Arc<RiskError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(|shared| match shared.as_ref() {
            Self::UnknownPort(code) => Self::UnknownPort(code.clone()),
            Self::BackendUnavailable(reason) => Self::BackendUnavailable(reason.clone()),
            Self::Computation(e) => Self::Computation(anyhow::anyhow!("{e:#}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_port_is_client_error() {
        let err = RiskError::unknown_port("NLRTM");
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "port NLRTM not found in network");
    }

    #[test]
    fn test_backend_errors_are_not_client_errors() {
        assert!(!RiskError::backend_unavailable("no device").is_client_error());
        let err: RiskError = anyhow::anyhow!("shape mismatch").into();
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_from_shared_preserves_variant() {
        let shared = Arc::new(RiskError::unknown_port("CNSHA"));
        let _other = Arc::clone(&shared);
        let err = RiskError::from_shared(shared);
        assert!(matches!(err, RiskError::UnknownPort(ref c) if c == "CNSHA"));

        let err = RiskError::from_shared(Arc::new(anyhow::anyhow!("nan in head").into()));
        assert!(err.to_string().contains("nan in head"));
    }
}
