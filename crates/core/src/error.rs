//! Error taxonomy for resilient invocation.
//!
//! Uses `thiserror` for ergonomic error definitions. The four outcome kinds
//! a caller can observe — retryable failure, non-retryable failure, circuit
//! open, deadline exceeded — are all distinct and inspectable; nothing is
//! ever coerced to a generic failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed operation, carried explicitly on the error
/// value rather than inferred from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Transient failure — safe to retry (timeouts, 5xx-class errors,
    /// connection resets).
    Retryable,
    /// Permanent failure — retrying cannot help (malformed request,
    /// authentication rejection, invalid input).
    NonRetryable,
}

impl FailureKind {
    /// Whether this classification permits another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Retryable)
    }
}

/// Implemented by operation error types so the retry policy can read their
/// classification without knowing the concrete error.
pub trait ClassifiedError {
    /// The retryability tag for this failure.
    fn failure_kind(&self) -> FailureKind;
}

/// The outcome of a resilient invocation that did not succeed.
///
/// Generic over the operation's own error type `E`, which is preserved
/// intact inside [`InvokeError::Operation`] so callers can keep inspecting
/// it.
#[derive(Debug, Error)]
pub enum InvokeError<E> {
    /// The circuit for this dependency is open; the operation was never
    /// invoked. Distinct from the dependency's own failures so callers can
    /// give it different user-facing treatment (e.g. "service busy").
    #[error("circuit open for dependency '{dependency}'")]
    CircuitOpen {
        /// Name of the unhealthy dependency.
        dependency: String,
    },

    /// The overall deadline elapsed before the operation succeeded.
    #[error("deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded {
        /// Attempts started before the deadline fired.
        attempts: u32,
    },

    /// The operation failed and retries were exhausted, or the failure was
    /// classified non-retryable. The last operation error is preserved.
    #[error("operation failed after {attempts} attempt(s)")]
    Operation {
        /// Attempts made before giving up.
        attempts: u32,
        /// The final error returned by the operation.
        #[source]
        source: E,
    },
}

impl<E> InvokeError<E> {
    /// The last operation error, if this outcome carries one.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            InvokeError::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the failure was a fail-fast rejection (circuit open).
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, InvokeError::CircuitOpen { .. })
    }
}
