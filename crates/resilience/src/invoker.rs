//! Resilient invoker — retries behind the circuit breaker.
//!
//! The single entry point external callers use. Each attempt first asks the
//! dependency's breaker for admission; a rejection fails the *whole* call
//! with `CircuitOpen` immediately — no delay, no further attempts,
//! regardless of remaining retry budget. Admitted attempts report their
//! outcome to the breaker, and failures consult the retry policy for the
//! next delay.
//!
//! Waits suspend only the calling task (`tokio::time::sleep`); other
//! operations — against the same dependency or others — proceed
//! independently. An optional overall deadline spans the full attempt loop:
//! when it elapses mid-wait or mid-attempt the loop aborts with
//! `DeadlineExceeded`, and an attempt cut off with its outcome unknown is
//! not scored against the breaker.

use std::sync::Arc;
use std::time::Duration;

use tidegate_core::{ClassifiedError, InvokeError};
use tracing::{debug, warn};

use crate::breaker::{Admission, BreakerRegistry};
use crate::retry::{RetryDecision, RetryPolicy};

/// Wraps fallible operations with breaker gating and retry-with-backoff.
///
/// Holds only the registry handle; all per-call state is the loop counter.
pub struct ResilientInvoker {
    registry: Arc<BreakerRegistry>,
}

impl ResilientInvoker {
    /// Create an invoker over an explicit, shared breaker registry.
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this invoker consults.
    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Run `operation` under the breaker for `dependency` and the given
    /// retry policy, with no overall deadline.
    pub async fn execute<T, E, F, Fut>(
        &self,
        dependency: &str,
        policy: &RetryPolicy,
        operation: F,
    ) -> Result<T, InvokeError<E>>
    where
        E: ClassifiedError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(dependency, policy, None, operation).await
    }

    /// Like [`execute`](Self::execute), but the whole attempt loop —
    /// attempts and backoff waits alike — must finish within `deadline`.
    pub async fn execute_with_deadline<T, E, F, Fut>(
        &self,
        dependency: &str,
        policy: &RetryPolicy,
        deadline: Duration,
        operation: F,
    ) -> Result<T, InvokeError<E>>
    where
        E: ClassifiedError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(dependency, policy, Some(deadline), operation).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        dependency: &str,
        policy: &RetryPolicy,
        deadline: Option<Duration>,
        mut operation: F,
    ) -> Result<T, InvokeError<E>>
    where
        E: ClassifiedError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.registry.breaker(dependency);
        let deadline_at = deadline.map(|d| tokio::time::Instant::now() + d);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let permit = match breaker.allow() {
                Admission::Admitted(permit) => permit,
                Admission::Rejected => {
                    debug!(dependency, attempt, "circuit open, failing fast");
                    return Err(InvokeError::CircuitOpen {
                        dependency: dependency.to_string(),
                    });
                }
            };

            let outcome = match deadline_at {
                Some(at) => match tokio::time::timeout_at(at, operation()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        // The attempt future was dropped mid-flight; its
                        // outcome is unknown, so the permit goes unscored.
                        drop(permit);
                        warn!(dependency, attempt, "deadline elapsed mid-attempt");
                        return Err(InvokeError::DeadlineExceeded { attempts: attempt });
                    }
                },
                None => operation().await,
            };

            let err = match outcome {
                Ok(value) => {
                    permit.record_success();
                    debug!(dependency, attempt, "operation succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    permit.record_failure();
                    err
                }
            };

            match policy.decide(attempt, err.failure_kind()) {
                RetryDecision::Stop => {
                    return Err(InvokeError::Operation {
                        attempts: attempt,
                        source: err,
                    });
                }
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        dependency,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, backing off"
                    );
                    if let Some(at) = deadline_at {
                        if tokio::time::Instant::now() + delay >= at {
                            // The wait would outlive the deadline.
                            tokio::time::sleep_until(at).await;
                            return Err(InvokeError::DeadlineExceeded { attempts: attempt });
                        }
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
