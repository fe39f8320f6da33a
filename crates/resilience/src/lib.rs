//! Fault-tolerant invocation — retry with backoff behind a circuit breaker.
//!
//! The crate composes three pieces:
//!
//! 1. **[`RetryPolicy`]** — pure backoff scheduling: exponential delay with
//!    a cap and uniform jitter, stopping on exhaustion or a non-retryable
//!    classification.
//! 2. **[`CircuitBreaker`]** — per-dependency health tracking through the
//!    CLOSED → OPEN → HALF_OPEN state machine, with a single admitted probe
//!    during recovery. Breakers live in an explicit [`BreakerRegistry`],
//!    created lazily per dependency name.
//! 3. **[`ResilientInvoker`]** — the single entry point callers use: wraps
//!    an arbitrary fallible async operation with both protections and an
//!    optional overall deadline.
//!
//! An open circuit short-circuits the *entire* retry loop, not just one
//! attempt: remaining retry budget is irrelevant once the dependency is
//! known unhealthy.

pub mod breaker;
pub mod invoker;
pub mod retry;

pub use breaker::{
    Admission, BreakerConfig, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState,
    Permit,
};
pub use invoker::ResilientInvoker;
pub use retry::{RetryDecision, RetryPolicy};
