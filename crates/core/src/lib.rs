//! # Tidegate Core
//!
//! Domain types, error taxonomy, and the clock abstraction for Tidegate.
//! This crate has **zero framework dependencies** — it defines the vocabulary
//! that the resilience and context crates implement against.
//!
//! ## Design Philosophy
//!
//! Failure classification is a *tag carried on the error value*, not an
//! exception hierarchy: fallible operations implement [`ClassifiedError`]
//! and the retry machinery inspects [`FailureKind`] explicitly. Time is
//! injected through the [`Clock`] trait so every time-based breaker
//! transition is testable without sleeping.

pub mod clock;
pub mod error;

// Re-export key types at crate root for ergonomics
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ClassifiedError, FailureKind, InvokeError};
