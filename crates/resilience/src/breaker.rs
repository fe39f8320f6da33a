//! Circuit breaker — per-dependency health tracking with fail-fast.
//!
//! # States
//!
//! ```text
//! CLOSED    → OPEN:      consecutive failures reach failure_threshold
//! OPEN      → HALF_OPEN: first call attempted after open_timeout elapses
//! HALF_OPEN → CLOSED:    the single admitted probe succeeds
//! HALF_OPEN → OPEN:      the probe fails (timeout countdown restarts)
//! ```
//!
//! Exactly one probe is admitted in HALF_OPEN; every other concurrent
//! caller keeps failing fast until that probe resolves. All health mutation
//! happens under one mutex, so an `allow()`/`record_*()` pair always
//! observes a consistent snapshot — no lost counter updates under
//! concurrent load.
//!
//! Admitted callers receive a [`Permit`] that must be resolved exactly once.
//! A permit dropped unresolved (the attempt's outcome was unknown at
//! teardown) is never scored; if it carried the HALF_OPEN probe, the
//! breaker returns to OPEN with a fresh timeout so probing can recur.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tidegate_core::{Clock, SystemClock};
use tracing::{debug, info, warn};

// ── Configuration ─────────────────────────────────────────────────────────

/// Breaker thresholds, shared by every breaker a registry creates.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in CLOSED that trip the breaker (≥ 1).
    pub failure_threshold: u32,
    /// How long OPEN rejects before admitting a recovery probe.
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

// ── State machine ─────────────────────────────────────────────────────────

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Dependency assumed down; calls fail fast.
    Open,
    /// Probing recovery; one call admitted, the rest rejected.
    HalfOpen,
}

/// The shared health record for one dependency.
#[derive(Debug)]
struct Health {
    state: CircuitState,
    consecutive_failures: u32,
    last_transition: Instant,
}

/// A point-in-time view of a breaker's health, for observability callers.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Dependency name this breaker guards.
    pub dependency: String,
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures recorded in CLOSED.
    pub consecutive_failures: u32,
}

// ── Breaker ───────────────────────────────────────────────────────────────

/// Health tracker for a single named dependency.
///
/// Shared (`Arc`) across every caller invoking that dependency; all
/// mutation is linearized through the internal mutex.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    health: Mutex<Health>,
}

/// The admission decision from [`CircuitBreaker::allow`].
pub enum Admission {
    /// Call admitted; resolve the permit exactly once.
    Admitted(Permit),
    /// Circuit is open (or a probe is already in flight): fail fast.
    Rejected,
}

/// Role of an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitRole {
    /// Ordinary call admitted in CLOSED.
    Standard,
    /// The single recovery probe admitted in HALF_OPEN.
    Probe,
}

/// Token proving a call was admitted. Must be resolved exactly once with
/// [`Permit::record_success`] or [`Permit::record_failure`]; dropping it
/// unresolved leaves the outcome unscored.
pub struct Permit {
    breaker: Arc<CircuitBreaker>,
    role: PermitRole,
    resolved: bool,
}

impl Permit {
    /// Report that the admitted call succeeded.
    pub fn record_success(mut self) {
        self.resolved = true;
        self.breaker.on_outcome(self.role, true);
    }

    /// Report that the admitted call failed.
    pub fn record_failure(mut self) {
        self.resolved = true;
        self.breaker.on_outcome(self.role, false);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.on_abandoned(self.role);
        }
    }
}

impl CircuitBreaker {
    fn new(name: String, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            name,
            config,
            clock,
            health: Mutex::new(Health {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_transition: now,
            }),
        }
    }

    /// Dependency name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decide whether a call may proceed.
    ///
    /// Rejections never mutate the health record. The only mutation on the
    /// admit path is the OPEN → HALF_OPEN transition when the timeout has
    /// elapsed, which also claims the probe slot for the admitted caller.
    pub fn allow(self: &Arc<Self>) -> Admission {
        let mut health = self.health.lock().unwrap();
        match health.state {
            CircuitState::Closed => Admission::Admitted(Permit {
                breaker: Arc::clone(self),
                role: PermitRole::Standard,
                resolved: false,
            }),
            CircuitState::Open => {
                let elapsed = self.clock.now().duration_since(health.last_transition);
                if elapsed < self.config.open_timeout {
                    debug!(dependency = %self.name, "circuit open, rejecting call");
                    return Admission::Rejected;
                }
                // Timeout elapsed: this caller becomes the recovery probe.
                // HALF_OPEN itself marks the probe slot as taken; the state
                // only changes again when the probe resolves or is dropped.
                self.transition(&mut health, CircuitState::HalfOpen);
                Admission::Admitted(Permit {
                    breaker: Arc::clone(self),
                    role: PermitRole::Probe,
                    resolved: false,
                })
            }
            CircuitState::HalfOpen => {
                debug!(dependency = %self.name, "probe in flight, rejecting call");
                Admission::Rejected
            }
        }
    }

    /// Current state and failure count.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let health = self.health.lock().unwrap();
        BreakerSnapshot {
            dependency: self.name.clone(),
            state: health.state,
            consecutive_failures: health.consecutive_failures,
        }
    }

    fn on_outcome(&self, role: PermitRole, success: bool) {
        let mut health = self.health.lock().unwrap();
        match role {
            PermitRole::Probe => {
                if success {
                    info!(dependency = %self.name, "probe succeeded, closing circuit");
                    self.transition(&mut health, CircuitState::Closed);
                    health.consecutive_failures = 0;
                } else {
                    warn!(dependency = %self.name, "probe failed, reopening circuit");
                    self.transition(&mut health, CircuitState::Open);
                }
            }
            PermitRole::Standard => {
                // The breaker may have tripped while this call was in
                // flight; outcomes only score against a CLOSED circuit.
                if health.state != CircuitState::Closed {
                    return;
                }
                if success {
                    health.consecutive_failures = 0;
                } else {
                    health.consecutive_failures += 1;
                    if health.consecutive_failures >= self.config.failure_threshold {
                        warn!(
                            dependency = %self.name,
                            failures = health.consecutive_failures,
                            "failure threshold reached, opening circuit"
                        );
                        self.transition(&mut health, CircuitState::Open);
                    }
                }
            }
        }
    }

    fn on_abandoned(&self, role: PermitRole) {
        if role != PermitRole::Probe {
            return;
        }
        // A lost probe must not wedge HALF_OPEN: return to OPEN with a
        // fresh timeout, unscored.
        let mut health = self.health.lock().unwrap();
        if health.state == CircuitState::HalfOpen {
            warn!(dependency = %self.name, "probe abandoned, reopening circuit");
            self.transition(&mut health, CircuitState::Open);
        }
    }

    fn transition(&self, health: &mut Health, to: CircuitState) {
        info!(
            dependency = %self.name,
            from = ?health.state,
            to = ?to,
            "circuit state transition"
        );
        health.state = to;
        health.last_transition = self.clock.now();
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

/// Process-wide registry of breakers keyed by dependency name.
///
/// Explicit and constructor-injected — no module-level state. Breakers are
/// created lazily on first reference and live for the registry's lifetime.
pub struct BreakerRegistry {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry using the system clock.
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry with an injected clock (manual clocks in tests).
    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// The breaker for `dependency`, created on first reference.
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        Arc::clone(breakers.entry(dependency.to_string()).or_insert_with(|| {
            debug!(dependency, "creating circuit breaker");
            Arc::new(CircuitBreaker::new(
                dependency.to_string(),
                self.config.clone(),
                Arc::clone(&self.clock),
            ))
        }))
    }

    /// Snapshots of every breaker created so far.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers = self.breakers.lock().unwrap();
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        snapshots
    }
}
