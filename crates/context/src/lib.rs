//! Bounded context assembly — fit ranked content into a hard capacity budget.
//!
//! Content units are grouped into four priority tiers
//! (`PINNED > RECENT > RELEVANT > HISTORICAL`) and selected in that fixed
//! order, never exceeding the budget — with one documented exception:
//! PINNED units are non-negotiable and are accepted even when they drive
//! the budget negative, flagged as `pinned_overflow` in the result.
//!
//! Assembly is pure: no I/O, no shared state, deterministic for identical
//! inputs. Costs come from a [`CostEstimator`], which must be
//! monotonic-additive (the cost of a sequence is the sum of unit costs)
//! since selection relies on simple running subtraction.

pub mod assembler;
pub mod estimate;

pub use assembler::{
    AssembledContext, AssembledUnit, ContentUnit, ContextAssembler, Tier, TierPools, TierStats,
};
pub use estimate::{CharEstimator, CostEstimator};
