//! Tiered context assembly under a hard budget.
//!
//! Processes tiers in fixed priority order. Within a tier, units keep their
//! caller-supplied relevance order; a unit that does not fit is skipped —
//! not the rest of the tier, since a smaller unit later may still fit.
//! PINNED units are exempt from rejection entirely.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::estimate::CostEstimator;

// ── Types ─────────────────────────────────────────────────────────────────

/// Priority tiers, highest first. Selection always proceeds in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Non-negotiable content (e.g. the system directive). Never rejected,
    /// even over budget.
    Pinned,
    /// Most recent conversational turns.
    Recent,
    /// Retrieved material ranked by relevance.
    Relevant,
    /// Older material kept on a best-effort basis.
    Historical,
}

impl Tier {
    /// All tiers in selection order.
    pub const ALL: [Tier; 4] = [Tier::Pinned, Tier::Recent, Tier::Relevant, Tier::Historical];

    /// Stable lowercase name for logs and metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Pinned => "pinned",
            Tier::Recent => "recent",
            Tier::Relevant => "relevant",
            Tier::Historical => "historical",
        }
    }
}

/// An opaque content payload. The assembler only reads it, never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// The content itself.
    pub payload: String,
    /// Optional caller-supplied label (source file, message id, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ContentUnit {
    /// A unit with no label.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            label: None,
        }
    }

    /// A unit carrying a label.
    pub fn labeled(payload: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            label: Some(label.into()),
        }
    }
}

/// The four ranked content pools, one per tier. Order within a pool is the
/// caller's relevance order and is preserved in the output.
#[derive(Debug, Clone, Default)]
pub struct TierPools {
    pub pinned: Vec<ContentUnit>,
    pub recent: Vec<ContentUnit>,
    pub relevant: Vec<ContentUnit>,
    pub historical: Vec<ContentUnit>,
}

impl TierPools {
    /// The pool for a tier.
    pub fn pool(&self, tier: Tier) -> &[ContentUnit] {
        match tier {
            Tier::Pinned => &self.pinned,
            Tier::Recent => &self.recent,
            Tier::Relevant => &self.relevant,
            Tier::Historical => &self.historical,
        }
    }
}

/// An accepted unit, tagged with its tier and estimated cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledUnit {
    pub tier: Tier,
    pub unit: ContentUnit,
    pub cost: u64,
}

/// Per-tier selection statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStats {
    /// Which tier.
    pub tier: Tier,
    /// Budget units consumed by this tier.
    pub cost: u64,
    /// Units accepted.
    pub included: usize,
    /// Units available before selection.
    pub total: usize,
}

/// The result of one assembly call. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Accepted units in tier order, input order preserved within a tier.
    pub units: Vec<AssembledUnit>,
    /// Total budget units consumed. May exceed the budget only when
    /// `pinned_overflow` is set.
    pub total_cost: u64,
    /// Whether any unit at any tier was skipped for lack of budget.
    pub truncated: bool,
    /// Whether PINNED content alone exceeded the budget. When set, no
    /// lower-tier unit was accepted.
    pub pinned_overflow: bool,
    /// Per-tier statistics in selection order.
    pub per_tier: Vec<TierStats>,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless — create one and reuse it; every call
/// is independent and needs no locking.
pub struct ContextAssembler<E> {
    estimator: E,
}

impl<E: CostEstimator> ContextAssembler<E> {
    /// Create an assembler around a cost estimator.
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    /// Select units from `pools` into a context consuming at most `budget`
    /// units — except for PINNED, which is always accepted and may drive
    /// the budget negative.
    ///
    /// Deterministic: identical inputs produce identical output.
    pub fn assemble(&self, budget: u64, pools: &TierPools) -> AssembledContext {
        // Signed so an oversized PINNED tier can push it below zero.
        let mut remaining = budget as i128;
        let mut units = Vec::new();
        let mut per_tier = Vec::with_capacity(Tier::ALL.len());
        let mut truncated = false;

        for tier in Tier::ALL {
            let pool = pools.pool(tier);
            let mut tier_cost: u64 = 0;
            let mut included = 0usize;

            for unit in pool {
                let cost = self.estimator.cost(unit);
                let accept = if tier == Tier::Pinned {
                    true
                } else {
                    cost as i128 <= remaining
                };
                if accept {
                    remaining -= cost as i128;
                    tier_cost += cost;
                    included += 1;
                    units.push(AssembledUnit {
                        tier,
                        unit: unit.clone(),
                        cost,
                    });
                } else {
                    // Keep scanning: a smaller unit later may still fit.
                    truncated = true;
                }
            }

            per_tier.push(TierStats {
                tier,
                cost: tier_cost,
                included,
                total: pool.len(),
            });
        }

        let pinned_overflow = per_tier[0].cost as i128 > budget as i128;
        let total_cost: u64 = per_tier.iter().map(|s| s.cost).sum();

        debug!(
            budget,
            total_cost,
            truncated,
            pinned_overflow,
            accepted = units.len(),
            "context assembled"
        );

        AssembledContext {
            units,
            total_cost,
            truncated,
            pinned_overflow,
            per_tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test estimator: one budget unit per byte, so costs are exact.
    struct ByteEstimator;

    impl CostEstimator for ByteEstimator {
        fn cost(&self, unit: &ContentUnit) -> u64 {
            unit.payload.len() as u64
        }
    }

    fn unit_of_cost(cost: usize) -> ContentUnit {
        ContentUnit::new("x".repeat(cost))
    }

    fn assembler() -> ContextAssembler<ByteEstimator> {
        ContextAssembler::new(ByteEstimator)
    }

    fn stats(ctx: &AssembledContext, tier: Tier) -> &TierStats {
        ctx.per_tier.iter().find(|s| s.tier == tier).unwrap()
    }

    #[test]
    fn everything_fits_under_generous_budget() {
        let pools = TierPools {
            pinned: vec![unit_of_cost(10)],
            recent: vec![unit_of_cost(20), unit_of_cost(20)],
            relevant: vec![unit_of_cost(30)],
            historical: vec![unit_of_cost(15)],
        };

        let ctx = assembler().assemble(1000, &pools);
        assert_eq!(ctx.units.len(), 5);
        assert_eq!(ctx.total_cost, 95);
        assert!(!ctx.truncated);
        assert!(!ctx.pinned_overflow);
    }

    #[test]
    fn worked_example_budget_100() {
        // PINNED cost 30, RECENT costs [40, 40, 40]: accept PINNED and the
        // first RECENT unit, reject the other two.
        let pools = TierPools {
            pinned: vec![unit_of_cost(30)],
            recent: vec![unit_of_cost(40), unit_of_cost(40), unit_of_cost(40)],
            ..Default::default()
        };

        let ctx = assembler().assemble(100, &pools);
        assert_eq!(ctx.total_cost, 70);
        assert!(ctx.truncated);
        assert!(!ctx.pinned_overflow);
        assert_eq!(stats(&ctx, Tier::Pinned).included, 1);
        assert_eq!(stats(&ctx, Tier::Recent).included, 1);
        assert_eq!(stats(&ctx, Tier::Recent).total, 3);
    }

    #[test]
    fn skipped_unit_does_not_abort_the_tier() {
        // The 50-cost unit doesn't fit, but the 10-cost unit after it does.
        let pools = TierPools {
            recent: vec![unit_of_cost(50), unit_of_cost(10)],
            ..Default::default()
        };

        let ctx = assembler().assemble(20, &pools);
        assert_eq!(ctx.units.len(), 1);
        assert_eq!(ctx.units[0].cost, 10);
        assert!(ctx.truncated);
    }

    #[test]
    fn oversized_pinned_is_still_accepted() {
        let pools = TierPools {
            pinned: vec![unit_of_cost(150)],
            recent: vec![unit_of_cost(5)],
            relevant: vec![unit_of_cost(1)],
            historical: vec![unit_of_cost(1)],
        };

        let ctx = assembler().assemble(100, &pools);
        assert!(ctx.pinned_overflow);
        assert!(ctx.truncated);
        assert_eq!(stats(&ctx, Tier::Pinned).included, 1);
        assert_eq!(ctx.total_cost, 150);
        // Negative budget after PINNED starves every later tier, even for
        // tiny units.
        assert_eq!(stats(&ctx, Tier::Recent).included, 0);
        assert_eq!(stats(&ctx, Tier::Relevant).included, 0);
        assert_eq!(stats(&ctx, Tier::Historical).included, 0);
    }

    #[test]
    fn multiple_pinned_units_all_accepted() {
        let pools = TierPools {
            pinned: vec![unit_of_cost(60), unit_of_cost(60)],
            ..Default::default()
        };

        let ctx = assembler().assemble(100, &pools);
        assert_eq!(stats(&ctx, Tier::Pinned).included, 2);
        assert_eq!(ctx.total_cost, 120);
        assert!(ctx.pinned_overflow);
    }

    #[test]
    fn priority_order_starves_lower_tiers_first() {
        let pools = TierPools {
            recent: vec![unit_of_cost(40)],
            relevant: vec![unit_of_cost(40)],
            historical: vec![unit_of_cost(40)],
            ..Default::default()
        };

        let ctx = assembler().assemble(90, &pools);
        assert_eq!(stats(&ctx, Tier::Recent).included, 1);
        assert_eq!(stats(&ctx, Tier::Relevant).included, 1);
        assert_eq!(stats(&ctx, Tier::Historical).included, 0);
        assert!(ctx.truncated);
    }

    #[test]
    fn order_within_tier_is_preserved() {
        let pools = TierPools {
            recent: vec![
                ContentUnit::labeled("aaaa", "first"),
                ContentUnit::labeled("bbbb", "second"),
                ContentUnit::labeled("cccc", "third"),
            ],
            ..Default::default()
        };

        let ctx = assembler().assemble(100, &pools);
        let labels: Vec<_> = ctx
            .units
            .iter()
            .map(|u| u.unit.label.as_deref().unwrap())
            .collect();
        assert_eq!(labels, ["first", "second", "third"]);
    }

    #[test]
    fn zero_cost_units_fit_exhausted_budget() {
        let pools = TierPools {
            recent: vec![unit_of_cost(10), ContentUnit::new("")],
            ..Default::default()
        };

        let ctx = assembler().assemble(10, &pools);
        assert_eq!(ctx.units.len(), 2);
        assert!(!ctx.truncated);
    }

    #[test]
    fn empty_pools_produce_empty_context() {
        let ctx = assembler().assemble(100, &TierPools::default());
        assert!(ctx.units.is_empty());
        assert_eq!(ctx.total_cost, 0);
        assert!(!ctx.truncated);
        assert!(!ctx.pinned_overflow);
        assert_eq!(ctx.per_tier.len(), 4);
    }

    #[test]
    fn assembly_is_idempotent() {
        let pools = TierPools {
            pinned: vec![unit_of_cost(30)],
            recent: vec![unit_of_cost(40), unit_of_cost(40)],
            relevant: vec![unit_of_cost(25)],
            historical: vec![unit_of_cost(5)],
        };

        let asm = assembler();
        let a = asm.assemble(100, &pools);
        let b = asm.assemble(100, &pools);

        assert_eq!(a.total_cost, b.total_cost);
        assert_eq!(a.truncated, b.truncated);
        assert_eq!(a.units.len(), b.units.len());
        for (x, y) in a.units.iter().zip(b.units.iter()) {
            assert_eq!(x.tier, y.tier);
            assert_eq!(x.cost, y.cost);
            assert_eq!(x.unit, y.unit);
        }
    }

    #[test]
    fn metadata_totals_accurate() {
        let pools = TierPools {
            pinned: vec![unit_of_cost(10)],
            recent: vec![unit_of_cost(20)],
            relevant: vec![unit_of_cost(30)],
            historical: vec![unit_of_cost(40)],
        };

        let ctx = assembler().assemble(1000, &pools);
        let sum: u64 = ctx.per_tier.iter().map(|s| s.cost).sum();
        assert_eq!(ctx.total_cost, sum);
        let unit_sum: u64 = ctx.units.iter().map(|u| u.cost).sum();
        assert_eq!(ctx.total_cost, unit_sum);
    }

    #[test]
    fn metadata_serializes() {
        let pools = TierPools {
            pinned: vec![unit_of_cost(30)],
            ..Default::default()
        };
        let ctx = assembler().assemble(100, &pools);
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"pinned\""));
        assert!(json.contains("\"total_cost\":30"));
    }
}
