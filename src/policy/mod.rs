//! Dispatch strategy module
//!
//! Defines the pluggable strategy interface for choosing which asset (and
//! optionally which multi-order batch) serves an order, plus the registry
//! of built-in strategies keyed by name.
//!
//! # Strategy Interface
//!
//! A strategy receives the order under dispatch, an immutable
//! [`FleetSnapshot`](crate::models::FleetSnapshot), and a
//! [`DispatchContext`] (oracle, tunables, the other pending orders). It
//! returns a [`Decision`]: a ranked candidate list for the offer protocol
//! to walk, a delay, or `NoCandidate`.
//!
//! Scoring must be pure: replaying the same snapshot through
//! `score` yields identical results. Strategies that need randomness (the
//! `RANDOM` baseline) carry their own seeded RNG value.

use crate::batching;
use crate::models::asset::{Asset, AssetStatus};
use crate::models::order::Order;
use crate::models::registry::FleetSnapshot;
use crate::oracle::PredictionOracle;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod scoring;

mod baselines;
mod batch_orders;
mod cart_preference;
mod fastest_eta;
mod zone_optimal;

pub use baselines::{LoadBalancedStrategy, NearestStrategy, RandomStrategy};
pub use batch_orders::BatchOrdersStrategy;
pub use cart_preference::CartPreferenceStrategy;
pub use fastest_eta::FastestEtaStrategy;
pub use scoring::ScoreBreakdown;
pub use zone_optimal::ZoneOptimalStrategy;

/// Tunable dispatch parameters with the documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchParams {
    /// Largest batch one asset may carry
    pub max_batch_size: usize,
    /// Largest pairwise hole distance inside a batch
    pub adjacent_hole_threshold: u8,
    /// Extra minutes per additional drop in a batch
    pub batch_delivery_time_penalty_min: f64,
    /// Route-time multiplier per additional order (compounds)
    pub batch_efficiency_bonus: f64,
    /// ETA window inside which carts are preferred
    pub cart_preference_window_min: f64,
    /// Busy assets finishing within this window still count as candidates
    pub soon_available_min: f64,
    /// Golfer pace: minutes per hole
    pub player_pace_min: f64,
    /// Score ties inside this band prefer smaller batches
    pub score_epsilon: f64,
}

impl Default for DispatchParams {
    fn default() -> Self {
        Self {
            max_batch_size: 3,
            adjacent_hole_threshold: 2,
            batch_delivery_time_penalty_min: 2.0,
            batch_efficiency_bonus: 0.85,
            cart_preference_window_min: 10.0,
            soon_available_min: 3.0,
            player_pace_min: 15.0,
            score_epsilon: 0.01,
        }
    }
}

/// Read-only context handed to strategies alongside the fleet snapshot.
pub struct DispatchContext<'a> {
    /// Simulated time at which dispatch was invoked
    pub now: f64,
    pub oracle: &'a PredictionOracle,
    pub params: &'a DispatchParams,
    /// Pending orders other than the one under dispatch (batching pool)
    pub pending: &'a [Order],
}

/// One ranked dispatch option: an asset plus the batch it would serve.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub asset_id: String,
    /// Order ids served together in visit order; always contains the
    /// dispatched order
    pub batch: Vec<String>,
    /// Predicted drop hole per batch entry, aligned with `batch`
    pub drop_holes: Vec<crate::course::Hole>,
    pub score: ScoreBreakdown,
}

/// Outcome of a strategy's `choose`.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Offer down this ranked list (best first)
    Assign { ranked: Vec<Candidate> },
    /// Revisit the order at the given simulated time
    Delay { until: f64 },
    /// No feasible asset exists right now
    NoCandidate,
}

/// A dispatch strategy.
pub trait DispatchStrategy: Send {
    /// Stable strategy name (the config key).
    fn name(&self) -> &'static str;

    /// Produce a decision for `order` against the snapshot.
    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision;

    /// Score a single asset/order pairing (lower is better).
    fn score(&self, asset: &Asset, order: &Order, ctx: &DispatchContext<'_>) -> ScoreBreakdown {
        scoring::score_single(asset, order, ctx)
    }
}

/// Assets eligible to serve `order` right now or soon.
///
/// `Available` and `Returning` assets qualify immediately; busy assets
/// qualify when their route ends within `soon_available_min`. Assets
/// holding an outstanding offer, off-duty assets, and assets that cannot
/// reach the hole (zone, capacity) are excluded.
pub fn candidate_pool<'a>(
    order: &Order,
    snapshot: &'a FleetSnapshot,
    ctx: &DispatchContext<'_>,
) -> Vec<&'a Asset> {
    snapshot
        .assets()
        .iter()
        .filter(|asset| asset.pending_offer().is_none())
        .filter(|asset| asset.serviceable(order.target_hole()))
        .filter(|asset| asset.active_order_count() < ctx.params.max_batch_size)
        .filter(|asset| match asset.status() {
            AssetStatus::Available | AssetStatus::Returning => true,
            AssetStatus::OfferPending | AssetStatus::Offline => false,
            status if status.is_busy() => asset
                .busy_until()
                .map(|t| t - ctx.now <= ctx.params.soon_available_min)
                .unwrap_or(false),
            _ => false,
        })
        .collect()
}

/// Sort candidates best-first: by score, then rejection risk, then id for
/// determinism.
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.score
            .final_score
            .partial_cmp(&b.score.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.score
                    .acceptance_prob
                    .partial_cmp(&a.score.acceptance_prob)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.asset_id.cmp(&b.asset_id))
    });
    candidates
}

/// Shared ranked-choice body: each pooled asset contributes its best
/// planned option (single or batch), and the ranked list is returned.
pub(crate) fn ranked_decision(
    order: &Order,
    snapshot: &FleetSnapshot,
    ctx: &DispatchContext<'_>,
    bias: batching::BatchBias,
    rescore: impl Fn(&Asset, Candidate) -> Candidate,
) -> Decision {
    let pool = candidate_pool(order, snapshot, ctx);
    if pool.is_empty() {
        return Decision::NoCandidate;
    }

    let mut candidates = Vec::with_capacity(pool.len());
    for asset in pool {
        if let Some(option) = batching::best_option_with_bias(asset, order, ctx, bias) {
            candidates.push(rescore(asset, option));
        }
    }

    if candidates.is_empty() {
        Decision::NoCandidate
    } else {
        Decision::Assign {
            ranked: rank_candidates(candidates),
        }
    }
}

/// Strategy selection, the config key for the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyConfig {
    /// Minimize predicted delivery time
    FastestEta,
    /// Multi-factor score with the cart preference window (default)
    CartPreference,
    /// Prefer assets already in the order's zone
    ZoneOptimal,
    /// Aggressive batching variant
    BatchOrders,
    /// Baseline: closest asset to the clubhouse
    Nearest,
    /// Baseline: random eligible asset
    Random { seed: u64 },
    /// Baseline: spread orders evenly across the fleet
    LoadBalanced,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::CartPreference
    }
}

impl StrategyConfig {
    /// Stable name of the configured strategy.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::FastestEta => "FASTEST_ETA",
            StrategyConfig::CartPreference => "CART_PREFERENCE",
            StrategyConfig::ZoneOptimal => "ZONE_OPTIMAL",
            StrategyConfig::BatchOrders => "BATCH_ORDERS",
            StrategyConfig::Nearest => "NEAREST",
            StrategyConfig::Random { .. } => "RANDOM",
            StrategyConfig::LoadBalanced => "LOAD_BALANCED",
        }
    }

    /// Instantiate the configured strategy.
    pub fn build(&self) -> Box<dyn DispatchStrategy> {
        match self {
            StrategyConfig::FastestEta => Box::new(FastestEtaStrategy::new()),
            StrategyConfig::CartPreference => Box::new(CartPreferenceStrategy::new()),
            StrategyConfig::ZoneOptimal => Box::new(ZoneOptimalStrategy::new()),
            StrategyConfig::BatchOrders => Box::new(BatchOrdersStrategy::new()),
            StrategyConfig::Nearest => Box::new(NearestStrategy::new()),
            StrategyConfig::Random { seed } => Box::new(RandomStrategy::new(*seed)),
            StrategyConfig::LoadBalanced => Box::new(LoadBalancedStrategy::new()),
        }
    }
}

impl FromStr for StrategyConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FASTEST_ETA" => Ok(StrategyConfig::FastestEta),
            "CART_PREFERENCE" => Ok(StrategyConfig::CartPreference),
            "ZONE_OPTIMAL" => Ok(StrategyConfig::ZoneOptimal),
            "BATCH_ORDERS" => Ok(StrategyConfig::BatchOrders),
            "NEAREST" => Ok(StrategyConfig::Nearest),
            "RANDOM" => Ok(StrategyConfig::Random { seed: 0 }),
            "LOAD_BALANCED" => Ok(StrategyConfig::LoadBalanced),
            other => Err(format!("unknown strategy name: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names_round_trip() {
        for config in [
            StrategyConfig::FastestEta,
            StrategyConfig::CartPreference,
            StrategyConfig::ZoneOptimal,
            StrategyConfig::BatchOrders,
            StrategyConfig::Nearest,
            StrategyConfig::Random { seed: 0 },
            StrategyConfig::LoadBalanced,
        ] {
            let parsed: StrategyConfig = config.name().parse().unwrap();
            assert_eq!(parsed.name(), config.name());
        }
        assert!("FANCY_ML".parse::<StrategyConfig>().is_err());
    }

    #[test]
    fn test_built_strategy_reports_its_name() {
        let strategy = StrategyConfig::CartPreference.build();
        assert_eq!(strategy.name(), "CART_PREFERENCE");
    }
}
