//! Baseline strategies: nearest, random, load-balanced
//!
//! These exist to anchor comparisons: they take the same candidate pool
//! and scoring machinery as the real strategies but pick by deliberately
//! simple rules. None of them batches.

use crate::models::order::Order;
use crate::models::registry::FleetSnapshot;
use crate::policy::{
    candidate_pool, scoring, Candidate, Decision, DispatchContext, DispatchStrategy,
};
use crate::rng::RngManager;

/// Single-order candidates for every eligible pooled asset, unranked.
fn single_candidates(
    order: &Order,
    snapshot: &FleetSnapshot,
    ctx: &DispatchContext<'_>,
) -> Vec<Candidate> {
    candidate_pool(order, snapshot, ctx)
        .into_iter()
        .filter_map(|asset| {
            let score = scoring::score_single(asset, order, ctx);
            score.is_eligible().then(|| Candidate {
                asset_id: asset.id().to_string(),
                batch: vec![order.id().to_string()],
                drop_holes: vec![score.predicted_hole],
                score,
            })
        })
        .collect()
}

/// Choose the asset closest to the clubhouse pickup, regardless of type.
#[derive(Debug, Default)]
pub struct NearestStrategy;

impl NearestStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchStrategy for NearestStrategy {
    fn name(&self) -> &'static str {
        "NEAREST"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        let mut candidates = single_candidates(order, snapshot, ctx);
        if candidates.is_empty() {
            return Decision::NoCandidate;
        }
        for c in &mut candidates {
            // the pickup leg is what "nearest" means here
            if let Some(asset) = snapshot.get(&c.asset_id) {
                c.score.final_score = ctx
                    .oracle
                    .expected_travel_to_clubhouse(
                        &asset.location(),
                        asset.kind(),
                        order.time_of_day(),
                    )
                    .unwrap_or(f64::INFINITY);
            }
        }
        Decision::Assign {
            ranked: crate::policy::rank_candidates(candidates),
        }
    }
}

/// Uniformly random choice among eligible assets. Carries its own seeded
/// RNG so runs stay reproducible.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: RngManager,
}

impl RandomStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RngManager::new(seed),
        }
    }
}

impl DispatchStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "RANDOM"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        let mut candidates = single_candidates(order, snapshot, ctx);
        if candidates.is_empty() {
            return Decision::NoCandidate;
        }
        // deterministic Fisher-Yates over the id-ordered pool
        candidates.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        for i in (1..candidates.len()).rev() {
            let j = self.rng.range(0, (i + 1) as i64) as usize;
            candidates.swap(i, j);
        }
        Decision::Assign { ranked: candidates }
    }
}

/// Send the order to whoever has delivered the least so far.
#[derive(Debug, Default)]
pub struct LoadBalancedStrategy;

impl LoadBalancedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchStrategy for LoadBalancedStrategy {
    fn name(&self) -> &'static str {
        "LOAD_BALANCED"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        let mut candidates = single_candidates(order, snapshot, ctx);
        if candidates.is_empty() {
            return Decision::NoCandidate;
        }
        candidates.sort_by(|a, b| {
            let load_a = snapshot
                .get(&a.asset_id)
                .map(|x| x.stats().deliveries)
                .unwrap_or(u32::MAX);
            let load_b = snapshot
                .get(&b.asset_id)
                .map(|x| x.stats().deliveries)
                .unwrap_or(u32::MAX);
            load_a
                .cmp(&load_b)
                .then(
                    a.score
                        .final_score
                        .partial_cmp(&b.score.final_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.asset_id.cmp(&b.asset_id))
        });
        Decision::Assign { ranked: candidates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseMap, Location, LoopId, TimeOfDay};
    use crate::models::asset::Asset;
    use crate::models::registry::AssetRegistry;
    use crate::oracle::PredictionOracle;
    use crate::policy::DispatchParams;

    fn fleet() -> AssetRegistry {
        let mut reg = AssetRegistry::new();
        reg.register(
            Asset::new_cart(
                "cart1".to_string(),
                "Cart Alpha".to_string(),
                LoopId::Front,
                Location::Hole(3),
            )
            .unwrap(),
        )
        .unwrap();
        reg.register(Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        ))
        .unwrap();
        reg.register(Asset::new_staff(
            "staff2".to_string(),
            "Dylan".to_string(),
            Location::Hole(9),
        ))
        .unwrap();
        reg
    }

    fn order() -> Order {
        Order::new("ORD0001".to_string(), 5, vec![], TimeOfDay::Afternoon, 0.0).unwrap()
    }

    #[test]
    fn test_nearest_picks_clubhouse_staff() {
        let oracle = PredictionOracle::new(CourseMap::standard());
        let params = DispatchParams::default();
        let ctx = DispatchContext {
            now: 0.0,
            oracle: &oracle,
            params: &params,
            pending: &[],
        };
        let snapshot = fleet().snapshot(0.0);
        let mut strategy = NearestStrategy::new();
        match strategy.choose(&order(), &snapshot, &ctx) {
            Decision::Assign { ranked } => assert_eq!(ranked[0].asset_id, "staff1"),
            other => panic!("expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let oracle = PredictionOracle::new(CourseMap::standard());
        let params = DispatchParams::default();
        let ctx = DispatchContext {
            now: 0.0,
            oracle: &oracle,
            params: &params,
            pending: &[],
        };
        let snapshot = fleet().snapshot(0.0);

        let pick = |seed| {
            let mut s = RandomStrategy::new(seed);
            match s.choose(&order(), &snapshot, &ctx) {
                Decision::Assign { ranked } => ranked[0].asset_id.clone(),
                other => panic!("expected Assign, got {:?}", other),
            }
        };
        assert_eq!(pick(42), pick(42));
    }

    #[test]
    fn test_load_balanced_prefers_idle_asset() {
        let oracle = PredictionOracle::new(CourseMap::standard());
        let params = DispatchParams::default();
        let ctx = DispatchContext {
            now: 0.0,
            oracle: &oracle,
            params: &params,
            pending: &[],
        };
        let mut reg = fleet();
        reg.get_mut("staff1").unwrap().stats_mut().deliveries = 4;
        reg.get_mut("cart1").unwrap().stats_mut().deliveries = 2;
        // staff2 has zero deliveries and should win
        let snapshot = reg.snapshot(0.0);

        let mut strategy = LoadBalancedStrategy::new();
        match strategy.choose(&order(), &snapshot, &ctx) {
            Decision::Assign { ranked } => assert_eq!(ranked[0].asset_id, "staff2"),
            other => panic!("expected Assign, got {:?}", other),
        }
    }
}
