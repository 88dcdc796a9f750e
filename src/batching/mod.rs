//! Batching planner
//!
//! Given a candidate asset and the order under dispatch, enumerates the
//! zone- and capacity-feasible batches drawn from the pending pool, prices
//! each route, and returns the asset's best option — single delivery or
//! batch — under the multi-factor score.
//!
//! Route cost follows the documented model:
//!
//! ```text
//! route = eta(pickup) + Σ forward-ordered drop legs + penalty·(k−1)
//! route *= efficiency_bonus^(k−1)
//! ```
//!
//! Drops are visited in the order the asset encounters them: carts sweep
//! their loop forward from the clubhouse, staff take a nearest-next walk.
//! Ties inside `score_epsilon` prefer smaller batches (fewer commitments);
//! the aggressive `BATCH_ORDERS` strategy flips that bias.

use crate::course::Hole;
use crate::course::Location;
use crate::models::asset::Asset;
use crate::models::order::{Order, OrderState};
use crate::policy::scoring::{self, DeliveryProjection};
use crate::policy::{Candidate, DispatchContext};

/// One drop on a planned route.
#[derive(Debug, Clone, PartialEq)]
pub struct DropLeg {
    pub order_id: String,
    /// Predicted hole the golfer will have reached
    pub hole: Hole,
    /// Travel minutes from the previous stop
    pub leg_minutes: f64,
}

/// A priced delivery route for one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRoute {
    /// Minutes until the asset stands at the clubhouse
    pub pickup_minutes: f64,
    /// Drops in visit order
    pub legs: Vec<DropLeg>,
    /// Additive handling penalty for extra drops
    pub penalty_minutes: f64,
    /// Compounded efficiency multiplier applied to the whole route
    pub efficiency_factor: f64,
    /// Final route minutes (pickup + legs + penalty, scaled)
    pub route_minutes: f64,
}

/// Tie-break direction when a batch and a smaller option score within ε.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchBias {
    /// Prefer fewer commitments (default)
    Smaller,
    /// Prefer folding more orders in (aggressive batching)
    Larger,
}

/// Pairwise hole-distance feasibility for a batch served by `asset`.
///
/// Carts measure distance along their forward sweep; staff use the
/// minimum-hop distance (clubhouse crossings included).
fn pairwise_feasible(asset: &Asset, holes: &[Hole], ctx: &DispatchContext<'_>) -> bool {
    let threshold = ctx.params.adjacent_hole_threshold;
    let course = ctx.oracle.course();
    if let Some(loop_id) = asset.kind().cart_loop() {
        let positions: Vec<i16> = holes
            .iter()
            .filter_map(|h| course.forward_hops(loop_id.head(), *h).ok())
            .map(|hops| hops as i16)
            .collect();
        if positions.len() != holes.len() {
            return false;
        }
        positions.iter().all(|a| {
            positions
                .iter()
                .all(|b| (a - b).unsigned_abs() as u8 <= threshold)
        })
    } else {
        holes.iter().all(|a| {
            holes
                .iter()
                .all(|b| course.hole_distance(*a, *b).map(|d| d <= threshold).unwrap_or(false))
        })
    }
}

/// Arrange drops in the order the asset encounters them.
fn drop_order(asset: &Asset, members: &[(&Order, DeliveryProjection)], ctx: &DispatchContext<'_>) -> Vec<(String, Hole)> {
    let course = ctx.oracle.course();
    let mut drops: Vec<(String, Hole)> = members
        .iter()
        .map(|(o, p)| (o.id().to_string(), p.predicted_hole))
        .collect();

    if let Some(loop_id) = asset.kind().cart_loop() {
        // forward sweep from the clubhouse-adjacent head
        drops.sort_by_key(|(id, hole)| {
            (
                course.forward_hops(loop_id.head(), *hole).unwrap_or(u8::MAX),
                id.clone(),
            )
        });
        drops
    } else {
        // nearest-next walk starting at the clubhouse
        let mut remaining = drops;
        let mut ordered = Vec::with_capacity(remaining.len());
        let mut at: Option<Hole> = None;
        while !remaining.is_empty() {
            let idx = remaining
                .iter()
                .enumerate()
                .min_by_key(|(_, (id, hole))| {
                    let dist = match at {
                        None => course.hops_to_clubhouse(&Location::Hole(*hole)).unwrap_or(u8::MAX),
                        Some(from) => course.hole_distance(from, *hole).unwrap_or(u8::MAX),
                    };
                    (dist, id.clone())
                })
                .map(|(i, _)| i)
                .expect("remaining is non-empty");
            let next = remaining.remove(idx);
            at = Some(next.1);
            ordered.push(next);
        }
        ordered
    }
}

/// Build and price a route over the batch members.
///
/// Returns `None` when any leg is unreachable for this asset.
pub fn build_route(
    asset: &Asset,
    members: &[(&Order, DeliveryProjection)],
    ctx: &DispatchContext<'_>,
) -> Option<BatchRoute> {
    debug_assert!(!members.is_empty());
    let oracle = ctx.oracle;
    let tod = members[0].0.time_of_day();
    let k = members.len();

    // all members share the asset's pickup leg
    let pickup_minutes = members[0].1.pickup_minutes;

    let mut legs = Vec::with_capacity(k);
    let mut at: Option<Hole> = None;
    for (order_id, hole) in drop_order(asset, members, ctx) {
        let leg_minutes = match at {
            Some(prev) if prev == hole => 0.0,
            Some(prev) => {
                let t = oracle
                    .expected_travel_time(&Location::Hole(prev), hole, asset.kind(), tod)
                    .ok()?;
                if !t.is_finite() {
                    return None;
                }
                t
            }
            None => {
                let t = oracle
                    .expected_travel_time(&Location::Clubhouse, hole, asset.kind(), tod)
                    .ok()?;
                if !t.is_finite() {
                    return None;
                }
                t
            }
        };
        at = Some(hole);
        legs.push(DropLeg {
            order_id,
            hole,
            leg_minutes,
        });
    }

    let penalty_minutes = ctx.params.batch_delivery_time_penalty_min * (k as f64 - 1.0);
    let efficiency_factor = ctx.params.batch_efficiency_bonus.powi(k as i32 - 1);
    let raw = pickup_minutes + legs.iter().map(|l| l.leg_minutes).sum::<f64>() + penalty_minutes;
    let route_minutes = raw * efficiency_factor;

    Some(BatchRoute {
        pickup_minutes,
        legs,
        penalty_minutes,
        efficiency_factor,
        route_minutes,
    })
}

/// The asset's best option for `order`: its single delivery or the best
/// feasible batch including `order`, with the small-batch tie bias.
pub fn best_option_for_asset(
    asset: &Asset,
    order: &Order,
    ctx: &DispatchContext<'_>,
) -> Option<Candidate> {
    best_option_with_bias(asset, order, ctx, BatchBias::Smaller)
}

/// As [`best_option_for_asset`], with an explicit tie bias.
pub fn best_option_with_bias(
    asset: &Asset,
    order: &Order,
    ctx: &DispatchContext<'_>,
    bias: BatchBias,
) -> Option<Candidate> {
    let primary_proj = scoring::project_delivery(asset, order, ctx)?;
    let single_score = scoring::score_single(asset, order, ctx);
    if !single_score.is_eligible() {
        return None;
    }

    // route minutes of serving one member alone: pickup + outbound leg
    let single_route = |proj: &DeliveryProjection| {
        let head_start = proj.prep_minutes.max(proj.pickup_minutes);
        proj.pickup_minutes + (proj.eta_minutes - head_start)
    };

    let mut best = Candidate {
        asset_id: asset.id().to_string(),
        batch: vec![order.id().to_string()],
        drop_holes: vec![primary_proj.predicted_hole],
        score: single_score,
    };

    let extra_capacity = ctx
        .params
        .max_batch_size
        .saturating_sub(asset.active_order_count())
        .saturating_sub(1);
    if extra_capacity == 0 {
        return Some(best);
    }

    // pending orders this asset could fold into the same run
    let pool: Vec<(&Order, DeliveryProjection)> = ctx
        .pending
        .iter()
        .filter(|o| o.id() != order.id() && o.state() == OrderState::Pending)
        .filter(|o| asset.serviceable(o.target_hole()))
        .filter_map(|o| scoring::project_delivery(asset, o, ctx).map(|p| (o, p)))
        .collect();

    for subset in subsets_up_to(pool.len(), extra_capacity) {
        let mut members: Vec<(&Order, DeliveryProjection)> = vec![(order, primary_proj)];
        members.extend(subset.iter().map(|&i| pool[i]));

        let holes: Vec<Hole> = members.iter().map(|(o, _)| o.target_hole()).collect();
        if !pairwise_feasible(asset, &holes, ctx) {
            continue;
        }
        let Some(route) = build_route(asset, &members, ctx) else {
            continue;
        };
        let prep_max = members
            .iter()
            .map(|(_, p)| p.prep_minutes)
            .fold(0.0_f64, f64::max);
        let members_single_route_sum: f64 =
            members.iter().map(|(_, p)| single_route(p)).sum();
        let score = scoring::score_batch(
            asset,
            order,
            primary_proj.predicted_hole,
            prep_max,
            &route,
            members_single_route_sum,
            ctx,
        );

        let epsilon = ctx.params.score_epsilon;
        let candidate_len = members.len();
        let improves = match bias {
            // must beat the incumbent by more than ε unless it is smaller
            BatchBias::Smaller => {
                score.final_score < best.score.final_score - epsilon
                    || (candidate_len < best.batch.len()
                        && score.final_score <= best.score.final_score + epsilon)
            }
            // ties go to the bigger batch
            BatchBias::Larger => {
                score.final_score < best.score.final_score - epsilon
                    || (candidate_len > best.batch.len()
                        && score.final_score <= best.score.final_score + epsilon)
            }
        };
        if improves {
            best = Candidate {
                asset_id: asset.id().to_string(),
                batch: route.legs.iter().map(|l| l.order_id.clone()).collect(),
                drop_holes: route.legs.iter().map(|l| l.hole).collect(),
                score,
            };
        }
    }

    Some(best)
}

/// Index subsets of `{0..n}` with size 1..=`max_len`, smallest first, in
/// deterministic lexicographic order.
fn subsets_up_to(n: usize, max_len: usize) -> Vec<Vec<usize>> {
    fn combos(n: usize, len: usize, start: usize, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if prefix.len() == len {
            out.push(prefix.clone());
            return;
        }
        for i in start..n {
            prefix.push(i);
            combos(n, len, i + 1, prefix, out);
            prefix.pop();
        }
    }

    let mut out = Vec::new();
    for len in 1..=max_len.min(n) {
        combos(n, len, 0, &mut Vec::new(), &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseMap, LoopId, TimeOfDay};
    use crate::models::order::{Complexity, OrderItem};
    use crate::oracle::PredictionOracle;
    use crate::policy::DispatchParams;

    fn oracle() -> PredictionOracle {
        PredictionOracle::new(CourseMap::standard())
    }

    fn order(id: &str, hole: Hole) -> Order {
        let items = vec![OrderItem {
            name: "Bottled Water".to_string(),
            quantity: 1,
            complexity: Complexity::Simple,
            unit_price_cents: 300,
        }];
        Order::new(id.to_string(), hole, items, TimeOfDay::Afternoon, 0.0).unwrap()
    }

    fn ctx<'a>(
        oracle: &'a PredictionOracle,
        params: &'a DispatchParams,
        pending: &'a [Order],
    ) -> DispatchContext<'a> {
        DispatchContext {
            now: 0.0,
            oracle,
            params,
            pending,
        }
    }

    #[test]
    fn test_same_hole_pair_batches() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let pending = vec![order("ORD0002", 5)];
        let ctx = ctx(&oracle, &params, &pending);
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(1),
        )
        .unwrap();
        let primary = order("ORD0001", 5);

        let best = best_option_for_asset(&cart, &primary, &ctx).unwrap();
        assert_eq!(best.batch.len(), 2, "same-hole pair should batch");
        assert!(best.batch.contains(&"ORD0001".to_string()));
        assert!(best.batch.contains(&"ORD0002".to_string()));
    }

    #[test]
    fn test_far_apart_orders_do_not_batch() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let pending = vec![order("ORD0002", 9)];
        let ctx = ctx(&oracle, &params, &pending);
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(1),
        )
        .unwrap();
        let primary = order("ORD0001", 2);

        let best = best_option_for_asset(&cart, &primary, &ctx).unwrap();
        assert_eq!(best.batch, vec!["ORD0001".to_string()]);
    }

    #[test]
    fn test_zone_mismatch_excluded_from_batch() {
        let oracle = oracle();
        let params = DispatchParams::default();
        // back-nine order can never join a front cart's batch
        let pending = vec![order("ORD0002", 10)];
        let ctx = ctx(&oracle, &params, &pending);
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(9),
        )
        .unwrap();
        let primary = order("ORD0001", 9);

        let best = best_option_for_asset(&cart, &primary, &ctx).unwrap();
        assert_eq!(best.batch, vec!["ORD0001".to_string()]);
    }

    #[test]
    fn test_route_cost_formula() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let pending = vec![order("ORD0002", 5)];
        let ctx = ctx(&oracle, &params, &pending);
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(1),
        )
        .unwrap();
        let primary = order("ORD0001", 5);

        let p1 = scoring::project_delivery(&cart, &primary, &ctx).unwrap();
        let p2 = scoring::project_delivery(&cart, &pending[0], &ctx).unwrap();
        let members = vec![(&primary, p1), (&pending[0], p2)];
        let route = build_route(&cart, &members, &ctx).unwrap();

        // cart already at the head: pickup 0, one 4-segment outbound leg,
        // a zero second leg (same hole), 2 min penalty, one bonus power
        assert!(route.pickup_minutes.abs() < 1e-9);
        assert_eq!(route.legs.len(), 2);
        assert!(route.legs[1].leg_minutes.abs() < 1e-9);
        let raw = route.pickup_minutes
            + route.legs.iter().map(|l| l.leg_minutes).sum::<f64>()
            + route.penalty_minutes;
        assert!((route.route_minutes - raw * 0.85).abs() < 1e-9);
        assert!((route.penalty_minutes - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cart_drops_follow_forward_sweep() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let pending = vec![order("ORD0002", 4)];
        let ctx = ctx(&oracle, &params, &pending);
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(1),
        )
        .unwrap();
        // primary at 6, pending at 4: the cart passes 4 first
        let primary = order("ORD0001", 6);
        let p1 = scoring::project_delivery(&cart, &primary, &ctx).unwrap();
        let p2 = scoring::project_delivery(&cart, &pending[0], &ctx).unwrap();
        let members = vec![(&primary, p1), (&pending[0], p2)];
        let route = build_route(&cart, &members, &ctx).unwrap();

        let visit: Vec<&str> = route.legs.iter().map(|l| l.order_id.as_str()).collect();
        assert_eq!(visit, vec!["ORD0002", "ORD0001"]);
    }

    #[test]
    fn test_subsets_enumeration() {
        assert_eq!(subsets_up_to(3, 1), vec![vec![0], vec![1], vec![2]]);
        let two = subsets_up_to(3, 2);
        assert_eq!(
            two,
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![0, 1],
                vec![0, 2],
                vec![1, 2]
            ]
        );
    }
}
