//! Multi-factor scoring shared by the built-in strategies
//!
//! The score of an asset/order (or asset/batch) pairing combines:
//!
//! ```text
//! final = 1.0 · eta_score            predicted delivery minutes
//!       + 0.5 · distance_score       return-to-clubhouse cost proxy
//!       + 0.3 · asset_type_score     cart bias inside the preference window
//!       + 0.2 · predictability_score player drift variance
//! ```
//!
//! Lower is better. All estimates come from the oracle's expected (never
//! perturbed) forms, so a score is replayable from a snapshot.

use crate::batching::BatchRoute;
use crate::course::{Hole, Location};
use crate::models::asset::{Asset, AssetKind};
use crate::models::order::Order;
use crate::policy::DispatchContext;

/// Weight of the predicted delivery time.
pub const W_ETA: f64 = 1.0;
/// Weight of the return-cost proxy.
pub const W_DISTANCE: f64 = 0.5;
/// Weight of the asset-type bias.
pub const W_ASSET_TYPE: f64 = 0.3;
/// Weight of the prediction-uncertainty term.
pub const W_PREDICTABILITY: f64 = 0.2;
/// Scale on the drift variance (σ² · k).
pub const PREDICTABILITY_VARIANCE_SCALE: f64 = 2.0;
/// Asset-type component for a cart inside the preference window.
pub const CART_BIAS: f64 = -1.0;

/// Score components for one dispatch option. Lower `final_score` is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub final_score: f64,
    /// Predicted delivery time in minutes (prep overlap included)
    pub eta_minutes: f64,
    /// Hole the golfer is expected to reach by delivery
    pub predicted_hole: Hole,
    /// Oracle acceptance probability for this candidate
    pub acceptance_prob: f64,
    pub eta_score: f64,
    pub distance_score: f64,
    pub asset_type_score: f64,
    pub predictability_score: f64,
    /// Extra minutes relative to serving the dispatched order alone
    /// (zero for single-order options)
    pub batch_adjustment: f64,
}

impl ScoreBreakdown {
    /// Marker for an asset that cannot serve the order (zone mismatch).
    pub fn ineligible(hole: Hole) -> Self {
        Self {
            final_score: f64::INFINITY,
            eta_minutes: f64::INFINITY,
            predicted_hole: hole,
            acceptance_prob: 0.0,
            eta_score: f64::INFINITY,
            distance_score: 0.0,
            asset_type_score: 0.0,
            predictability_score: 0.0,
            batch_adjustment: 0.0,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.final_score.is_finite()
    }
}

/// Where a delivery to one order would land and how long it would take.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryProjection {
    pub predicted_hole: Hole,
    /// Full delivery minutes: max(prep, reach pickup) + outbound travel
    pub eta_minutes: f64,
    pub prep_minutes: f64,
    /// Minutes until the asset stands at the clubhouse, route end included
    pub pickup_minutes: f64,
}

/// Project a delivery of `order` by `asset`: prep, pickup leg, and the
/// player-pace fixed point deciding the target hole.
///
/// Returns `None` when the asset cannot reach the (possibly drifted)
/// target — for carts that means the prediction left their loop.
pub fn project_delivery(
    asset: &Asset,
    order: &Order,
    ctx: &DispatchContext<'_>,
) -> Option<DeliveryProjection> {
    let oracle = ctx.oracle;
    let tod = order.time_of_day();
    let kind = asset.kind();

    let prep_minutes = oracle.expected_prep_time(order.items());

    // busy-but-finishing-soon assets start their pickup leg late
    let ready_delay = asset
        .busy_until()
        .map(|t| (t - ctx.now).max(0.0))
        .unwrap_or(0.0);
    let pickup_minutes = ready_delay
        + oracle
            .expected_travel_to_clubhouse(&asset.location(), kind, tod)
            .ok()?;

    let head_start = prep_minutes.max(pickup_minutes);
    let (predicted_hole, eta_minutes) =
        oracle
            .course()
            .predict_drop_hole(order.target_hole(), ctx.params.player_pace_min, |h| {
                match oracle.expected_travel_time(&Location::Clubhouse, h, kind, tod) {
                    Ok(out) => head_start + out,
                    Err(_) => f64::INFINITY,
                }
            });

    if !eta_minutes.is_finite() {
        return None;
    }

    Some(DeliveryProjection {
        predicted_hole,
        eta_minutes,
        prep_minutes,
        pickup_minutes,
    })
}

fn compose(
    asset: &Asset,
    primary: &Order,
    eta_score: f64,
    predicted_hole: Hole,
    last_drop_hole: Hole,
    batch_adjustment: f64,
    ctx: &DispatchContext<'_>,
) -> ScoreBreakdown {
    let oracle = ctx.oracle;
    let tod = primary.time_of_day();

    // return-cost proxy on the walkable metric for both kinds; a cart's
    // forward-only wrap would make the term incomparable across types
    let distance_score = oracle
        .expected_travel_to_clubhouse(
            &Location::Hole(last_drop_hole),
            AssetKind::DeliveryStaff,
            tod,
        )
        .unwrap_or(0.0);

    let asset_type_score =
        if asset.kind().is_cart() && eta_score <= ctx.params.cart_preference_window_min {
            CART_BIAS
        } else {
            0.0
        };

    // drift variance under a Poisson hole-advance assumption: σ² ≈ mean
    let drift_variance = eta_score / ctx.params.player_pace_min;
    let predictability_score = drift_variance * PREDICTABILITY_VARIANCE_SCALE;

    let final_score = W_ETA * eta_score
        + W_DISTANCE * distance_score
        + W_ASSET_TYPE * asset_type_score
        + W_PREDICTABILITY * predictability_score
        + batch_adjustment;

    ScoreBreakdown {
        final_score,
        eta_minutes: eta_score,
        predicted_hole,
        acceptance_prob: oracle.predict_acceptance(asset, primary),
        eta_score,
        distance_score,
        asset_type_score,
        predictability_score,
        batch_adjustment,
    }
}

/// Score a single asset/order pairing.
pub fn score_single(asset: &Asset, order: &Order, ctx: &DispatchContext<'_>) -> ScoreBreakdown {
    match project_delivery(asset, order, ctx) {
        None => ScoreBreakdown::ineligible(order.target_hole()),
        Some(proj) => compose(
            asset,
            order,
            proj.eta_minutes,
            proj.predicted_hole,
            proj.predicted_hole,
            0.0,
            ctx,
        ),
    }
}

/// Score a batch option over a built route.
///
/// `primary` is the order under dispatch; `prep_max` the slowest member
/// prep. The eta component is the route time with prep overlap added back
/// (the asset waits at the store when prep outruns its pickup leg).
///
/// `members_single_route_sum` is what serving every member in its own run
/// would cost; the difference to the batched route is the batch
/// adjustment, negative when the shared sweep saves fleet time. It enters
/// the final score directly, which is what makes a good batch outrank the
/// single-order baseline.
pub fn score_batch(
    asset: &Asset,
    primary: &Order,
    primary_hole: Hole,
    prep_max: f64,
    route: &BatchRoute,
    members_single_route_sum: f64,
    ctx: &DispatchContext<'_>,
) -> ScoreBreakdown {
    let eta_score = route.route_minutes + (prep_max - route.pickup_minutes).max(0.0);
    let last_hole = route
        .legs
        .last()
        .map(|leg| leg.hole)
        .unwrap_or(primary_hole);
    let batch_adjustment = route.route_minutes - members_single_route_sum;
    compose(
        asset,
        primary,
        eta_score,
        primary_hole,
        last_hole,
        batch_adjustment,
        ctx,
    )
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

    fn ctx<'a>(oracle: &'a PredictionOracle, params: &'a DispatchParams) -> DispatchContext<'a> {
        DispatchContext {
            now: 0.0,
            oracle,
            params,
            pending: &[],
        }
    }

    fn order_at(hole: Hole) -> Order {
        let items = vec![OrderItem {
            name: "Bottled Water".to_string(),
            quantity: 1,
            complexity: Complexity::Simple,
            unit_price_cents: 300,
        }];
        Order::new("ORD0001".to_string(), hole, items, TimeOfDay::Afternoon, 0.0).unwrap()
    }

    #[test]
    fn test_score_is_pure() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let ctx = ctx(&oracle, &params);
        let staff = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        let order = order_at(7);

        let a = score_single(&staff, &order, &ctx);
        let b = score_single(&staff, &order, &ctx);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cart_off_loop_ineligible() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let ctx = ctx(&oracle, &params);
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(2),
        )
        .unwrap();
        let order = order_at(14);

        let score = score_single(&cart, &order, &ctx);
        assert!(!score.is_eligible());
    }

    #[test]
    fn test_in_window_cart_beats_equal_staff() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let ctx = ctx(&oracle, &params);
        // cart and staff both at the clubhouse, order nearby
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Clubhouse,
        )
        .unwrap();
        let staff = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        let order = order_at(3);

        let cart_score = score_single(&cart, &order, &ctx);
        let staff_score = score_single(&staff, &order, &ctx);
        assert!(cart_score.is_eligible());
        assert!(cart_score.asset_type_score < 0.0);
        assert!(cart_score.final_score < staff_score.final_score);
    }

    #[test]
    fn test_projection_respects_prep_overlap() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let ctx = ctx(&oracle, &params);
        let staff = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        let order = order_at(3);

        let proj = project_delivery(&staff, &order, &ctx).unwrap();
        // staff is already at the pickup, so prep dominates the head start
        assert!(proj.prep_minutes >= proj.pickup_minutes);
        assert!(proj.eta_minutes >= proj.prep_minutes);
    }

    #[test]
    fn test_soon_available_delay_raises_eta() {
        let oracle = oracle();
        let params = DispatchParams::default();
        let ctx = ctx(&oracle, &params);
        let free = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        let mut busy = free.clone();
        busy.set_busy_until(Some(2.5));

        let order = order_at(8);
        let fast = score_single(&free, &order, &ctx);
        let slow = score_single(&busy, &order, &ctx);
        assert!(slow.eta_minutes > fast.eta_minutes);
    }
}
