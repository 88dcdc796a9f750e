//! Prediction oracle
//!
//! Pure estimators for order prep time, travel time, and offer acceptance
//! probability. The engine treats these as an opaque model: deterministic
//! given a seeded RNG, side-effect free.
//!
//! Each quantity comes in two forms:
//! - an **expected** estimate with no perturbation, used by strategy
//!   scoring (scoring must be replayable from a snapshot), and
//! - a **sampled** estimate with bounded perturbation drawn from the
//!   explicit `&mut RngManager`, used for the simulated outcome.
//!
//! When a lookup cannot be answered (the `OracleUnavailable` condition),
//! the `*_or_default` entry points recover with deterministic fallbacks
//! rather than failing dispatch.

use crate::course::{CourseError, CourseMap, Hole, Location, TimeOfDay};
use crate::models::asset::{Asset, AssetKind};
use crate::models::order::{Order, OrderItem};
use crate::rng::RngManager;

/// Fallback prep time when the item model cannot run (minutes).
pub const FALLBACK_PREP_MIN: f64 = 10.0;
/// Fallback per-hole travel time (minutes).
pub const FALLBACK_TRAVEL_PER_HOLE_MIN: f64 = 1.5;
/// Fallback acceptance probability.
pub const FALLBACK_ACCEPTANCE: f64 = 0.8;

/// Base prep minutes per unit of quantity.
const PREP_BASE_PER_ITEM_MIN: f64 = 2.0;
/// Minimum prep time (minutes).
const PREP_FLOOR_MIN: f64 = 1.0;
/// Minimum travel time (minutes).
const TRAVEL_FLOOR_MIN: f64 = 0.5;

/// Acceptance model constants.
const ACCEPT_BASE: f64 = 0.80;
const ACCEPT_DISTANCE_PENALTY_PER_HOLE: f64 = 0.05;
const ACCEPT_WORKLOAD_PENALTY_PER_ORDER: f64 = 0.10;
const ACCEPT_IN_LOOP_BONUS: f64 = 0.10;
const ACCEPT_OFF_LOOP_PENALTY: f64 = 0.30;
const ACCEPT_HIGH_VALUE_BONUS: f64 = 0.05;
const ACCEPT_MIN: f64 = 0.10;
const ACCEPT_MAX: f64 = 1.00;

/// The prediction oracle.
///
/// Holds a copy of the course map so travel estimates and acceptance
/// distances share one geometry.
#[derive(Debug, Clone)]
pub struct PredictionOracle {
    course: CourseMap,
}

impl PredictionOracle {
    pub fn new(course: CourseMap) -> Self {
        Self { course }
    }

    pub fn course(&self) -> &CourseMap {
        &self.course
    }

    // ------------------------------------------------------------------
    // Prep time
    // ------------------------------------------------------------------

    /// Expected prep time in minutes for an item list.
    ///
    /// `2 · Σquantity`, scaled by the hardest item's complexity factor and
    /// a bulk-prep efficiency of `√Q / Q`. Orders with no items fall back
    /// to [`FALLBACK_PREP_MIN`].
    pub fn expected_prep_time(&self, items: &[OrderItem]) -> f64 {
        let total_qty: u32 = items.iter().map(|i| i.quantity).sum();
        if total_qty == 0 {
            return FALLBACK_PREP_MIN;
        }
        let max_factor = items
            .iter()
            .map(|i| i.complexity.prep_factor())
            .fold(0.0_f64, f64::max);
        let q = total_qty as f64;
        let base = PREP_BASE_PER_ITEM_MIN * q * max_factor;
        let efficiency = q.sqrt() / q;
        (base * efficiency).max(PREP_FLOOR_MIN)
    }

    /// Sampled prep time: expected value perturbed ±20%.
    pub fn sample_prep_time(&self, items: &[OrderItem], rng: &mut RngManager) -> f64 {
        let expected = self.expected_prep_time(items);
        (expected * rng.uniform(0.8, 1.2)).max(PREP_FLOOR_MIN)
    }

    // ------------------------------------------------------------------
    // Travel time
    // ------------------------------------------------------------------

    /// Expected travel time from a location to a hole for the given asset
    /// kind. Carts get `+∞` for off-loop targets (ineligible).
    pub fn expected_travel_time(
        &self,
        from: &Location,
        to: Hole,
        kind: AssetKind,
        tod: TimeOfDay,
    ) -> Result<f64, CourseError> {
        let raw = match kind {
            AssetKind::BeverageCart { loop_id } => self.course.cart_eta(from, loop_id, to, tod)?,
            AssetKind::DeliveryStaff => self.course.staff_eta(from, to, tod)?,
        };
        if raw.is_finite() {
            Ok(raw.max(TRAVEL_FLOOR_MIN))
        } else {
            Ok(raw)
        }
    }

    /// Expected travel time from a location to the clubhouse.
    pub fn expected_travel_to_clubhouse(
        &self,
        from: &Location,
        kind: AssetKind,
        tod: TimeOfDay,
    ) -> Result<f64, CourseError> {
        let raw = match kind {
            AssetKind::BeverageCart { loop_id } => {
                self.course.cart_eta_to_clubhouse(from, loop_id, tod)?
            }
            AssetKind::DeliveryStaff => self.course.staff_eta_to_clubhouse(from, tod)?,
        };
        Ok(raw)
    }

    /// Sampled travel time: expected value perturbed ±10%, floor 0.5 min.
    /// Infinite (ineligible) estimates pass through unperturbed.
    pub fn sample_travel_time(
        &self,
        from: &Location,
        to: Hole,
        kind: AssetKind,
        tod: TimeOfDay,
        rng: &mut RngManager,
    ) -> Result<f64, CourseError> {
        let expected = self.expected_travel_time(from, to, kind, tod)?;
        if !expected.is_finite() {
            return Ok(expected);
        }
        Ok((expected * rng.uniform(0.9, 1.1)).max(TRAVEL_FLOOR_MIN))
    }

    /// Travel estimate that never fails: course lookup errors recover with
    /// the flat per-hole fallback over the naive hole distance.
    pub fn travel_time_or_default(
        &self,
        from: &Location,
        to: Hole,
        kind: AssetKind,
        tod: TimeOfDay,
    ) -> f64 {
        match self.expected_travel_time(from, to, kind, tod) {
            Ok(eta) => eta,
            Err(_) => {
                let from_hole = from.nearest_hole();
                let holes = self
                    .course
                    .hole_distance(from_hole, to)
                    .unwrap_or_else(|_| from_hole.abs_diff(to));
                (holes as f64 * FALLBACK_TRAVEL_PER_HOLE_MIN).max(TRAVEL_FLOOR_MIN)
            }
        }
    }

    // ------------------------------------------------------------------
    // Offer acceptance
    // ------------------------------------------------------------------

    /// Probability that `asset` accepts an offer for `order`.
    ///
    /// Starts at 0.80; each hole between the asset and the pickup costs
    /// 0.05, each already-active order costs 0.10; carts gain 0.10 for
    /// in-loop targets and lose 0.30 otherwise; orders over $50 add 0.05.
    /// Clamped to [0.10, 1.00].
    pub fn predict_acceptance(&self, asset: &Asset, order: &Order) -> f64 {
        let mut p = ACCEPT_BASE;

        let distance = self
            .course
            .hops_to_clubhouse(&asset.location())
            .unwrap_or(0);
        p -= distance as f64 * ACCEPT_DISTANCE_PENALTY_PER_HOLE;

        p -= asset.active_order_count() as f64 * ACCEPT_WORKLOAD_PENALTY_PER_ORDER;

        if let Some(loop_id) = asset.kind().cart_loop() {
            if loop_id.contains(order.target_hole()) {
                p += ACCEPT_IN_LOOP_BONUS;
            } else {
                p -= ACCEPT_OFF_LOOP_PENALTY;
            }
        }

        if order.is_high_value() {
            p += ACCEPT_HIGH_VALUE_BONUS;
        }

        p.clamp(ACCEPT_MIN, ACCEPT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::LoopId;
    use crate::models::order::Complexity;

    fn oracle() -> PredictionOracle {
        PredictionOracle::new(CourseMap::standard())
    }

    fn item(qty: u32, complexity: Complexity, price: i64) -> OrderItem {
        OrderItem {
            name: "item".to_string(),
            quantity: qty,
            complexity,
            unit_price_cents: price,
        }
    }

    fn order_at(hole: Hole, items: Vec<OrderItem>) -> Order {
        Order::new("ORD0001".to_string(), hole, items, TimeOfDay::Afternoon, 0.0).unwrap()
    }

    #[test]
    fn test_prep_default_for_empty_order() {
        assert_eq!(oracle().expected_prep_time(&[]), FALLBACK_PREP_MIN);
    }

    #[test]
    fn test_prep_formula() {
        // Q = 4, max factor 1.5: 2*4*1.5 * (2/4) = 6.0
        let items = vec![
            item(3, Complexity::Simple, 300),
            item(1, Complexity::Complex, 1100),
        ];
        assert!((oracle().expected_prep_time(&items) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_prep_sample_within_band() {
        let o = oracle();
        let items = vec![item(4, Complexity::Medium, 500)];
        let expected = o.expected_prep_time(&items);
        let mut rng = RngManager::new(11);
        for _ in 0..200 {
            let sampled = o.sample_prep_time(&items, &mut rng);
            assert!(sampled >= expected * 0.8 - 1e-9 && sampled <= expected * 1.2 + 1e-9);
        }
    }

    #[test]
    fn test_travel_floor_applies() {
        let o = oracle();
        let eta = o
            .expected_travel_time(
                &Location::Hole(5),
                5,
                AssetKind::DeliveryStaff,
                TimeOfDay::Afternoon,
            )
            .unwrap();
        assert_eq!(eta, 0.5); // same hole still costs the floor
    }

    #[test]
    fn test_travel_infinite_for_off_loop_cart() {
        let o = oracle();
        let eta = o
            .expected_travel_time(
                &Location::Hole(3),
                14,
                AssetKind::BeverageCart {
                    loop_id: LoopId::Front,
                },
                TimeOfDay::Afternoon,
            )
            .unwrap();
        assert!(eta.is_infinite());
    }

    #[test]
    fn test_sample_travel_deterministic() {
        let o = oracle();
        let mut rng1 = RngManager::new(5);
        let mut rng2 = RngManager::new(5);
        for _ in 0..50 {
            let a = o
                .sample_travel_time(
                    &Location::Clubhouse,
                    7,
                    AssetKind::DeliveryStaff,
                    TimeOfDay::Noon,
                    &mut rng1,
                )
                .unwrap();
            let b = o
                .sample_travel_time(
                    &Location::Clubhouse,
                    7,
                    AssetKind::DeliveryStaff,
                    TimeOfDay::Noon,
                    &mut rng2,
                )
                .unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_acceptance_baseline_at_clubhouse() {
        let o = oracle();
        let staff = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        let order = order_at(5, vec![item(1, Complexity::Simple, 300)]);
        assert!((o.predict_acceptance(&staff, &order) - ACCEPT_BASE).abs() < 1e-9);
    }

    #[test]
    fn test_acceptance_distance_and_workload_penalties() {
        let o = oracle();
        let mut staff =
            Asset::new_staff("staff1".to_string(), "Esteban".to_string(), Location::Hole(3));
        staff.enqueue_order("other".to_string(), 3).unwrap();
        let order = order_at(5, vec![item(1, Complexity::Simple, 300)]);
        // 2 holes from the clubhouse and one active order
        let expected = ACCEPT_BASE
            - 2.0 * ACCEPT_DISTANCE_PENALTY_PER_HOLE
            - ACCEPT_WORKLOAD_PENALTY_PER_ORDER;
        assert!((o.predict_acceptance(&staff, &order) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_acceptance_cart_zone_terms() {
        let o = oracle();
        let cart = Asset::new_cart(
            "cart1".to_string(),
            "Cart Alpha".to_string(),
            LoopId::Front,
            Location::Hole(1),
        )
        .unwrap();
        let in_loop = order_at(5, vec![item(1, Complexity::Simple, 300)]);
        let off_loop = order_at(14, vec![item(1, Complexity::Simple, 300)]);
        let p_in = o.predict_acceptance(&cart, &in_loop);
        let p_off = o.predict_acceptance(&cart, &off_loop);
        assert!((p_in - (ACCEPT_BASE + ACCEPT_IN_LOOP_BONUS)).abs() < 1e-9);
        assert!((p_off - (ACCEPT_BASE - ACCEPT_OFF_LOOP_PENALTY)).abs() < 1e-9);
    }

    #[test]
    fn test_acceptance_high_value_bonus_and_clamp() {
        let o = oracle();
        let staff = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        let pricey = order_at(5, vec![item(6, Complexity::Complex, 1200)]);
        assert!(pricey.is_high_value());
        let p = o.predict_acceptance(&staff, &pricey);
        assert!((p - (ACCEPT_BASE + ACCEPT_HIGH_VALUE_BONUS)).abs() < 1e-9);

        // pile on workload until the floor binds
        let mut swamped =
            Asset::new_staff("staff2".to_string(), "Dylan".to_string(), Location::Hole(9));
        for i in 0..8 {
            swamped.enqueue_order(format!("o{}", i), 16).unwrap();
        }
        let cheap = order_at(5, vec![item(1, Complexity::Simple, 300)]);
        assert_eq!(o.predict_acceptance(&swamped, &cheap), ACCEPT_MIN);
    }
}
