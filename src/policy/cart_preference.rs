//! Cart-preference strategy (default)
//!
//! The full multi-factor score already carries the cart bias: a beverage
//! cart whose predicted delivery lands inside the preference window gets
//! the negative asset-type component, which puts it ahead of a staff
//! member with a comparable ETA. Everything else — batching, soon-available
//! candidates, decline-risk tie-breaks — is the shared ranked pipeline.

use crate::batching::BatchBias;
use crate::models::order::Order;
use crate::models::registry::FleetSnapshot;
use crate::policy::{ranked_decision, Decision, DispatchContext, DispatchStrategy};

/// Default strategy: multi-factor scoring with the cart preference window.
#[derive(Debug, Default)]
pub struct CartPreferenceStrategy;

impl CartPreferenceStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchStrategy for CartPreferenceStrategy {
    fn name(&self) -> &'static str {
        "CART_PREFERENCE"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        ranked_decision(order, snapshot, ctx, BatchBias::Smaller, |_, c| c)
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
                Location::Hole(1),
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
        reg
    }

    #[test]
    fn test_cart_preferred_inside_window() {
        let oracle = PredictionOracle::new(CourseMap::standard());
        let params = DispatchParams::default();
        let ctx = DispatchContext {
            now: 0.0,
            oracle: &oracle,
            params: &params,
            pending: &[],
        };
        let snapshot = fleet().snapshot(0.0);
        // light prep keeps the cart's ETA inside the preference window
        let items = vec![crate::models::order::OrderItem {
            name: "Bottled Water".to_string(),
            quantity: 1,
            complexity: crate::models::order::Complexity::Simple,
            unit_price_cents: 300,
        }];
        let order =
            Order::new("ORD0001".to_string(), 3, items, TimeOfDay::Afternoon, 0.0).unwrap();

        let mut strategy = CartPreferenceStrategy::new();
        match strategy.choose(&order, &snapshot, &ctx) {
            Decision::Assign { ranked } => {
                assert_eq!(ranked[0].asset_id, "cart1");
            }
            other => panic!("expected Assign, got {:?}", other),
        }
    }

    #[test]
    fn test_no_candidate_when_fleet_empty() {
        let oracle = PredictionOracle::new(CourseMap::standard());
        let params = DispatchParams::default();
        let ctx = DispatchContext {
            now: 0.0,
            oracle: &oracle,
            params: &params,
            pending: &[],
        };
        let snapshot = AssetRegistry::new().snapshot(0.0);
        let order =
            Order::new("ORD0001".to_string(), 3, vec![], TimeOfDay::Afternoon, 0.0).unwrap();

        let mut strategy = CartPreferenceStrategy::new();
        assert!(matches!(
            strategy.choose(&order, &snapshot, &ctx),
            Decision::NoCandidate
        ));
    }
}
