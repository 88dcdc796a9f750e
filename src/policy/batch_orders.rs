//! Aggressive batching strategy
//!
//! Same ranked pipeline as the default strategy, but score ties between a
//! batch and a smaller option go to the batch: once an asset is rolling,
//! fold every nearby pending order into the run.

use crate::batching::BatchBias;
use crate::models::order::Order;
use crate::models::registry::FleetSnapshot;
use crate::policy::{ranked_decision, Decision, DispatchContext, DispatchStrategy};

/// Batch whenever a batch is no worse than going alone.
#[derive(Debug, Default)]
pub struct BatchOrdersStrategy;

impl BatchOrdersStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchStrategy for BatchOrdersStrategy {
    fn name(&self) -> &'static str {
        "BATCH_ORDERS"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        ranked_decision(order, snapshot, ctx, BatchBias::Larger, |_, c| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseMap, Location, LoopId, TimeOfDay};
    use crate::models::asset::Asset;
    use crate::models::order::{Complexity, OrderItem};
    use crate::models::registry::AssetRegistry;
    use crate::oracle::PredictionOracle;
    use crate::policy::DispatchParams;

    fn order(id: &str, hole: u8) -> Order {
        let items = vec![OrderItem {
            name: "Domestic Beer".to_string(),
            quantity: 2,
            complexity: Complexity::Simple,
            unit_price_cents: 600,
        }];
        Order::new(id.to_string(), hole, items, TimeOfDay::Afternoon, 0.0).unwrap()
    }

    #[test]
    fn test_adjacent_orders_fold_into_batch() {
        let oracle = PredictionOracle::new(CourseMap::standard());
        let params = DispatchParams::default();
        let pending = vec![order("ORD0002", 6), order("ORD0003", 7)];
        let ctx = DispatchContext {
            now: 0.0,
            oracle: &oracle,
            params: &params,
            pending: &pending,
        };

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
        let snapshot = reg.snapshot(0.0);

        let mut strategy = BatchOrdersStrategy::new();
        match strategy.choose(&order("ORD0001", 5), &snapshot, &ctx) {
            Decision::Assign { ranked } => {
                // pairwise threshold 2 allows {5, 6, 7}
                assert_eq!(ranked[0].batch.len(), 3);
            }
            other => panic!("expected Assign, got {:?}", other),
        }
    }
}
