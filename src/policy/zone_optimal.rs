//! Zone-optimal strategy
//!
//! Keeps assets working their own end of the course: candidates already in
//! the order's zone score as usual, while out-of-zone staff carry a flat
//! penalty. Carts never appear out of zone (they are ineligible there), so
//! the penalty only reorders staff.

use crate::batching::BatchBias;
use crate::course::LoopId;
use crate::models::order::Order;
use crate::models::registry::FleetSnapshot;
use crate::policy::{ranked_decision, Decision, DispatchContext, DispatchStrategy};

/// Score penalty for a candidate standing in the other zone.
const ZONE_MISMATCH_PENALTY: f64 = 5.0;

/// Prefer assets already in the order's zone.
#[derive(Debug, Default)]
pub struct ZoneOptimalStrategy;

impl ZoneOptimalStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchStrategy for ZoneOptimalStrategy {
    fn name(&self) -> &'static str {
        "ZONE_OPTIMAL"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        let order_loop = LoopId::of_hole(order.target_hole()).ok();
        ranked_decision(order, snapshot, ctx, BatchBias::Smaller, |asset, mut c| {
            let asset_loop = LoopId::of_hole(asset.location().nearest_hole()).ok();
            if order_loop.is_some() && asset_loop != order_loop {
                c.score.final_score += ZONE_MISMATCH_PENALTY;
            }
            c
        })
    }
}
