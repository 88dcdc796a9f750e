//! Fastest-ETA strategy
//!
//! Ranks candidates purely by predicted delivery minutes; the multi-factor
//! components are computed (they still appear in the score breakdown) but
//! only the ETA decides the order.

use crate::batching::BatchBias;
use crate::models::order::Order;
use crate::models::registry::FleetSnapshot;
use crate::policy::{ranked_decision, Decision, DispatchContext, DispatchStrategy};

/// Minimize predicted delivery time, nothing else.
#[derive(Debug, Default)]
pub struct FastestEtaStrategy;

impl FastestEtaStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchStrategy for FastestEtaStrategy {
    fn name(&self) -> &'static str {
        "FASTEST_ETA"
    }

    fn choose(
        &mut self,
        order: &Order,
        snapshot: &FleetSnapshot,
        ctx: &DispatchContext<'_>,
    ) -> Decision {
        ranked_decision(order, snapshot, ctx, BatchBias::Smaller, |_, mut c| {
            c.score.final_score = c.score.eta_score;
            c
        })
    }
}
