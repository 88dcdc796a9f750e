//! Order model
//!
//! Represents a customer order placed from a hole on the course.
//! Each order has:
//! - A target hole (where the golfer was when ordering)
//! - An item list (name, quantity, complexity, unit price)
//! - A time-of-day bucket (drives the travel traffic model)
//! - Lifecycle state and the timestamps of each transition
//!
//! # Lifecycle
//!
//! ```text
//! Pending -> Offered -> Assigned -> InDelivery -> Delivered
//!     ^         |
//!     +---------+  (full decline cascade, bounded by the retry cap)
//!     |
//!     +-> Unassignable  (retry cap exceeded)
//! ```
//!
//! Transitions are monotone along the first row; the only backwards edge is
//! `Offered -> Pending` when every ranked candidate declined. Timestamps
//! never decrease.
//!
//! CRITICAL: all money values are i64 (cents).

use crate::course::{CourseError, Hole, LoopId, TimeOfDay};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order value above which the acceptance model grants a bonus (cents).
pub const HIGH_VALUE_CENTS: i64 = 5_000;

/// Preparation complexity of a menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    /// Bottled drinks, packaged snacks
    Simple,
    /// Sandwiches, cold plates
    Medium,
    /// Hot food off the grill
    Complex,
}

impl Complexity {
    /// Multiplier on the base prep time.
    pub fn prep_factor(&self) -> f64 {
        match self {
            Complexity::Simple => 0.8,
            Complexity::Medium => 1.0,
            Complexity::Complex => 1.5,
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub complexity: Complexity,
    pub unit_price_cents: i64,
}

impl OrderItem {
    /// Line total in cents.
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// Placed, waiting for dispatch
    Pending,
    /// An offer is out to a candidate asset
    Offered,
    /// A candidate accepted; committed to an asset
    Assigned,
    /// Picked up at the clubhouse, on the way to the golfer
    InDelivery,
    /// Handed to the golfer
    Delivered,
    /// Retry cap exceeded with no acceptor
    Unassignable,
}

impl OrderState {
    /// Position along the monotone lifecycle; used to validate transitions.
    fn rank(&self) -> u8 {
        match self {
            OrderState::Pending => 0,
            OrderState::Offered => 1,
            OrderState::Assigned => 2,
            OrderState::InDelivery => 3,
            OrderState::Delivered => 4,
            OrderState::Unassignable => 5,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Delivered | OrderState::Unassignable)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderState::Pending => "Pending",
            OrderState::Offered => "Offered",
            OrderState::Assigned => "Assigned",
            OrderState::InDelivery => "InDelivery",
            OrderState::Delivered => "Delivered",
            OrderState::Unassignable => "Unassignable",
        };
        write!(f, "{}", s)
    }
}

/// Errors from order construction and state transitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("Invalid order state transition {from} -> {to}")]
    InvalidTransition { from: OrderState, to: OrderState },

    #[error("Timestamp {t} precedes an earlier order timestamp {last}")]
    TimestampRegression { t: f64, last: f64 },

    #[error(transparent)]
    Course(#[from] CourseError),
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: String,
    target_hole: Hole,
    items: Vec<OrderItem>,
    value_cents: i64,
    time_of_day: TimeOfDay,
    state: OrderState,

    placed_at: f64,
    /// Every instant an offer went out for this order
    offered_at: Vec<f64>,
    assigned_at: Option<f64>,
    picked_up_at: Option<f64>,
    delivered_at: Option<f64>,

    retry_count: u32,
    assigned_asset: Option<String>,
    batch_id: Option<String>,
    predicted_drop_hole: Option<Hole>,
    actual_drop_hole: Option<Hole>,
}

impl Order {
    /// Create a new pending order.
    ///
    /// # Errors
    ///
    /// `CourseError::UnknownHole` when the target hole is off the course.
    pub fn new(
        id: String,
        target_hole: Hole,
        items: Vec<OrderItem>,
        time_of_day: TimeOfDay,
        placed_at: f64,
    ) -> Result<Self, OrderError> {
        LoopId::of_hole(target_hole)?;
        let value_cents = items.iter().map(OrderItem::line_total_cents).sum();
        Ok(Self {
            id,
            target_hole,
            items,
            value_cents,
            time_of_day,
            state: OrderState::Pending,
            placed_at,
            offered_at: Vec::new(),
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            retry_count: 0,
            assigned_asset: None,
            batch_id: None,
            predicted_drop_hole: None,
            actual_drop_hole: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target_hole(&self) -> Hole {
        self.target_hole
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn value_cents(&self) -> i64 {
        self.value_cents
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn placed_at(&self) -> f64 {
        self.placed_at
    }

    pub fn offered_at(&self) -> &[f64] {
        &self.offered_at
    }

    pub fn assigned_at(&self) -> Option<f64> {
        self.assigned_at
    }

    pub fn picked_up_at(&self) -> Option<f64> {
        self.picked_up_at
    }

    pub fn delivered_at(&self) -> Option<f64> {
        self.delivered_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn assigned_asset(&self) -> Option<&str> {
        self.assigned_asset.as_deref()
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref()
    }

    pub fn predicted_drop_hole(&self) -> Option<Hole> {
        self.predicted_drop_hole
    }

    pub fn actual_drop_hole(&self) -> Option<Hole> {
        self.actual_drop_hole
    }

    /// Whether the acceptance model treats this as a high-value order.
    pub fn is_high_value(&self) -> bool {
        self.value_cents > HIGH_VALUE_CENTS
    }

    /// Whether the order was served as part of a multi-order batch.
    pub fn was_batched(&self) -> bool {
        self.batch_id.is_some()
    }

    /// Time from placement to assignment, when assigned.
    pub fn wait_minutes(&self) -> Option<f64> {
        self.assigned_at.map(|t| t - self.placed_at)
    }

    /// Time from placement to delivery, when delivered.
    pub fn total_minutes(&self) -> Option<f64> {
        self.delivered_at.map(|t| t - self.placed_at)
    }

    fn latest_timestamp(&self) -> f64 {
        let mut last = self.placed_at;
        for t in [
            self.offered_at.last().copied(),
            self.assigned_at,
            self.picked_up_at,
            self.delivered_at,
        ]
        .into_iter()
        .flatten()
        {
            last = last.max(t);
        }
        last
    }

    fn check_time(&self, t: f64) -> Result<(), OrderError> {
        let last = self.latest_timestamp();
        if t < last {
            return Err(OrderError::TimestampRegression { t, last });
        }
        Ok(())
    }

    fn check_transition(&self, to: OrderState) -> Result<(), OrderError> {
        let from = self.state;
        let ok = match (from, to) {
            // the one backwards edge: a full decline cascade
            (OrderState::Offered, OrderState::Pending) => true,
            // the next candidate in a cascade re-offers without a reset
            (OrderState::Offered, OrderState::Offered) => true,
            // a pending order swept into an accepted batch commits without
            // an offer round of its own
            (OrderState::Pending, OrderState::Assigned) => true,
            (OrderState::Pending, OrderState::Unassignable) => true,
            _ => to.rank() == from.rank() + 1 && !from.is_terminal(),
        };
        if ok {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition { from, to })
        }
    }

    /// Record that an offer went out. `Pending -> Offered`.
    pub fn record_offer(&mut self, t: f64) -> Result<(), OrderError> {
        self.check_time(t)?;
        self.check_transition(OrderState::Offered)?;
        self.state = OrderState::Offered;
        self.offered_at.push(t);
        Ok(())
    }

    /// Candidate list exhausted: back to `Pending` with the retry counter
    /// bumped.
    pub fn return_to_pending(&mut self, t: f64) -> Result<u32, OrderError> {
        self.check_time(t)?;
        self.check_transition(OrderState::Pending)?;
        self.state = OrderState::Pending;
        self.retry_count += 1;
        Ok(self.retry_count)
    }

    /// Bump the retry counter without a state change (dispatch found no
    /// candidate at all, so the order never left `Pending`).
    pub fn record_failed_attempt(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    /// Commit the order to an asset. `Offered -> Assigned`.
    pub fn mark_assigned(
        &mut self,
        t: f64,
        asset_id: &str,
        batch_id: Option<String>,
        predicted_hole: Hole,
    ) -> Result<(), OrderError> {
        self.check_time(t)?;
        self.check_transition(OrderState::Assigned)?;
        self.state = OrderState::Assigned;
        self.assigned_at = Some(t);
        self.assigned_asset = Some(asset_id.to_string());
        self.batch_id = batch_id;
        self.predicted_drop_hole = Some(predicted_hole);
        Ok(())
    }

    /// The asset left the clubhouse with the order. `Assigned -> InDelivery`.
    pub fn mark_picked_up(&mut self, t: f64) -> Result<(), OrderError> {
        self.check_time(t)?;
        self.check_transition(OrderState::InDelivery)?;
        self.state = OrderState::InDelivery;
        self.picked_up_at = Some(t);
        Ok(())
    }

    /// Handed to the golfer. `InDelivery -> Delivered`.
    pub fn mark_delivered(&mut self, t: f64, at_hole: Hole) -> Result<(), OrderError> {
        self.check_time(t)?;
        self.check_transition(OrderState::Delivered)?;
        self.state = OrderState::Delivered;
        self.delivered_at = Some(t);
        self.actual_drop_hole = Some(at_hole);
        Ok(())
    }

    /// Retry cap exceeded. `Pending -> Unassignable`.
    pub fn mark_unassignable(&mut self) -> Result<(), OrderError> {
        self.check_transition(OrderState::Unassignable)?;
        self.state = OrderState::Unassignable;
        Ok(())
    }
}
