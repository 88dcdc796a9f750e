//! Order book
//!
//! In-memory store of orders with lifecycle state and per-order
//! timestamps. Like the asset registry, the book is single-writer under
//! the simulation engine's handler step.

use crate::course::Hole;
use crate::models::order::{Order, OrderError, OrderState};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from order book operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookError {
    #[error("Unknown order {0}")]
    UnknownOrder(String),

    #[error("Order {0} is already placed")]
    DuplicateOrder(String),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Store of orders, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: BTreeMap<String, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly placed order.
    pub fn place_order(&mut self, order: Order) -> Result<(), BookError> {
        let id = order.id().to_string();
        if self.orders.contains_key(&id) {
            return Err(BookError::DuplicateOrder(id));
        }
        self.orders.insert(id, order);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Order, BookError> {
        self.orders
            .get(id)
            .ok_or_else(|| BookError::UnknownOrder(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Order, BookError> {
        self.orders
            .get_mut(id)
            .ok_or_else(|| BookError::UnknownOrder(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Orders still waiting for dispatch, in id order.
    pub fn pending_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(|o| o.state() == OrderState::Pending)
    }

    /// Record that an offer went out for an order.
    pub fn record_offer(&mut self, id: &str, t: f64) -> Result<(), BookError> {
        self.get_mut(id)?.record_offer(t)?;
        Ok(())
    }

    /// Return an order to `Pending` after a full decline cascade; yields
    /// the bumped retry count.
    pub fn return_to_pending(&mut self, id: &str, t: f64) -> Result<u32, BookError> {
        Ok(self.get_mut(id)?.return_to_pending(t)?)
    }

    /// Commit an assignment: the order plus any batch members are bound to
    /// the accepting asset.
    pub fn attach_assignment(
        &mut self,
        id: &str,
        t: f64,
        asset_id: &str,
        batch_id: Option<String>,
        predicted_hole: Hole,
    ) -> Result<(), BookError> {
        self.get_mut(id)?
            .mark_assigned(t, asset_id, batch_id, predicted_hole)?;
        Ok(())
    }

    pub fn mark_picked_up(&mut self, id: &str, t: f64) -> Result<(), BookError> {
        self.get_mut(id)?.mark_picked_up(t)?;
        Ok(())
    }

    pub fn mark_delivered(&mut self, id: &str, t: f64, at_hole: Hole) -> Result<(), BookError> {
        self.get_mut(id)?.mark_delivered(t, at_hole)?;
        Ok(())
    }

    pub fn mark_unassignable(&mut self, id: &str) -> Result<(), BookError> {
        self.get_mut(id)?.mark_unassignable()?;
        Ok(())
    }
}
