//! Delivery asset model
//!
//! A delivery asset is either a beverage cart (zone-restricted to one
//! 9-hole loop) or a delivery staff member (free-roaming). The two variants
//! differ only in zone constraint and movement rules, so they share one
//! struct with a `AssetKind` sum type rather than a class hierarchy.
//!
//! # Critical Invariants
//!
//! 1. A cart's location is always on its own loop
//! 2. At most one outstanding offer per asset (`pending_offer`)
//! 3. The order queue never exceeds the batch cap during an active delivery

use crate::course::{Hole, Location, LoopId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Variant tag distinguishing carts from staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Beverage cart restricted to one loop
    BeverageCart { loop_id: LoopId },
    /// Free-roaming delivery staff member
    DeliveryStaff,
}

impl AssetKind {
    pub fn is_cart(&self) -> bool {
        matches!(self, AssetKind::BeverageCart { .. })
    }

    /// The loop a cart is restricted to; `None` for staff.
    pub fn cart_loop(&self) -> Option<LoopId> {
        match self {
            AssetKind::BeverageCart { loop_id } => Some(*loop_id),
            AssetKind::DeliveryStaff => None,
        }
    }

    /// Whether this asset may serve `hole` at all.
    pub fn serviceable(&self, hole: Hole) -> bool {
        match self {
            AssetKind::BeverageCart { loop_id } => loop_id.contains(hole),
            AssetKind::DeliveryStaff => (1..=18).contains(&hole),
        }
    }

    /// Stable label used in metrics and the event log.
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::BeverageCart { .. } => "beverage_cart",
            AssetKind::DeliveryStaff => "delivery_staff",
        }
    }
}

/// Operational status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    /// Free for dispatch
    Available,
    /// Holds an outstanding offer (not yet committed)
    OfferPending,
    /// Heading to the clubhouse to collect an order
    EnRouteToPickup,
    /// At the clubhouse waiting for prep to finish
    AtStore,
    /// Carrying orders out to the course
    EnRouteToCustomer,
    /// Heading back to the clubhouse after the last drop
    Returning,
    /// Off duty
    Offline,
}

impl AssetStatus {
    /// Whether this status counts toward active (vs. idle) time.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AssetStatus::EnRouteToPickup
                | AssetStatus::AtStore
                | AssetStatus::EnRouteToCustomer
                | AssetStatus::Returning
        )
    }

    /// Whether the asset is mid-delivery and cannot take a fresh route now.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            AssetStatus::EnRouteToPickup | AssetStatus::AtStore | AssetStatus::EnRouteToCustomer
        )
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetStatus::Available => "Available",
            AssetStatus::OfferPending => "OfferPending",
            AssetStatus::EnRouteToPickup => "EnRouteToPickup",
            AssetStatus::AtStore => "AtStore",
            AssetStatus::EnRouteToCustomer => "EnRouteToCustomer",
            AssetStatus::Returning => "Returning",
            AssetStatus::Offline => "Offline",
        };
        write!(f, "{}", s)
    }
}

/// Cumulative per-asset statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetStats {
    pub deliveries: u32,
    pub active_minutes: f64,
    pub idle_minutes: f64,
    pub distance_holes: f64,
}

impl AssetStats {
    /// Share of tracked time spent active, 0-100.
    pub fn utilization_pct(&self) -> f64 {
        let total = self.active_minutes + self.idle_minutes;
        if total > 0.0 {
            self.active_minutes / total * 100.0
        } else {
            0.0
        }
    }
}

/// Errors from asset mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("Cart {id} cannot move to {location} off the {cart_loop} loop")]
    ZoneViolation {
        id: String,
        location: Location,
        cart_loop: LoopId,
    },

    #[error("Asset {id} already holds an outstanding offer")]
    OfferAlreadyPending { id: String },

    #[error("Asset {id} order queue is at the batch cap ({cap})")]
    QueueFull { id: String, cap: usize },

    #[error("Order {order_id} is not queued on asset {id}")]
    OrderNotQueued { id: String, order_id: String },
}

/// A delivery asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    id: String,
    name: String,
    kind: AssetKind,
    location: Location,
    status: AssetStatus,
    /// Order ids currently assigned, in drop order
    queue: Vec<String>,
    /// Sequence number of the one outstanding offer, when armed
    pending_offer: Option<u64>,
    /// When a busy asset is expected to finish its current route
    busy_until: Option<f64>,
    stats: AssetStats,
}

impl Asset {
    /// Create a beverage cart. Its starting location must sit on its loop.
    pub fn new_cart(
        id: String,
        name: String,
        loop_id: LoopId,
        location: Location,
    ) -> Result<Self, AssetError> {
        let kind = AssetKind::BeverageCart { loop_id };
        let asset = Self {
            id,
            name,
            kind,
            location: Location::Hole(loop_id.head()),
            status: AssetStatus::Available,
            queue: Vec::new(),
            pending_offer: None,
            busy_until: None,
            stats: AssetStats::default(),
        };
        let mut asset = asset;
        asset.set_location(location)?;
        Ok(asset)
    }

    /// Create a delivery staff member (anywhere on the course).
    pub fn new_staff(id: String, name: String, location: Location) -> Self {
        Self {
            id,
            name,
            kind: AssetKind::DeliveryStaff,
            location,
            status: AssetStatus::Available,
            queue: Vec::new(),
            pending_offer: None,
            busy_until: None,
            stats: AssetStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn status(&self) -> AssetStatus {
        self.status
    }

    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn stats(&self) -> &AssetStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut AssetStats {
        &mut self.stats
    }

    pub fn pending_offer(&self) -> Option<u64> {
        self.pending_offer
    }

    /// Expected end of the current route, when busy.
    pub fn busy_until(&self) -> Option<f64> {
        self.busy_until
    }

    pub fn set_busy_until(&mut self, t: Option<f64>) {
        self.busy_until = t;
    }

    /// Number of orders this asset is currently carrying or committed to.
    pub fn active_order_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether this asset may serve `hole`.
    pub fn serviceable(&self, hole: Hole) -> bool {
        self.kind.serviceable(hole)
    }

    /// Move the asset. Carts are rejected off their loop.
    pub fn set_location(&mut self, location: Location) -> Result<(), AssetError> {
        if let AssetKind::BeverageCart { loop_id } = self.kind {
            let on_loop = match location {
                // the clubhouse sits at the loop heads, legal for both loops
                Location::Clubhouse => true,
                Location::Hole(h) => loop_id.contains(h),
                Location::MidSegment { from, to, .. } => {
                    loop_id.contains(from) && loop_id.contains(to)
                }
            };
            if !on_loop {
                return Err(AssetError::ZoneViolation {
                    id: self.id.clone(),
                    location,
                    cart_loop: loop_id,
                });
            }
        }
        self.location = location;
        Ok(())
    }

    pub fn set_status(&mut self, status: AssetStatus) {
        self.status = status;
    }

    /// Arm the single outstanding offer slot.
    ///
    /// # Errors
    ///
    /// `OfferAlreadyPending` if another offer is already armed — the
    /// registry-level precondition behind the one-offer invariant.
    pub fn arm_offer(&mut self, offer_seq: u64) -> Result<(), AssetError> {
        if self.pending_offer.is_some() {
            return Err(AssetError::OfferAlreadyPending {
                id: self.id.clone(),
            });
        }
        self.pending_offer = Some(offer_seq);
        Ok(())
    }

    /// Clear the offer slot (accept, decline, timeout, or supersede).
    pub fn clear_offer(&mut self) {
        self.pending_offer = None;
    }

    /// Append an order to the delivery queue, respecting the batch cap.
    pub fn enqueue_order(&mut self, order_id: String, cap: usize) -> Result<(), AssetError> {
        if self.queue.len() >= cap {
            return Err(AssetError::QueueFull {
                id: self.id.clone(),
                cap,
            });
        }
        self.queue.push(order_id);
        Ok(())
    }

    /// Remove a delivered (or cancelled) order from the queue.
    pub fn dequeue_order(&mut self, order_id: &str) -> Result<(), AssetError> {
        match self.queue.iter().position(|id| id == order_id) {
            Some(idx) => {
                self.queue.remove(idx);
                Ok(())
            }
            None => Err(AssetError::OrderNotQueued {
                id: self.id.clone(),
                order_id: order_id.to_string(),
            }),
        }
    }
}
