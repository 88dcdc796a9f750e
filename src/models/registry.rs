//! Asset registry
//!
//! In-memory store of all delivery assets. Single-writer: every mutation
//! happens inside the simulation engine's event handlers; strategies and
//! metrics read through cloned `FleetSnapshot`s taken at handler entry.

use crate::models::asset::{Asset, AssetError, AssetStatus};
use crate::course::Location;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("Unknown asset {0}")]
    UnknownAsset(String),

    #[error("Asset {0} is already registered")]
    DuplicateAsset(String),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Store of delivery assets, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: BTreeMap<String, Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new asset.
    pub fn register(&mut self, asset: Asset) -> Result<(), RegistryError> {
        let id = asset.id().to_string();
        if self.assets.contains_key(&id) {
            return Err(RegistryError::DuplicateAsset(id));
        }
        self.assets.insert(id, asset);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Asset, RegistryError> {
        self.assets
            .get(id)
            .ok_or_else(|| RegistryError::UnknownAsset(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Asset, RegistryError> {
        self.assets
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownAsset(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Asset> {
        self.assets.values_mut()
    }

    /// Move an asset (cart zone rules enforced).
    pub fn update_location(&mut self, id: &str, location: Location) -> Result<(), RegistryError> {
        self.get_mut(id)?.set_location(location)?;
        Ok(())
    }

    /// Set an asset's status.
    pub fn set_status(&mut self, id: &str, status: AssetStatus) -> Result<(), RegistryError> {
        self.get_mut(id)?.set_status(status);
        Ok(())
    }

    /// Append an order to an asset's delivery queue.
    pub fn enqueue_order(
        &mut self,
        id: &str,
        order_id: String,
        cap: usize,
    ) -> Result<(), RegistryError> {
        self.get_mut(id)?.enqueue_order(order_id, cap)?;
        Ok(())
    }

    /// Remove an order from an asset's delivery queue.
    pub fn dequeue_order(&mut self, id: &str, order_id: &str) -> Result<(), RegistryError> {
        self.get_mut(id)?.dequeue_order(order_id)?;
        Ok(())
    }

    /// Arm the single outstanding offer slot on an asset.
    ///
    /// Registry-level precondition: at most one `OfferPending` per asset
    /// across the whole system.
    pub fn arm_offer(&mut self, id: &str, offer_seq: u64) -> Result<(), RegistryError> {
        self.get_mut(id)?.arm_offer(offer_seq)?;
        Ok(())
    }

    /// Clear an asset's offer slot.
    pub fn clear_offer(&mut self, id: &str) -> Result<(), RegistryError> {
        self.get_mut(id)?.clear_offer();
        Ok(())
    }

    /// Take a read-only snapshot of the fleet at `taken_at`.
    pub fn snapshot(&self, taken_at: f64) -> FleetSnapshot {
        FleetSnapshot {
            taken_at,
            assets: self.assets.values().cloned().collect(),
        }
    }
}

/// Immutable view of the fleet at the moment dispatch was invoked.
///
/// Strategies and the batching planner hold only this view; they never
/// mutate the registry.
#[derive(Debug, Clone)]
pub struct FleetSnapshot {
    taken_at: f64,
    assets: Vec<Asset>,
}

impl FleetSnapshot {
    pub fn taken_at(&self) -> f64 {
        self.taken_at
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id() == id)
    }
}
