//! Domain models: orders, delivery assets, and their in-memory stores

pub mod asset;
pub mod book;
pub mod order;
pub mod registry;

pub use asset::{Asset, AssetError, AssetKind, AssetStats, AssetStatus};
pub use book::{BookError, OrderBook};
pub use order::{Complexity, Order, OrderError, OrderItem, OrderState};
pub use registry::{AssetRegistry, FleetSnapshot, RegistryError};
