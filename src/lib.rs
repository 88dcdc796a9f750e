//! Fairway Dispatch - On-Course Delivery Engine
//!
//! Deterministic dispatch and simulation engine for food and beverage
//! delivery on an 18-hole golf course: zone-restricted beverage carts and
//! free-roaming delivery staff serve orders placed from the course, ranked
//! by a pluggable multi-factor strategy with multi-order batching and a
//! timed offer/accept/decline protocol, all driven by a discrete-event
//! scheduler.
//!
//! # Architecture
//!
//! - **core**: simulated clock
//! - **course**: directed loop graph and ETA model
//! - **oracle**: prep / travel / acceptance predictions
//! - **models**: domain types (Order, Asset) and their stores
//! - **events**: replay-grade audit log
//! - **arrivals**: deterministic order generation
//! - **policy**: pluggable dispatch strategies and scoring
//! - **batching**: multi-order route planning
//! - **offer**: timed offer cascade state machine
//! - **orchestrator**: the discrete-event simulation loop
//! - **metrics**: KPI reporting
//! - **rng**: deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents); all times are f64 minutes
//! 2. All randomness is deterministic (seeded RNG): same `(config, seed)`
//!    gives a bit-identical event log and metrics report
//! 3. A cart never leaves its loop; an asset holds at most one offer

// Module declarations
pub mod arrivals;
pub mod batching;
pub mod core;
pub mod course;
pub mod events;
pub mod metrics;
pub mod models;
pub mod offer;
pub mod oracle;
pub mod orchestrator;
pub mod policy;
pub mod rng;

// Re-exports for convenience
pub use crate::core::time::SimClock;
pub use course::{CourseError, CourseMap, Hole, Location, LoopId, Segment, TimeOfDay};
pub use events::{Event, EventLog};
pub use metrics::{KpiTargets, MetricsReport};
pub use models::{
    Asset, AssetKind, AssetRegistry, AssetStatus, BookError, Complexity, FleetSnapshot, Order,
    OrderBook, OrderError, OrderItem, OrderState, RegistryError,
};
pub use offer::{OfferProtocol, OfferStep};
pub use oracle::PredictionOracle;
pub use orchestrator::{SimulationConfig, SimulationEngine, SimulationError};
pub use policy::{
    Candidate, Decision, DispatchContext, DispatchParams, DispatchStrategy, ScoreBreakdown,
    StrategyConfig,
};
pub use rng::RngManager;
