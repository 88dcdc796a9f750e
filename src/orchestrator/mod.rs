//! Simulation orchestration
//!
//! - **engine**: the discrete-event loop, scenario configuration, and the
//!   upstream adapter surface

pub mod engine;

pub use engine::{SimulationConfig, SimulationEngine, SimulationError};
