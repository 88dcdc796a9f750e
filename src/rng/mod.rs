//! Deterministic random number generation
//!
//! Uses the xorshift64* algorithm for fast, deterministic random number
//! generation. CRITICAL: all randomness in the engine MUST go through this
//! module so that a `(config, seed)` pair replays bit-identically.

mod xorshift;

pub use xorshift::RngManager;
