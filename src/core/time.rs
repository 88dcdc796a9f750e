//! Time management for the simulation
//!
//! The simulation operates on a continuous clock measured in simulated
//! minutes (f64). The clock only ever moves forward; event handlers advance
//! it to the timestamp of the event being processed.

use serde::{Deserialize, Serialize};

/// Monotone simulated-time clock in minutes.
///
/// # Example
/// ```
/// use fairway_dispatch::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.now(), 0.0);
///
/// clock.advance_to(12.5);
/// assert_eq!(clock.now(), 12.5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimClock {
    /// Minutes elapsed since simulation start
    now: f64,
}

impl SimClock {
    /// Create a clock at t = 0.
    pub fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Current simulated time in minutes.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advance the clock to `t`.
    ///
    /// # Panics
    /// Panics if `t` is earlier than the current time. The event queue
    /// delivers events in timestamp order, so a backwards jump indicates a
    /// scheduling bug.
    pub fn advance_to(&mut self, t: f64) {
        assert!(
            t >= self.now,
            "clock moved backwards: {} -> {}",
            self.now,
            t
        );
        self.now = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_monotone() {
        let mut clock = SimClock::new();
        clock.advance_to(1.0);
        clock.advance_to(1.0); // same instant is fine
        clock.advance_to(3.5);
        assert_eq!(clock.now(), 3.5);
    }

    #[test]
    #[should_panic(expected = "clock moved backwards")]
    fn test_backwards_jump_panics() {
        let mut clock = SimClock::new();
        clock.advance_to(5.0);
        clock.advance_to(4.9);
    }
}
