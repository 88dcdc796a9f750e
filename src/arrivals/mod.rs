//! Order arrival generation
//!
//! Creates new orders according to the configured interval distribution.
//! All generation is deterministic given the RNG seed: same seed + same
//! config → same order stream.
//!
//! Inter-arrival spacing is Gaussian around `interval_min /
//! volume_multiplier` with the configured variance, floored at
//! [`MIN_INTERVAL_MIN`]. Target holes are drawn uniformly from 1-18 unless
//! a scenario overrides the distribution; items come from the menu catalog.

use crate::course::{Hole, TimeOfDay};
use crate::models::order::{Complexity, Order, OrderItem};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Smallest allowed gap between consecutive orders (minutes).
pub const MIN_INTERVAL_MIN: f64 = 0.5;

/// Simulated minute at which the morning bucket ends (tee sheet opens at
/// minute 0 = 9 AM; noon starts three hours in).
pub const MORNING_END_MIN: f64 = 180.0;
/// Simulated minute at which the noon bucket ends.
pub const NOON_END_MIN: f64 = 300.0;

/// Time-of-day bucket for a simulated timestamp.
pub fn time_of_day_bucket(t: f64) -> TimeOfDay {
    if t < MORNING_END_MIN {
        TimeOfDay::Morning
    } else if t < NOON_END_MIN {
        TimeOfDay::Noon
    } else {
        TimeOfDay::Afternoon
    }
}

/// One menu entry orders are sampled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub complexity: Complexity,
    pub unit_price_cents: i64,
}

/// The built-in menu.
pub fn default_catalog() -> Vec<CatalogEntry> {
    let entry = |name: &str, complexity, cents| CatalogEntry {
        name: name.to_string(),
        complexity,
        unit_price_cents: cents,
    };
    vec![
        entry("Bottled Water", Complexity::Simple, 300),
        entry("Sports Drink", Complexity::Simple, 450),
        entry("Domestic Beer", Complexity::Simple, 600),
        entry("Hot Dog", Complexity::Medium, 700),
        entry("Turkey Sandwich", Complexity::Medium, 950),
        entry("Nachos", Complexity::Complex, 1100),
        entry("Chicken Tenders", Complexity::Complex, 1250),
    ]
}

/// Configuration for the arrival process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalConfig {
    /// Mean minutes between orders (before the volume multiplier)
    pub interval_min: f64,
    /// Standard deviation of the inter-arrival gap (minutes)
    pub variance_min: f64,
    /// Divides the mean interval; 2.0 doubles order volume
    pub volume_multiplier: f64,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            interval_min: 5.0,
            variance_min: 2.0,
            volume_multiplier: 1.0,
        }
    }
}

/// Generator for the order stream.
#[derive(Debug, Clone)]
pub struct ArrivalGenerator {
    config: ArrivalConfig,
    catalog: Vec<CatalogEntry>,
    next_order_seq: usize,
}

impl ArrivalGenerator {
    pub fn new(config: ArrivalConfig, catalog: Vec<CatalogEntry>) -> Self {
        Self {
            config,
            catalog,
            next_order_seq: 0,
        }
    }

    /// Sample the gap to the next arrival.
    pub fn next_interval(&self, rng: &mut RngManager) -> f64 {
        let mean = self.config.interval_min / self.config.volume_multiplier.max(f64::EPSILON);
        rng.gauss(mean, self.config.variance_min).max(MIN_INTERVAL_MIN)
    }

    /// Generate the next order, placed at `t`.
    ///
    /// Draws a uniform target hole, one to three catalog lines with
    /// quantities 1-3, and stamps the time-of-day bucket from `t`.
    pub fn generate_order(&mut self, t: f64, rng: &mut RngManager) -> Order {
        let hole = rng.range(1, 19) as Hole;
        self.generate_order_at(t, hole, rng)
    }

    /// Allocate the next order id (also used by externally created orders
    /// so the id space stays shared).
    pub fn allocate_id(&mut self) -> String {
        self.next_order_seq += 1;
        format!("ORD{:04}", self.next_order_seq)
    }

    /// Generate the next order at a scenario-chosen hole.
    pub fn generate_order_at(&mut self, t: f64, hole: Hole, rng: &mut RngManager) -> Order {
        let id = self.allocate_id();

        let num_lines = rng.range(1, 4) as usize;
        let mut items = Vec::with_capacity(num_lines);
        for _ in 0..num_lines {
            let entry = &self.catalog[rng.range(0, self.catalog.len() as i64) as usize];
            items.push(OrderItem {
                name: entry.name.clone(),
                quantity: rng.range(1, 4) as u32,
                complexity: entry.complexity,
                unit_price_cents: entry.unit_price_cents,
            });
        }

        Order::new(id, hole, items, time_of_day_bucket(t), t)
            .expect("generated hole is always on the course")
    }

    /// Number of orders generated so far.
    pub fn generated(&self) -> usize {
        self.next_order_seq
    }
}
