//! Metrics summary
//!
//! Pure KPI computation over the order book and asset registry. Nothing
//! here mutates simulation state, so a report can be produced mid-run
//! without disturbing anything.
//!
//! All numeric fields are SI units: minutes, counts, and percentages in
//! the 0-100 range.

use crate::models::asset::AssetKind;
use crate::models::book::OrderBook;
use crate::models::order::OrderState;
use crate::models::registry::AssetRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-order row of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: String,
    pub hole: u8,
    pub state: String,
    pub wait_min: Option<f64>,
    pub total_min: Option<f64>,
    pub batched: bool,
    pub assigned_asset: Option<String>,
}

/// Per-asset row of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRow {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub deliveries: u32,
    pub utilization_pct: f64,
    pub active_min: f64,
    pub idle_min: f64,
    pub distance_holes: f64,
}

/// Full metrics report: the KPI key/value map plus the row data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub kpis: BTreeMap<String, f64>,
    pub orders: Vec<OrderRow>,
    pub assets: Vec<AssetRow>,
}

/// Delivery/wait targets the on-time KPIs are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiTargets {
    pub target_delivery_time_min: f64,
    pub target_wait_time_min: f64,
}

impl Default for KpiTargets {
    fn default() -> Self {
        Self {
            target_delivery_time_min: 25.0,
            target_wait_time_min: 20.0,
        }
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn stdev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

fn min_of(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max_of(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Build the report from the live stores at simulated time `now`.
pub fn collect(
    book: &OrderBook,
    registry: &AssetRegistry,
    targets: KpiTargets,
    now: f64,
) -> MetricsReport {
    let orders: Vec<OrderRow> = book
        .iter()
        .map(|o| OrderRow {
            id: o.id().to_string(),
            hole: o.target_hole(),
            state: o.state().to_string(),
            wait_min: o.wait_minutes(),
            total_min: o.total_minutes(),
            batched: o.was_batched(),
            assigned_asset: o.assigned_asset().map(str::to_string),
        })
        .collect();

    let assets: Vec<AssetRow> = registry
        .iter()
        .map(|a| AssetRow {
            id: a.id().to_string(),
            name: a.name().to_string(),
            kind: a.kind().label().to_string(),
            deliveries: a.stats().deliveries,
            utilization_pct: a.stats().utilization_pct(),
            active_min: a.stats().active_minutes,
            idle_min: a.stats().idle_minutes,
            distance_holes: a.stats().distance_holes,
        })
        .collect();

    let delivered: Vec<_> = book
        .iter()
        .filter(|o| o.state() == OrderState::Delivered)
        .collect();
    let delivery_times: Vec<f64> = delivered.iter().filter_map(|o| o.total_minutes()).collect();
    let wait_times: Vec<f64> = delivered.iter().filter_map(|o| o.wait_minutes()).collect();
    let batched_count = delivered.iter().filter(|o| o.was_batched()).count();
    let undelivered = book.len() - delivered.len();

    let hours = now / 60.0;
    let orders_per_hour = if hours > 0.0 {
        delivered.len() as f64 / hours
    } else {
        0.0
    };
    let batched_pct = if delivered.is_empty() {
        0.0
    } else {
        batched_count as f64 / delivered.len() as f64 * 100.0
    };

    let on_time_delivery = delivered
        .iter()
        .filter(|o| {
            o.total_minutes()
                .map(|t| t <= targets.target_delivery_time_min)
                .unwrap_or(false)
        })
        .count();
    let on_time_wait = delivered
        .iter()
        .filter(|o| {
            o.wait_minutes()
                .map(|t| t <= targets.target_wait_time_min)
                .unwrap_or(false)
        })
        .count();
    let on_time_delivery_pct = if delivered.is_empty() {
        0.0
    } else {
        on_time_delivery as f64 / delivered.len() as f64 * 100.0
    };
    let on_time_wait_pct = if delivered.is_empty() {
        0.0
    } else {
        on_time_wait as f64 / delivered.len() as f64 * 100.0
    };

    let utilizations: Vec<f64> = assets.iter().map(|a| a.utilization_pct).collect();
    let cart_utils: Vec<f64> = registry
        .iter()
        .filter(|a| a.kind().is_cart())
        .map(|a| a.stats().utilization_pct())
        .collect();
    let staff_utils: Vec<f64> = registry
        .iter()
        .filter(|a| a.kind() == AssetKind::DeliveryStaff)
        .map(|a| a.stats().utilization_pct())
        .collect();
    let cart_orders: u32 = registry
        .iter()
        .filter(|a| a.kind().is_cart())
        .map(|a| a.stats().deliveries)
        .sum();
    let staff_orders: u32 = registry
        .iter()
        .filter(|a| a.kind() == AssetKind::DeliveryStaff)
        .map(|a| a.stats().deliveries)
        .sum();

    let mut kpis = BTreeMap::new();
    let mut put = |k: &str, v: f64| {
        kpis.insert(k.to_string(), v);
    };

    put("avg_delivery_time_min", mean(&delivery_times));
    put("median_delivery_time_min", median(&delivery_times));
    put("delivery_time_std_dev_min", stdev(&delivery_times));
    put(
        "min_delivery_time_min",
        if delivery_times.is_empty() {
            0.0
        } else {
            min_of(&delivery_times)
        },
    );
    put(
        "max_delivery_time_min",
        if delivery_times.is_empty() {
            0.0
        } else {
            max_of(&delivery_times)
        },
    );
    put("avg_wait_time_min", mean(&wait_times));
    put("median_wait_time_min", median(&wait_times));
    put("wait_time_std_dev_min", stdev(&wait_times));
    put(
        "min_wait_time_min",
        if wait_times.is_empty() {
            0.0
        } else {
            min_of(&wait_times)
        },
    );
    put(
        "max_wait_time_min",
        if wait_times.is_empty() {
            0.0
        } else {
            max_of(&wait_times)
        },
    );
    put("orders_per_hour", orders_per_hour);
    put("batched_pct", batched_pct);
    put("on_time_delivery_pct", on_time_delivery_pct);
    put("on_time_wait_pct", on_time_wait_pct);
    put("avg_utilization_pct", mean(&utilizations));
    put("beverage_cart_utilization_pct", mean(&cart_utils));
    put("delivery_staff_utilization_pct", mean(&staff_utils));
    put("beverage_cart_orders", cart_orders as f64);
    put("delivery_staff_orders", staff_orders as f64);
    put("total_orders", book.len() as f64);
    put("total_orders_delivered", delivered.len() as f64);
    put("total_orders_undelivered", undelivered as f64);
    put("simulation_minutes", now);

    MetricsReport {
        kpis,
        orders,
        assets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{Location, TimeOfDay};
    use crate::models::asset::Asset;
    use crate::models::order::Order;

    fn delivered_order(id: &str, placed: f64, assigned: f64, delivered: f64) -> Order {
        let mut o = Order::new(id.to_string(), 5, vec![], TimeOfDay::Morning, placed).unwrap();
        o.record_offer(assigned).unwrap();
        o.mark_assigned(assigned, "staff1", None, 5).unwrap();
        o.mark_picked_up(assigned + 1.0).unwrap();
        o.mark_delivered(delivered, 5).unwrap();
        o
    }

    fn fixture() -> (OrderBook, AssetRegistry) {
        let mut book = OrderBook::new();
        book.place_order(delivered_order("ORD0001", 0.0, 2.0, 20.0))
            .unwrap();
        book.place_order(delivered_order("ORD0002", 5.0, 6.0, 35.0))
            .unwrap();
        book.place_order(
            Order::new("ORD0003".to_string(), 9, vec![], TimeOfDay::Noon, 10.0).unwrap(),
        )
        .unwrap();

        let mut registry = AssetRegistry::new();
        let mut staff = Asset::new_staff(
            "staff1".to_string(),
            "Esteban".to_string(),
            Location::Clubhouse,
        );
        staff.stats_mut().deliveries = 2;
        staff.stats_mut().active_minutes = 30.0;
        staff.stats_mut().idle_minutes = 30.0;
        registry.register(staff).unwrap();
        (book, registry)
    }

    #[test]
    fn test_basic_kpis() {
        let (book, registry) = fixture();
        let report = collect(&book, &registry, KpiTargets::default(), 60.0);

        assert_eq!(report.kpis["total_orders"], 3.0);
        assert_eq!(report.kpis["total_orders_delivered"], 2.0);
        assert_eq!(report.kpis["total_orders_undelivered"], 1.0);
        // delivery times: 20 and 30 minutes
        assert!((report.kpis["avg_delivery_time_min"] - 25.0).abs() < 1e-9);
        assert!((report.kpis["median_delivery_time_min"] - 25.0).abs() < 1e-9);
        assert!((report.kpis["min_delivery_time_min"] - 20.0).abs() < 1e-9);
        assert!((report.kpis["max_delivery_time_min"] - 30.0).abs() < 1e-9);
        // one of two delivered within the 25-minute target
        assert!((report.kpis["on_time_delivery_pct"] - 50.0).abs() < 1e-9);
        assert!((report.kpis["orders_per_hour"] - 2.0).abs() < 1e-9);
        assert!((report.kpis["avg_utilization_pct"] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_batched_pct_counts_delivered_only() {
        let (mut book, registry) = fixture();
        // one batch-tagged delivered order joins the two singles
        let mut o = Order::new("ORD0004".to_string(), 5, vec![], TimeOfDay::Morning, 0.0).unwrap();
        o.record_offer(1.0).unwrap();
        o.mark_assigned(1.0, "staff1", Some("B0001".to_string()), 5)
            .unwrap();
        o.mark_picked_up(2.0).unwrap();
        o.mark_delivered(10.0, 5).unwrap();
        book.place_order(o).unwrap();

        let report = collect(&book, &registry, KpiTargets::default(), 60.0);
        assert_eq!(report.kpis["total_orders_delivered"], 3.0);
        assert!((report.kpis["batched_pct"] - (1.0 / 3.0 * 100.0)).abs() < 1e-9);
        assert!(report.kpis["batched_pct"] <= 100.0);
    }

    #[test]
    fn test_empty_run_all_zeroes() {
        let report = collect(
            &OrderBook::new(),
            &AssetRegistry::new(),
            KpiTargets::default(),
            0.0,
        );
        assert_eq!(report.kpis["avg_delivery_time_min"], 0.0);
        assert_eq!(report.kpis["orders_per_hour"], 0.0);
        assert_eq!(report.kpis["batched_pct"], 0.0);
        assert!(report.orders.is_empty());
        assert!(report.assets.is_empty());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let (book, registry) = fixture();
        let report = collect(&book, &registry, KpiTargets::default(), 60.0);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("avg_delivery_time_min"));
        let back: MetricsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
