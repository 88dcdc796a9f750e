//! Event logging for simulation replay and auditing.
//!
//! Every significant state change during a run is recorded as an [`Event`].
//! The log enables deterministic replay verification (two runs with the
//! same `(config, seed)` must produce identical logs), debugging, and KPI
//! extraction.
//!
//! The wire form is line-oriented with a stable field order:
//!
//! ```text
//! t=12.50 kind=OrderAssigned order=ORD0007 asset=cart1 detail=hole=6;eta=7.25
//! ```

/// Simulation event capturing a state change.
///
/// All events carry the simulated time (minutes) at which they occurred.
/// Events are logged in the order they happen within a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new order was placed
    OrderPlaced {
        t: f64,
        order_id: String,
        hole: u8,
        value_cents: i64,
    },

    /// Dispatch ran and found no feasible candidate
    NoCandidate {
        t: f64,
        order_id: String,
        retry_count: u32,
    },

    /// An offer went out to a candidate asset
    OfferExtended {
        t: f64,
        order_id: String,
        asset_id: String,
        rank: usize,
        acceptance_prob: f64,
    },

    /// The candidate accepted within the window
    OfferAccepted {
        t: f64,
        order_id: String,
        asset_id: String,
    },

    /// The offer window elapsed without acceptance
    OfferTimedOut {
        t: f64,
        order_id: String,
        asset_id: String,
    },

    /// Assignment committed (per order; batches emit one per member)
    OrderAssigned {
        t: f64,
        order_id: String,
        asset_id: String,
        predicted_hole: u8,
        eta_minutes: f64,
    },

    /// A multi-order batch was committed to one asset
    BatchCommitted {
        t: f64,
        batch_id: String,
        asset_id: String,
        order_ids: Vec<String>,
    },

    /// Candidate list exhausted; order re-queued for a later retry
    OrderRequeued {
        t: f64,
        order_id: String,
        retry_count: u32,
        next_attempt_at: f64,
    },

    /// Retry cap exceeded; order abandoned
    OrderUnassignable {
        t: f64,
        order_id: String,
        retry_count: u32,
    },

    /// An asset reached a route waypoint
    AssetArrived {
        t: f64,
        asset_id: String,
        location: String,
    },

    /// Orders left the clubhouse with the asset
    OrderPickedUp {
        t: f64,
        order_id: String,
        asset_id: String,
    },

    /// Order handed to the golfer
    OrderDelivered {
        t: f64,
        order_id: String,
        asset_id: String,
        hole: u8,
        total_minutes: f64,
    },

    /// The scenario reached its configured end
    SimulationEnded {
        t: f64,
        delivered: usize,
        undelivered: usize,
    },
}

impl Event {
    /// Simulated time at which this event occurred.
    pub fn time(&self) -> f64 {
        match self {
            Event::OrderPlaced { t, .. }
            | Event::NoCandidate { t, .. }
            | Event::OfferExtended { t, .. }
            | Event::OfferAccepted { t, .. }
            | Event::OfferTimedOut { t, .. }
            | Event::OrderAssigned { t, .. }
            | Event::BatchCommitted { t, .. }
            | Event::OrderRequeued { t, .. }
            | Event::OrderUnassignable { t, .. }
            | Event::AssetArrived { t, .. }
            | Event::OrderPickedUp { t, .. }
            | Event::OrderDelivered { t, .. }
            | Event::SimulationEnded { t, .. } => *t,
        }
    }

    /// Stable name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "OrderPlaced",
            Event::NoCandidate { .. } => "NoCandidate",
            Event::OfferExtended { .. } => "OfferExtended",
            Event::OfferAccepted { .. } => "OfferAccepted",
            Event::OfferTimedOut { .. } => "OfferTimedOut",
            Event::OrderAssigned { .. } => "OrderAssigned",
            Event::BatchCommitted { .. } => "BatchCommitted",
            Event::OrderRequeued { .. } => "OrderRequeued",
            Event::OrderUnassignable { .. } => "OrderUnassignable",
            Event::AssetArrived { .. } => "AssetArrived",
            Event::OrderPickedUp { .. } => "OrderPickedUp",
            Event::OrderDelivered { .. } => "OrderDelivered",
            Event::SimulationEnded { .. } => "SimulationEnded",
        }
    }

    /// Order id, when the event relates to a specific order.
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Event::OrderPlaced { order_id, .. }
            | Event::NoCandidate { order_id, .. }
            | Event::OfferExtended { order_id, .. }
            | Event::OfferAccepted { order_id, .. }
            | Event::OfferTimedOut { order_id, .. }
            | Event::OrderAssigned { order_id, .. }
            | Event::OrderRequeued { order_id, .. }
            | Event::OrderUnassignable { order_id, .. }
            | Event::OrderPickedUp { order_id, .. }
            | Event::OrderDelivered { order_id, .. } => Some(order_id),
            _ => None,
        }
    }

    /// Asset id, when the event relates to a specific asset.
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            Event::OfferExtended { asset_id, .. }
            | Event::OfferAccepted { asset_id, .. }
            | Event::OfferTimedOut { asset_id, .. }
            | Event::OrderAssigned { asset_id, .. }
            | Event::BatchCommitted { asset_id, .. }
            | Event::AssetArrived { asset_id, .. }
            | Event::OrderPickedUp { asset_id, .. }
            | Event::OrderDelivered { asset_id, .. } => Some(asset_id),
            _ => None,
        }
    }

    /// Kind-specific detail, rendered `key=value` joined by `;`.
    pub fn detail(&self) -> String {
        match self {
            Event::OrderPlaced {
                hole, value_cents, ..
            } => format!("hole={};value={}", hole, value_cents),
            Event::NoCandidate { retry_count, .. } => format!("retry={}", retry_count),
            Event::OfferExtended {
                rank,
                acceptance_prob,
                ..
            } => format!("rank={};p_accept={:.2}", rank, acceptance_prob),
            Event::OfferAccepted { .. } | Event::OfferTimedOut { .. } => String::new(),
            Event::OrderAssigned {
                predicted_hole,
                eta_minutes,
                ..
            } => format!("hole={};eta={:.2}", predicted_hole, eta_minutes),
            Event::BatchCommitted {
                batch_id,
                order_ids,
                ..
            } => format!("batch={};orders={}", batch_id, order_ids.join(",")),
            Event::OrderRequeued {
                retry_count,
                next_attempt_at,
                ..
            } => format!("retry={};next={:.2}", retry_count, next_attempt_at),
            Event::OrderUnassignable { retry_count, .. } => format!("retry={}", retry_count),
            Event::AssetArrived { location, .. } => format!("at={}", location),
            Event::OrderPickedUp { .. } => String::new(),
            Event::OrderDelivered {
                hole,
                total_minutes,
                ..
            } => format!("hole={};total={:.2}", hole, total_minutes),
            Event::SimulationEnded {
                delivered,
                undelivered,
                ..
            } => format!("delivered={};undelivered={}", delivered, undelivered),
        }
    }

    /// Render the stable line form: `t= kind= order= asset= <detail>`.
    pub fn render_line(&self) -> String {
        let mut line = format!("t={:.2} kind={}", self.time(), self.kind());
        line.push_str(&format!(" order={}", self.order_id().unwrap_or("-")));
        line.push_str(&format!(" asset={}", self.asset_id().unwrap_or("-")));
        let detail = self.detail();
        if !detail.is_empty() {
            line.push(' ');
            line.push_str(&detail);
        }
        line
    }
}

/// Event log for storing and querying simulation events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log.
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of a specific kind.
    pub fn events_of_kind(&self, kind: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Events for a specific order.
    pub fn events_for_order(&self, order_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.order_id() == Some(order_id))
            .collect()
    }

    /// Events for a specific asset.
    pub fn events_for_asset(&self, asset_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.asset_id() == Some(asset_id))
            .collect()
    }

    /// Render the whole log in the stable line form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&event.render_line());
            out.push('\n');
        }
        out
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
