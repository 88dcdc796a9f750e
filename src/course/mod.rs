//! Course model: directed loop graph and travel-time lookups
//!
//! An 18-hole course is modeled as two directed 9-hole cycles (the front
//! loop 1→2→…→9→1 and the back loop 10→11→…→18→10) with a per-segment
//! average traversal time. The clubhouse is a distinguished location sitting
//! at the two loop heads (the 1st and 10th tee boxes); entering or leaving
//! it from a loop head costs nothing.
//!
//! Beverage carts traverse their loop forward only. Delivery staff may walk
//! a loop in either direction and may cross between loops through the
//! clubhouse.
//!
//! # Critical Invariants
//!
//! 1. The segment table forms exactly two simple directed cycles covering
//!    holes {1..9} and {10..18}
//! 2. `eta` is total and never negative; an off-loop target for a cart
//!    yields `+∞` (ineligible), never an error
//! 3. Traversal is by table lookup with a step counter bounded by 9 — the
//!    cyclic graph is never walked unboundedly

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Hole number, 1–18.
pub type Hole = u8;

/// Highest hole number on the course.
pub const LAST_HOLE: Hole = 18;

/// Errors raised by course lookups and map validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CourseError {
    #[error("Unknown hole {0} (valid holes are 1-18)")]
    UnknownHole(u8),

    #[error("Segment {from}->{to} does not connect holes of one loop")]
    InvalidSegment { from: Hole, to: Hole },

    #[error("Segment {from}->{to} has non-positive duration {minutes}")]
    NonPositiveDuration { from: Hole, to: Hole, minutes: f64 },

    #[error("Segments do not form a simple directed cycle over the {0} loop")]
    IncompleteLoop(LoopId),

    #[error("Cart restricted to the {cart_loop} loop cannot stand at hole {hole}")]
    ZoneViolation { hole: Hole, cart_loop: LoopId },
}

/// One of the two directed 9-hole cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoopId {
    /// Holes 1-9
    Front,
    /// Holes 10-18
    Back,
}

impl LoopId {
    /// Loop membership of a hole.
    pub fn of_hole(hole: Hole) -> Result<Self, CourseError> {
        match hole {
            1..=9 => Ok(LoopId::Front),
            10..=18 => Ok(LoopId::Back),
            other => Err(CourseError::UnknownHole(other)),
        }
    }

    /// The loop's head vertex: the hole adjacent to the clubhouse.
    pub fn head(&self) -> Hole {
        match self {
            LoopId::Front => 1,
            LoopId::Back => 10,
        }
    }

    /// All holes on this loop, in play order.
    pub fn holes(&self) -> std::ops::RangeInclusive<Hole> {
        match self {
            LoopId::Front => 1..=9,
            LoopId::Back => 10..=18,
        }
    }

    /// Whether `hole` lies on this loop.
    pub fn contains(&self, hole: Hole) -> bool {
        self.holes().contains(&hole)
    }
}

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopId::Front => write!(f, "front"),
            LoopId::Back => write!(f, "back"),
        }
    }
}

/// Time-of-day bucket driving the traffic multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    /// Early rounds, paths clear
    Morning,
    /// Lunch rush on the cart paths
    Noon,
    /// Normal conditions
    Afternoon,
}

impl TimeOfDay {
    /// Traffic multiplier applied to every segment traversal.
    pub fn traffic_multiplier(&self) -> f64 {
        match self {
            TimeOfDay::Morning => 0.8,
            TimeOfDay::Noon => 1.2,
            TimeOfDay::Afternoon => 1.0,
        }
    }
}

/// First hole of the uphill stretch (holes 10-15 climb).
const UPHILL_FIRST: Hole = 10;
/// Last hole of the uphill stretch.
const UPHILL_LAST: Hole = 15;
/// Additive multiplier surcharge for uphill segments.
const UPHILL_SURCHARGE: f64 = 0.15;

/// Directed edge between consecutive holes on a loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Hole,
    pub to: Hole,
    pub avg_minutes: f64,
}

/// Where something on the course is.
///
/// Carts and staff mid-traversal sit at a fractional position along a
/// segment; staff may additionally be at the clubhouse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Location {
    /// At the clubhouse (loop heads, order pickup point)
    Clubhouse,
    /// At a hole's head vertex
    Hole(Hole),
    /// Partway along the directed segment `from -> to`
    MidSegment { from: Hole, to: Hole, fraction: f64 },
}

impl Location {
    /// The hole this location resolves to for hop-count arithmetic.
    ///
    /// Mid-segment positions round forward to the segment's destination;
    /// the clubhouse resolves to the front loop head.
    pub fn nearest_hole(&self) -> Hole {
        match self {
            Location::Clubhouse => LoopId::Front.head(),
            Location::Hole(h) => *h,
            Location::MidSegment { to, .. } => *to,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Clubhouse => write!(f, "clubhouse"),
            Location::Hole(h) => write!(f, "hole{}", h),
            Location::MidSegment { from, to, fraction } => {
                write!(f, "seg{}-{}@{:.2}", from, to, fraction)
            }
        }
    }
}

/// Default segment traversal time when building the standard map.
pub const DEFAULT_SEGMENT_MINUTES: f64 = 1.5;

/// The course map: a flat table of directed segments indexed by from-hole.
///
/// # Example
/// ```
/// use fairway_dispatch::course::{CourseMap, TimeOfDay};
///
/// let course = CourseMap::standard();
/// let t = course.forward_time(1, 5, TimeOfDay::Afternoon).unwrap();
/// assert!((t - 6.0).abs() < 1e-9); // four segments at 1.5 min each
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseMap {
    /// Outgoing segment per hole (each hole has exactly one)
    segments: BTreeMap<Hole, Segment>,
}

impl CourseMap {
    /// Build and validate a course map from a raw segment table.
    ///
    /// The table must contain exactly one outgoing segment per hole and the
    /// segments must form two simple directed cycles covering {1..9} and
    /// {10..18}. Durations must be positive.
    pub fn from_segments(table: Vec<Segment>) -> Result<Self, CourseError> {
        let mut segments = BTreeMap::new();
        for seg in table {
            let from_loop = LoopId::of_hole(seg.from)?;
            let to_loop = LoopId::of_hole(seg.to)?;
            if from_loop != to_loop {
                return Err(CourseError::InvalidSegment {
                    from: seg.from,
                    to: seg.to,
                });
            }
            if seg.avg_minutes <= 0.0 {
                return Err(CourseError::NonPositiveDuration {
                    from: seg.from,
                    to: seg.to,
                    minutes: seg.avg_minutes,
                });
            }
            if segments.insert(seg.from, seg).is_some() {
                return Err(CourseError::InvalidSegment {
                    from: seg.from,
                    to: seg.to,
                });
            }
        }

        let map = Self { segments };
        map.validate_loop(LoopId::Front)?;
        map.validate_loop(LoopId::Back)?;
        Ok(map)
    }

    /// The standard map: both cycles with a uniform per-segment time.
    pub fn standard() -> Self {
        let mut table = Vec::with_capacity(18);
        for loop_id in [LoopId::Front, LoopId::Back] {
            for from in loop_id.holes() {
                let to = Self::successor_in(loop_id, from);
                table.push(Segment {
                    from,
                    to,
                    avg_minutes: DEFAULT_SEGMENT_MINUTES,
                });
            }
        }
        Self::from_segments(table).expect("standard map is valid")
    }

    fn successor_in(loop_id: LoopId, hole: Hole) -> Hole {
        let holes = loop_id.holes();
        if hole == *holes.end() {
            *holes.start()
        } else {
            hole + 1
        }
    }

    /// Walk one full cycle from the loop head; every hole must be visited
    /// exactly once before returning to the head.
    fn validate_loop(&self, loop_id: LoopId) -> Result<(), CourseError> {
        let head = loop_id.head();
        let mut seen = std::collections::BTreeSet::new();
        let mut at = head;
        for _ in 0..9 {
            let seg = self
                .segments
                .get(&at)
                .ok_or(CourseError::IncompleteLoop(loop_id))?;
            if !loop_id.contains(seg.to) || !seen.insert(at) {
                return Err(CourseError::IncompleteLoop(loop_id));
            }
            at = seg.to;
        }
        if at != head || seen.len() != 9 {
            return Err(CourseError::IncompleteLoop(loop_id));
        }
        Ok(())
    }

    /// Outgoing segment of a hole.
    pub fn segment_from(&self, hole: Hole) -> Result<&Segment, CourseError> {
        LoopId::of_hole(hole)?;
        self.segments
            .get(&hole)
            .ok_or(CourseError::UnknownHole(hole))
    }

    /// The next hole along the loop direction.
    pub fn next_hole(&self, hole: Hole) -> Result<Hole, CourseError> {
        Ok(self.segment_from(hole)?.to)
    }

    /// Effective traversal cost of one segment: the time-of-day traffic
    /// multiplier, with the uphill surcharge added for segments departing
    /// holes 10-15.
    fn segment_cost(&self, seg: &Segment, tod: TimeOfDay) -> f64 {
        let mut multiplier = tod.traffic_multiplier();
        if (UPHILL_FIRST..=UPHILL_LAST).contains(&seg.from) {
            multiplier += UPHILL_SURCHARGE;
        }
        seg.avg_minutes * multiplier
    }

    /// Travel time along the loop direction from `from` to `to`.
    ///
    /// Both holes must lie on the same loop. Going "backwards" means
    /// traversing the remainder of the cycle.
    pub fn forward_time(&self, from: Hole, to: Hole, tod: TimeOfDay) -> Result<f64, CourseError> {
        let from_loop = LoopId::of_hole(from)?;
        let to_loop = LoopId::of_hole(to)?;
        if from_loop != to_loop {
            return Err(CourseError::InvalidSegment { from, to });
        }
        let mut total = 0.0;
        let mut at = from;
        for _ in 0..9 {
            if at == to {
                return Ok(total);
            }
            let seg = self.segment_from(at)?;
            total += self.segment_cost(seg, tod);
            at = seg.to;
        }
        debug_assert_eq!(at, to, "loop walk must terminate within 9 steps");
        Ok(total)
    }

    /// Number of forward hops from `from` to `to` along the loop.
    pub fn forward_hops(&self, from: Hole, to: Hole) -> Result<u8, CourseError> {
        let from_loop = LoopId::of_hole(from)?;
        if from_loop != LoopId::of_hole(to)? {
            return Err(CourseError::InvalidSegment { from, to });
        }
        let mut hops = 0;
        let mut at = from;
        for _ in 0..9 {
            if at == to {
                return Ok(hops);
            }
            at = self.next_hole(at)?;
            hops += 1;
        }
        Ok(hops)
    }

    /// Minimum-direction travel time between two holes of one loop (staff
    /// may walk either way around).
    pub fn loop_min_time(&self, a: Hole, b: Hole, tod: TimeOfDay) -> Result<f64, CourseError> {
        let fwd = self.forward_time(a, b, tod)?;
        let bwd = self.forward_time(b, a, tod)?;
        Ok(fwd.min(bwd))
    }

    /// Minimum hop distance between any two holes, crossing loops through
    /// the clubhouse when needed. Used by the acceptance model and batch
    /// adjacency checks for staff.
    pub fn hole_distance(&self, a: Hole, b: Hole) -> Result<u8, CourseError> {
        let loop_a = LoopId::of_hole(a)?;
        let loop_b = LoopId::of_hole(b)?;
        if loop_a == loop_b {
            Ok(self.forward_hops(a, b)?.min(self.forward_hops(b, a)?))
        } else {
            // through the clubhouse: to own head, across, out to target
            let to_head = self.hops_to_head(a)?;
            let from_head = self.hops_from_head(b)?;
            Ok(to_head + from_head + 1)
        }
    }

    fn hops_to_head(&self, hole: Hole) -> Result<u8, CourseError> {
        let head = LoopId::of_hole(hole)?.head();
        Ok(self.forward_hops(hole, head)?.min(self.forward_hops(head, hole)?))
    }

    fn hops_from_head(&self, hole: Hole) -> Result<u8, CourseError> {
        self.hops_to_head(hole)
    }

    /// Hop distance from an arbitrary location to the clubhouse.
    pub fn hops_to_clubhouse(&self, loc: &Location) -> Result<u8, CourseError> {
        match loc {
            Location::Clubhouse => Ok(0),
            Location::Hole(h) => self.hops_to_head(*h),
            Location::MidSegment { to, .. } => Ok(self.hops_to_head(*to)?.saturating_add(1)),
        }
    }

    // ------------------------------------------------------------------
    // Cart ETA (forward only)
    // ------------------------------------------------------------------

    /// ETA in minutes for a cart restricted to `cart_loop` to reach the
    /// head vertex of `target`.
    ///
    /// Returns `+∞` when the target lies off the cart's loop: the cart is
    /// ineligible, not in error. A cart standing off its own loop is a
    /// `ZoneViolation` (planner bug).
    pub fn cart_eta(
        &self,
        loc: &Location,
        cart_loop: LoopId,
        target: Hole,
        tod: TimeOfDay,
    ) -> Result<f64, CourseError> {
        let target_loop = LoopId::of_hole(target)?;
        if target_loop != cart_loop {
            return Ok(f64::INFINITY);
        }
        match loc {
            // a cart "at the clubhouse" stands at its loop head
            Location::Clubhouse => self.forward_time(cart_loop.head(), target, tod),
            Location::Hole(h) => {
                if !cart_loop.contains(*h) {
                    return Err(CourseError::ZoneViolation {
                        hole: *h,
                        cart_loop,
                    });
                }
                self.forward_time(*h, target, tod)
            }
            Location::MidSegment { from, to, fraction } => {
                if !cart_loop.contains(*from) {
                    return Err(CourseError::ZoneViolation {
                        hole: *from,
                        cart_loop,
                    });
                }
                let seg = self.segment_from(*from)?;
                let residual = (1.0 - fraction.clamp(0.0, 1.0)) * self.segment_cost(seg, tod);
                Ok(residual + self.forward_time(*to, target, tod)?)
            }
        }
    }

    /// ETA for a cart to reach the clubhouse: forward traversal to its loop
    /// head. No resupply stop is modeled on the wrap-around.
    pub fn cart_eta_to_clubhouse(
        &self,
        loc: &Location,
        cart_loop: LoopId,
        tod: TimeOfDay,
    ) -> Result<f64, CourseError> {
        self.cart_eta(loc, cart_loop, cart_loop.head(), tod)
    }

    // ------------------------------------------------------------------
    // Staff ETA (either direction, clubhouse crossings)
    // ------------------------------------------------------------------

    /// ETA in minutes for a staff member to reach the head vertex of
    /// `target` from anywhere on the course.
    pub fn staff_eta(
        &self,
        loc: &Location,
        target: Hole,
        tod: TimeOfDay,
    ) -> Result<f64, CourseError> {
        let target_loop = LoopId::of_hole(target)?;
        match loc {
            Location::Clubhouse => self.loop_min_time(target_loop.head(), target, tod),
            Location::Hole(h) => {
                if LoopId::of_hole(*h)? == target_loop {
                    self.loop_min_time(*h, target, tod)
                } else {
                    // cross between loops via the clubhouse
                    let to_club = self.staff_eta_to_clubhouse(loc, tod)?;
                    let out = self.loop_min_time(target_loop.head(), target, tod)?;
                    Ok(to_club + out)
                }
            }
            Location::MidSegment { from, to, fraction } => {
                let seg = self.segment_from(*from)?;
                let cost = self.segment_cost(seg, tod);
                let f = fraction.clamp(0.0, 1.0);
                let via_to =
                    (1.0 - f) * cost + self.staff_eta(&Location::Hole(*to), target, tod)?;
                let via_from = f * cost + self.staff_eta(&Location::Hole(*from), target, tod)?;
                Ok(via_to.min(via_from))
            }
        }
    }

    /// ETA for a staff member to reach the clubhouse.
    pub fn staff_eta_to_clubhouse(
        &self,
        loc: &Location,
        tod: TimeOfDay,
    ) -> Result<f64, CourseError> {
        match loc {
            Location::Clubhouse => Ok(0.0),
            Location::Hole(h) => {
                let head = LoopId::of_hole(*h)?.head();
                self.loop_min_time(*h, head, tod)
            }
            Location::MidSegment { from, to, fraction } => {
                let seg = self.segment_from(*from)?;
                let cost = self.segment_cost(seg, tod);
                let f = fraction.clamp(0.0, 1.0);
                let via_to =
                    (1.0 - f) * cost + self.staff_eta_to_clubhouse(&Location::Hole(*to), tod)?;
                let via_from =
                    f * cost + self.staff_eta_to_clubhouse(&Location::Hole(*from), tod)?;
                Ok(via_to.min(via_from))
            }
        }
    }

    /// The hole whose outgoing segment ends at `hole`.
    fn predecessor(&self, hole: Hole) -> Result<Hole, CourseError> {
        LoopId::of_hole(hole)?;
        self.segments
            .values()
            .find(|seg| seg.to == hole)
            .map(|seg| seg.from)
            .ok_or(CourseError::UnknownHole(hole))
    }

    /// Hole-by-hole path from `from` to `to`, endpoints included.
    ///
    /// Carts (`forward_only`) sweep the loop direction; staff take the
    /// cheaper direction and cross loops through the clubhouse heads. Used
    /// by location ticks to interpolate a moving asset's position.
    pub fn walk_path(
        &self,
        from: Hole,
        to: Hole,
        forward_only: bool,
        tod: TimeOfDay,
    ) -> Result<Vec<Hole>, CourseError> {
        let from_loop = LoopId::of_hole(from)?;
        let to_loop = LoopId::of_hole(to)?;

        if from_loop != to_loop {
            if forward_only {
                return Err(CourseError::InvalidSegment { from, to });
            }
            // through the clubhouse: own head, then out from the other head
            let mut path = self.walk_path(from, from_loop.head(), false, tod)?;
            let out = self.walk_path(to_loop.head(), to, false, tod)?;
            path.extend(out);
            return Ok(path);
        }

        let go_forward = forward_only
            || self.forward_time(from, to, tod)? <= self.forward_time(to, from, tod)?;
        let mut path = vec![from];
        let mut at = from;
        for _ in 0..9 {
            if at == to {
                break;
            }
            at = if go_forward {
                self.next_hole(at)?
            } else {
                self.predecessor(at)?
            };
            path.push(at);
        }
        Ok(path)
    }

    // ------------------------------------------------------------------
    // Player movement prediction
    // ------------------------------------------------------------------

    /// Predict the hole where a golfer who ordered at `order_hole` will be
    /// when the delivery arrives.
    ///
    /// `eta_to` yields the delivery ETA to a candidate target hole; the
    /// prediction and the ETA are mutually dependent, so a short fixed-point
    /// iteration is run (three rounds, matching the stability horizon of
    /// the pace model). The golfer advances one hole per `pace_min` along
    /// the round order, capped at the 18th.
    ///
    /// Returns `(predicted_hole, eta)`; an infinite ETA short-circuits.
    pub fn predict_drop_hole(
        &self,
        order_hole: Hole,
        pace_min: f64,
        mut eta_to: impl FnMut(Hole) -> f64,
    ) -> (Hole, f64) {
        let mut target = order_hole;
        let mut eta = eta_to(target);
        for _ in 0..3 {
            if !eta.is_finite() {
                return (target, eta);
            }
            let advanced = (eta / pace_min).floor() as u16;
            let new_target = (order_hole as u16 + advanced).min(LAST_HOLE as u16) as Hole;
            if new_target == target {
                break;
            }
            target = new_target;
            eta = eta_to(target);
        }
        (target, eta)
    }
}

impl Default for CourseMap {
    fn default() -> Self {
        Self::standard()
    }
}
