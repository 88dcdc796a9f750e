//! Offer protocol
//!
//! Walks an order's ranked candidate list with one time-bounded offer out
//! at a time:
//!
//! ```text
//! Idle -> Offering(c_i) -> Accepted(c_i)   commit, round over
//!                       -> TimedOut(c_i)   reset c_i, advance to c_i+1
//! list exhausted        -> back to Pending, retry_count++
//! ```
//!
//! Whether a candidate will accept is drawn from the oracle's acceptance
//! probability the moment the offer goes out. An accepting candidate
//! responds immediately; a declining one stays silent and the armed
//! `OfferTimeout` event resolves the offer at the window boundary. Timers
//! are cancelled by supersession: every offer carries a sequence number,
//! and a timeout whose sequence no longer matches the outstanding offer is
//! skipped.
//!
//! Declines only feed acceptance statistics; they never change how a
//! candidate ranks in later rounds.

use crate::events::{Event, EventLog};
use crate::models::asset::AssetStatus;
use crate::models::book::OrderBook;
use crate::models::registry::AssetRegistry;
use crate::policy::Candidate;
use crate::rng::RngManager;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from protocol misuse; these indicate engine bugs, not runtime
/// conditions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OfferError {
    #[error("An offer round is already open for order {0}")]
    RoundAlreadyOpen(String),

    #[error(transparent)]
    Registry(#[from] crate::models::registry::RegistryError),

    #[error(transparent)]
    Book(#[from] crate::models::book::BookError),
}

/// What the protocol did; the engine reacts to each step.
#[derive(Debug, Clone)]
pub enum OfferStep {
    /// An offer is out; arm an `OfferTimeout` at `deadline` carrying `seq`
    Offered {
        asset_id: String,
        seq: u64,
        deadline: f64,
    },
    /// A candidate accepted; commit this option
    Committed { candidate: Candidate },
    /// Every candidate declined; requeue or abandon the order
    Exhausted,
}

/// The one outstanding offer of a round.
#[derive(Debug, Clone)]
struct ActiveOffer {
    seq: u64,
    candidate_index: usize,
    /// Drawn at offer time; silent (false) offers resolve at the deadline
    accepted: bool,
}

/// A ranked offer round for one order.
#[derive(Debug, Clone)]
struct OfferRound {
    ranked: Vec<Candidate>,
    next_index: usize,
    current: Option<ActiveOffer>,
}

/// Serial offer state machine over all in-flight orders.
#[derive(Debug)]
pub struct OfferProtocol {
    rounds: BTreeMap<String, OfferRound>,
    next_seq: u64,
    /// Batch cap used when re-validating ranked candidates
    max_batch_size: usize,
}

impl OfferProtocol {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            rounds: BTreeMap::new(),
            next_seq: 0,
            max_batch_size,
        }
    }

    /// Number of rounds currently holding an outstanding offer.
    pub fn open_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Start a round for `order_id` over the ranked list and put the first
    /// offer out.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_round(
        &mut self,
        order_id: &str,
        ranked: Vec<Candidate>,
        now: f64,
        offer_window_min: f64,
        registry: &mut AssetRegistry,
        book: &mut OrderBook,
        log: &mut EventLog,
        rng: &mut RngManager,
    ) -> Result<OfferStep, OfferError> {
        if self.rounds.contains_key(order_id) {
            return Err(OfferError::RoundAlreadyOpen(order_id.to_string()));
        }
        self.rounds.insert(
            order_id.to_string(),
            OfferRound {
                ranked,
                next_index: 0,
                current: None,
            },
        );
        self.advance(order_id, now, offer_window_min, registry, book, log, rng)
    }

    /// Resolve an `OfferTimeout` carrying `seq`.
    ///
    /// Returns `None` when the timer was superseded (the offer already
    /// resolved or the round is gone); otherwise the silent candidate is
    /// reset and the next step of the cascade is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_timeout(
        &mut self,
        order_id: &str,
        seq: u64,
        now: f64,
        offer_window_min: f64,
        registry: &mut AssetRegistry,
        book: &mut OrderBook,
        log: &mut EventLog,
        rng: &mut RngManager,
    ) -> Result<Option<OfferStep>, OfferError> {
        let Some(round) = self.rounds.get_mut(order_id) else {
            return Ok(None);
        };
        let matches = round
            .current
            .as_ref()
            .map(|o| o.seq == seq && !o.accepted)
            .unwrap_or(false);
        if !matches {
            return Ok(None); // superseded timer
        }

        let offer = round.current.take().expect("checked above");
        let asset_id = round.ranked[offer.candidate_index].asset_id.clone();
        log.log(Event::OfferTimedOut {
            t: now,
            order_id: order_id.to_string(),
            asset_id: asset_id.clone(),
        });
        Self::release_candidate(registry, &asset_id)?;

        self.advance(order_id, now, offer_window_min, registry, book, log, rng)
            .map(Some)
    }

    /// Drop a round without resolving it (simulation end).
    pub fn abort_round(
        &mut self,
        order_id: &str,
        registry: &mut AssetRegistry,
    ) -> Result<(), OfferError> {
        if let Some(round) = self.rounds.remove(order_id) {
            if let Some(offer) = round.current {
                let asset_id = &round.ranked[offer.candidate_index].asset_id;
                Self::release_candidate(registry, asset_id)?;
            }
        }
        Ok(())
    }

    /// Order ids with open rounds (for end-of-run draining).
    pub fn open_order_ids(&self) -> Vec<String> {
        self.rounds.keys().cloned().collect()
    }

    /// Put the next offer out, committing immediately when the draw says
    /// the candidate accepts.
    #[allow(clippy::too_many_arguments)]
    fn advance(
        &mut self,
        order_id: &str,
        now: f64,
        offer_window_min: f64,
        registry: &mut AssetRegistry,
        book: &mut OrderBook,
        log: &mut EventLog,
        rng: &mut RngManager,
    ) -> Result<OfferStep, OfferError> {
        loop {
            let round = self
                .rounds
                .get_mut(order_id)
                .expect("advance is only called on open rounds");

            let index = round.next_index;
            if index >= round.ranked.len() {
                self.rounds.remove(order_id);
                return Ok(OfferStep::Exhausted);
            }
            round.next_index += 1;

            // re-validate against live registry state: the snapshot the
            // strategy ranked may be stale by the time a cascade gets here
            let candidate = round.ranked[index].clone();
            let still_usable = registry
                .get(&candidate.asset_id)
                .map(|a| {
                    a.pending_offer().is_none()
                        && a.status() != AssetStatus::Offline
                        && a.active_order_count() + candidate.batch.len() <= self.max_batch_size
                })
                .unwrap_or(false);
            if !still_usable {
                continue;
            }

            let seq = self.next_seq;
            self.next_seq += 1;

            registry.arm_offer(&candidate.asset_id, seq)?;
            if registry.get(&candidate.asset_id)?.status() == AssetStatus::Available {
                registry.set_status(&candidate.asset_id, AssetStatus::OfferPending)?;
            }
            book.record_offer(order_id, now)?;

            let accepted = rng.bernoulli(candidate.score.acceptance_prob);
            log.log(Event::OfferExtended {
                t: now,
                order_id: order_id.to_string(),
                asset_id: candidate.asset_id.clone(),
                rank: index,
                acceptance_prob: candidate.score.acceptance_prob,
            });

            let round = self
                .rounds
                .get_mut(order_id)
                .expect("round still open");
            round.current = Some(ActiveOffer {
                seq,
                candidate_index: index,
                accepted,
            });

            if accepted {
                log.log(Event::OfferAccepted {
                    t: now,
                    order_id: order_id.to_string(),
                    asset_id: candidate.asset_id.clone(),
                });
                registry.clear_offer(&candidate.asset_id)?;
                self.rounds.remove(order_id);
                return Ok(OfferStep::Committed { candidate });
            }

            return Ok(OfferStep::Offered {
                asset_id: candidate.asset_id,
                seq,
                deadline: now + offer_window_min,
            });
        }
    }

    /// Reset a declining candidate: free the offer slot and restore
    /// `Available` when the offer was what made it busy.
    fn release_candidate(registry: &mut AssetRegistry, asset_id: &str) -> Result<(), OfferError> {
        registry.clear_offer(asset_id)?;
        if registry.get(asset_id)?.status() == AssetStatus::OfferPending {
            registry.set_status(asset_id, AssetStatus::Available)?;
        }
        Ok(())
    }
}
