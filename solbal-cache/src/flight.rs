//! Per-key flight table.
//!
//! The first caller to miss on a key registers a flight and becomes its
//! leader; everyone else arriving while it is registered subscribes to the
//! leader's outcome. The flight is removed as soon as the leader finishes or
//! is dropped, so the table only ever holds keys that are in flight.
//!
//! Outcomes travel over a `watch` channel because it is level-triggered: a
//! follower that subscribes after the leader published still sees the value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use solbal_core::{Balance, LookupError};

/// Result a leader hands to its followers.
pub(crate) type Outcome = Result<Balance, LookupError>;

/// Receiving side of a flight.
pub(crate) type OutcomeReceiver = watch::Receiver<Option<Outcome>>;

struct Flight {
    id: u64,
    rx: OutcomeReceiver,
}

/// Map of key → in-flight lookup.
///
/// The mutex guards O(1) map operations only and is never held across an
/// `.await`.
pub(crate) struct FlightTable {
    flights: Mutex<HashMap<String, Flight>>,
    next_id: AtomicU64,
}

/// What a caller should do after joining a key.
pub(crate) enum Role<'a> {
    /// Perform the lookup and publish the outcome.
    Leader(FlightLease<'a>),
    /// Wait for the leader's outcome.
    Follower(OutcomeReceiver),
}

impl FlightTable {
    pub(crate) fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Atomically joins the flight for `key`, creating it if absent.
    pub(crate) fn join(&self, key: &str) -> Role<'_> {
        let mut flights = self.flights.lock();

        if let Some(flight) = flights.get(key) {
            return Role::Follower(flight.rx.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        flights.insert(key.to_owned(), Flight { id, rx });

        Role::Leader(FlightLease {
            table: self,
            key: key.to_owned(),
            id,
            tx,
            published: false,
        })
    }

    /// Number of keys currently in flight.
    pub(crate) fn len(&self) -> usize {
        self.flights.lock().len()
    }

    fn retire(&self, key: &str, id: u64) {
        let mut flights = self.flights.lock();
        if flights.get(key).map(|f| f.id) == Some(id) {
            flights.remove(key);
        }
    }
}

/// Leadership of one flight.
///
/// Dropping the lease removes the flight from the table. If it is dropped
/// before [`FlightLease::publish`], the sender goes with it and followers
/// observe a closed channel.
pub(crate) struct FlightLease<'a> {
    table: &'a FlightTable,
    key: String,
    id: u64,
    tx: watch::Sender<Option<Outcome>>,
    published: bool,
}

impl FlightLease<'_> {
    /// Delivers `outcome` to every follower and retires the flight.
    pub(crate) fn publish(mut self, outcome: Outcome) {
        self.tx.send_replace(Some(outcome));
        self.published = true;
    }
}

impl Drop for FlightLease<'_> {
    fn drop(&mut self) {
        self.table.retire(&self.key, self.id);
        if !self.published {
            debug!(key = %self.key, "Flight abandoned by its leader");
        }
    }
}
