//! Single-flight coordination.
//!
//! At most one computation runs per key. The first caller to miss becomes
//! the owner and receives a [`watch`] sender; everyone else gets a receiver
//! and awaits the owner's result. The owner runs the computation on a
//! spawned task, so a caller that times out or disconnects does not abort
//! work other callers are waiting on.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::CacheError;

pub(crate) type FlightResult = Result<Arc<Vec<u8>>, CacheError>;

pub(crate) enum FlightRole {
    Owner(watch::Sender<Option<FlightResult>>),
    Waiter(watch::Receiver<Option<FlightResult>>),
}

#[derive(Debug, Default)]
pub(crate) struct FlightRegistry {
    flights: DashMap<String, watch::Receiver<Option<FlightResult>>>,
}

impl FlightRegistry {
    pub(crate) fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    /// Join the flight for `key`, claiming ownership if none is running.
    pub(crate) fn join(&self, key: &str) -> FlightRole {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(occupied) => FlightRole::Waiter(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx);
                FlightRole::Owner(tx)
            }
        }
    }

    /// Publish the result and retire the flight. Removal happens before the
    /// send so a caller arriving afterwards starts a fresh flight instead of
    /// observing a finished one.
    ///
    /// Returns whether this flight was still the registered one. A flight
    /// retired early by [`remove`](FlightRegistry::remove) (or superseded by
    /// a newer one for the same key) gets `false`; its result still reaches
    /// the waiters that joined it, but it must not be cached.
    pub(crate) fn complete(
        &self,
        key: &str,
        tx: &watch::Sender<Option<FlightResult>>,
        result: FlightResult,
    ) -> bool {
        let own_rx = tx.subscribe();
        let current = self
            .flights
            .remove_if(key, |_, registered| registered.same_channel(&own_rx))
            .is_some();
        let _ = tx.send(Some(result));
        current
    }

    /// Retire the flight for `key` without publishing a result. Callers that
    /// already joined keep their receivers and still see the owner's result;
    /// later callers start a fresh flight.
    pub(crate) fn remove(&self, key: &str) {
        self.flights.remove(key);
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

/// Await the outcome published by the flight owner.
pub(crate) async fn await_result(
    mut rx: watch::Receiver<Option<FlightResult>>,
) -> FlightResult {
    loop {
        {
            let seen = rx.borrow_and_update();
            if let Some(result) = seen.as_ref() {
                return result.clone();
            }
        }
        if rx.changed().await.is_err() {
            // Sender dropped without publishing: the computing task died.
            return Err(CacheError::Abandoned);
        }
    }
}
