//! Replay of queued offline verification events.
//!
//! [`SyncManager`] reads every unsynced event from the local store and
//! submits it to the server, which deduplicates on the
//! `(ticketId, timestamp)` idempotency key. Delivery is at-least-once: a
//! crash between "POST sent" and "mark synced" leaves the event queued, and
//! the server-side key absorbs the duplicate on the next window.
//!
//! `sync()` is reentrant. A single-flight set keyed by the idempotency key
//! guarantees that a second invocation while one is in flight does not
//! double-submit the same event.

use crate::error::Result;
use crate::server::VerifyApi;
use crate::store::LocalStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Events acknowledged by the server and marked synced.
    pub synced: usize,
    /// Events that stay queued for the next window.
    pub failed: usize,
}

/// Idempotently replays queued offline verification events.
#[derive(Debug, Clone)]
pub struct SyncManager<A, L>
where
    A: VerifyApi,
    L: LocalStore,
{
    api: A,
    store: L,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<A, L> SyncManager<A, L>
where
    A: VerifyApi,
    L: LocalStore,
{
    /// Create a sync manager over the server API and local store.
    #[must_use]
    pub fn new(api: A, store: L) -> Self {
        Self {
            api,
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replay all unsynced events once.
    ///
    /// Safe to call on a timer, on connectivity restoration, or from
    /// several tasks at once. Queued events are never dropped: only a
    /// server acknowledgment marks them synced.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read; per-event
    /// submission failures are counted in the report instead.
    pub async fn sync(&self) -> Result<SyncReport> {
        let pending = self.store.events_by_synced(false).await?;
        let mut report = SyncReport::default();

        for event in pending {
            let key = event.idempotency_key();

            // Single-flight: skip events another invocation is submitting
            let claimed = {
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .map_err(|_| crate::error::VerifyError::Storage(
                        "sync single-flight lock poisoned".to_string(),
                    ))?;
                in_flight.insert(key.clone())
            };
            if !claimed {
                tracing::debug!(%key, "event already in flight, skipping");
                continue;
            }

            // The pending list is a snapshot; another invocation may have
            // finished this event between the read and the claim.
            let still_pending = match self.store.event(&event.ticket_id).await {
                Ok(found) => found.is_some_and(|e| !e.synced),
                Err(e) => {
                    if let Ok(mut in_flight) = self.in_flight.lock() {
                        in_flight.remove(&key);
                    }
                    return Err(e);
                }
            };
            if !still_pending {
                if let Ok(mut in_flight) = self.in_flight.lock() {
                    in_flight.remove(&key);
                }
                continue;
            }

            match self.api.submit_boarding(&event).await {
                Ok(()) => match self.store.mark_event_synced(&event.ticket_id).await {
                    Ok(()) => {
                        tracing::info!(ticket_id = %event.ticket_id, "verification event synced");
                        report.synced += 1;
                    }
                    // The POST landed but the local flag did not; the event
                    // stays queued and the idempotency key absorbs the retry.
                    Err(e) => {
                        tracing::warn!(
                            ticket_id = %event.ticket_id,
                            error = %e,
                            "event acknowledged but not marked synced, will retry"
                        );
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        ticket_id = %event.ticket_id,
                        error = %e,
                        "event submission failed, left queued"
                    );
                    report.failed += 1;
                }
            }

            if let Ok(mut in_flight) = self.in_flight.lock() {
                in_flight.remove(&key);
            }
        }

        Ok(report)
    }
}
