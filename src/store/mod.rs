//! Local persistence for offline verification.
//!
//! [`LocalStore`] abstracts a transactional, secondary-indexed embedded
//! store with two logical tables:
//!
//! - **tickets**, keyed by id, indexed by user and status
//! - **verification events**, keyed by ticket id, indexed by the synced flag
//!
//! Every write is atomic and all-or-nothing per record: no partial record
//! (or stale index entry) is ever observable. Any ordered, durable, indexed
//! local store satisfies the contract; [`InMemoryLocalStore`] is the
//! reference implementation.

pub mod memory;

pub use memory::InMemoryLocalStore;

use crate::error::Result;
use crate::types::{OfflineVerificationEvent, Ticket, TicketStatus};
use chrono::Duration;

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupStats {
    /// Tickets removed (aged out or COMPLETED).
    pub tickets_removed: usize,
    /// Synced verification events removed past the retention window.
    pub events_removed: usize,
}

/// Transactional, secondary-indexed local persistence port.
pub trait LocalStore: Send + Sync {
    /// Insert or replace a ticket. The record and its index entries update
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; on failure the previous record
    /// remains fully intact.
    fn put_ticket(&self, ticket: Ticket) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch a ticket by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn ticket(&self, id: &str) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// All tickets for a user (secondary index).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn tickets_by_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Ticket>>> + Send;

    /// All tickets in a status (secondary index).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn tickets_by_status(
        &self,
        status: TicketStatus,
    ) -> impl std::future::Future<Output = Result<Vec<Ticket>>> + Send;

    /// Insert or replace a verification event. Atomic per record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_event(
        &self,
        event: OfflineVerificationEvent,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch the verification event for a ticket, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn event(
        &self,
        ticket_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<OfflineVerificationEvent>>> + Send;

    /// All events with the given synced flag (secondary index).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn events_by_synced(
        &self,
        synced: bool,
    ) -> impl std::future::Future<Output = Result<Vec<OfflineVerificationEvent>>> + Send;

    /// Flip an event to `synced = true` after server acknowledgment.
    ///
    /// Idempotent: marking an already-synced or absent event is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn mark_event_synced(
        &self,
        ticket_id: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete tickets older than `max_ticket_age` or in terminal COMPLETED
    /// status, and synced events older than `synced_retention`.
    ///
    /// An unsynced event is never deleted, whatever its age.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails; no partial deletion is observable.
    fn cleanup(
        &self,
        max_ticket_age: Duration,
        synced_retention: Duration,
    ) -> impl std::future::Future<Output = Result<CleanupStats>> + Send;
}
