//! In-memory local store.
//!
//! Both tables, their secondary indexes, and every mutation live behind a
//! single mutex, so each write commits atomically: a reader never observes
//! a record without its index entries or vice versa.

use crate::error::{Result, VerifyError};
use crate::store::{CleanupStats, LocalStore};
use crate::types::{OfflineVerificationEvent, Ticket, TicketStatus, now_ms};
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    tickets: HashMap<String, Ticket>,
    tickets_by_user: HashMap<String, HashSet<String>>,
    tickets_by_status: HashMap<TicketStatus, HashSet<String>>,
    events: HashMap<String, OfflineVerificationEvent>,
    events_by_synced: HashMap<bool, HashSet<String>>,
}

impl Tables {
    fn unlink_ticket(&mut self, ticket: &Ticket) {
        if let Some(ids) = self.tickets_by_user.get_mut(&ticket.user_id) {
            ids.remove(&ticket.id);
        }
        if let Some(ids) = self.tickets_by_status.get_mut(&ticket.status) {
            ids.remove(&ticket.id);
        }
    }

    fn link_ticket(&mut self, ticket: &Ticket) {
        self.tickets_by_user
            .entry(ticket.user_id.clone())
            .or_default()
            .insert(ticket.id.clone());
        self.tickets_by_status
            .entry(ticket.status)
            .or_default()
            .insert(ticket.id.clone());
    }

    fn unlink_event(&mut self, event: &OfflineVerificationEvent) {
        if let Some(ids) = self.events_by_synced.get_mut(&event.synced) {
            ids.remove(&event.ticket_id);
        }
    }

    fn link_event(&mut self, event: &OfflineVerificationEvent) {
        self.events_by_synced
            .entry(event.synced)
            .or_default()
            .insert(event.ticket_id.clone());
    }
}

/// In-memory implementation of [`LocalStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalStore {
    inner: Arc<Mutex<Tables>>,
}

impl InMemoryLocalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| VerifyError::Storage("local store lock poisoned".to_string()))
    }
}

impl LocalStore for InMemoryLocalStore {
    async fn put_ticket(&self, ticket: Ticket) -> Result<()> {
        let mut tables = self.lock()?;
        if let Some(previous) = tables.tickets.remove(&ticket.id) {
            tables.unlink_ticket(&previous);
        }
        tables.link_ticket(&ticket);
        tracing::debug!(ticket_id = %ticket.id, status = ?ticket.status, "cached ticket");
        tables.tickets.insert(ticket.id.clone(), ticket);
        Ok(())
    }

    async fn ticket(&self, id: &str) -> Result<Option<Ticket>> {
        Ok(self.lock()?.tickets.get(id).cloned())
    }

    async fn tickets_by_user(&self, user_id: &str) -> Result<Vec<Ticket>> {
        let tables = self.lock()?;
        let mut tickets: Vec<Ticket> = tables
            .tickets_by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.tickets.get(id).cloned())
            .collect();
        tickets.sort_by_key(|t| t.timestamp);
        Ok(tickets)
    }

    async fn tickets_by_status(&self, status: TicketStatus) -> Result<Vec<Ticket>> {
        let tables = self.lock()?;
        let mut tickets: Vec<Ticket> = tables
            .tickets_by_status
            .get(&status)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.tickets.get(id).cloned())
            .collect();
        tickets.sort_by_key(|t| t.timestamp);
        Ok(tickets)
    }

    async fn put_event(&self, event: OfflineVerificationEvent) -> Result<()> {
        let mut tables = self.lock()?;
        if let Some(previous) = tables.events.remove(&event.ticket_id) {
            tables.unlink_event(&previous);
        }
        tables.link_event(&event);
        tracing::debug!(
            ticket_id = %event.ticket_id,
            synced = event.synced,
            "queued verification event"
        );
        tables.events.insert(event.ticket_id.clone(), event);
        Ok(())
    }

    async fn event(&self, ticket_id: &str) -> Result<Option<OfflineVerificationEvent>> {
        Ok(self.lock()?.events.get(ticket_id).cloned())
    }

    async fn events_by_synced(&self, synced: bool) -> Result<Vec<OfflineVerificationEvent>> {
        let tables = self.lock()?;
        let mut events: Vec<OfflineVerificationEvent> = tables
            .events_by_synced
            .get(&synced)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.events.get(id).cloned())
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn mark_event_synced(&self, ticket_id: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let Some(mut event) = tables.events.remove(ticket_id) else {
            return Ok(());
        };
        tables.unlink_event(&event);
        event.synced = true;
        tables.link_event(&event);
        tables.events.insert(ticket_id.to_string(), event);
        tracing::debug!(ticket_id, "verification event marked synced");
        Ok(())
    }

    async fn cleanup(
        &self,
        max_ticket_age: Duration,
        synced_retention: Duration,
    ) -> Result<CleanupStats> {
        let now = now_ms();
        let ticket_cutoff = now - max_ticket_age.num_milliseconds();
        let event_cutoff = now - synced_retention.num_milliseconds();

        let mut tables = self.lock()?;

        let expired_tickets: Vec<Ticket> = tables
            .tickets
            .values()
            .filter(|t| t.timestamp < ticket_cutoff || t.status == TicketStatus::Completed)
            .cloned()
            .collect();
        for ticket in &expired_tickets {
            tables.unlink_ticket(ticket);
            tables.tickets.remove(&ticket.id);
        }

        // Unsynced events are never deleted, whatever their age
        let stale_events: Vec<OfflineVerificationEvent> = tables
            .events
            .values()
            .filter(|e| e.synced && e.timestamp < event_cutoff)
            .cloned()
            .collect();
        for event in &stale_events {
            tables.unlink_event(event);
            tables.events.remove(&event.ticket_id);
        }

        let stats = CleanupStats {
            tickets_removed: expired_tickets.len(),
            events_removed: stale_events.len(),
        };
        tracing::info!(
            tickets_removed = stats.tickets_removed,
            events_removed = stats.events_removed,
            "local store cleanup"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    fn ticket(id: &str, user: &str, status: TicketStatus, timestamp: i64) -> Ticket {
        Ticket {
            id: id.to_string(),
            user_id: user.to_string(),
            from: "A".to_string(),
            to: "B".to_string(),
            passenger_count: 1,
            total_price: 45,
            timestamp,
            expires_at: timestamp + 3_600_000,
            status,
        }
    }

    #[tokio::test]
    async fn put_and_get_ticket() {
        let store = InMemoryLocalStore::new();
        store
            .put_ticket(ticket("t1", "u1", TicketStatus::Paid, 1000))
            .await
            .unwrap();

        let fetched = store.ticket("t1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "u1");
        assert!(store.ticket("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn secondary_indexes_follow_updates() {
        let store = InMemoryLocalStore::new();
        store
            .put_ticket(ticket("t1", "u1", TicketStatus::Paid, 1000))
            .await
            .unwrap();
        store
            .put_ticket(ticket("t2", "u1", TicketStatus::Pending, 2000))
            .await
            .unwrap();
        store
            .put_ticket(ticket("t3", "u2", TicketStatus::Paid, 3000))
            .await
            .unwrap();

        assert_eq!(store.tickets_by_user("u1").await.unwrap().len(), 2);
        assert_eq!(store.tickets_by_status(TicketStatus::Paid).await.unwrap().len(), 2);

        // Replacing a ticket moves it between index buckets, atomically
        store
            .put_ticket(ticket("t1", "u1", TicketStatus::Boarded, 1000))
            .await
            .unwrap();
        assert_eq!(store.tickets_by_status(TicketStatus::Paid).await.unwrap().len(), 1);
        let boarded = store.tickets_by_status(TicketStatus::Boarded).await.unwrap();
        assert_eq!(boarded.len(), 1);
        assert_eq!(boarded[0].id, "t1");
        // Still exactly one "t1" under the user index
        assert_eq!(store.tickets_by_user("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn query_results_are_ordered_by_time() {
        let store = InMemoryLocalStore::new();
        store
            .put_ticket(ticket("t2", "u1", TicketStatus::Paid, 2000))
            .await
            .unwrap();
        store
            .put_ticket(ticket("t1", "u1", TicketStatus::Paid, 1000))
            .await
            .unwrap();
        let tickets = store.tickets_by_user("u1").await.unwrap();
        assert_eq!(tickets[0].id, "t1");
        assert_eq!(tickets[1].id, "t2");
    }

    #[tokio::test]
    async fn event_sync_index() {
        let store = InMemoryLocalStore::new();
        store
            .put_event(OfflineVerificationEvent::new(
                "t1".to_string(),
                "d1".to_string(),
                1000,
                Some(GeoPoint { lat: 12.97, lng: 77.59 }),
            ))
            .await
            .unwrap();
        store
            .put_event(OfflineVerificationEvent::new(
                "t2".to_string(),
                "d1".to_string(),
                2000,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(store.events_by_synced(false).await.unwrap().len(), 2);
        assert!(store.events_by_synced(true).await.unwrap().is_empty());

        store.mark_event_synced("t1").await.unwrap();
        assert_eq!(store.events_by_synced(false).await.unwrap().len(), 1);
        let synced = store.events_by_synced(true).await.unwrap();
        assert_eq!(synced.len(), 1);
        assert!(synced[0].synced);

        // Idempotent for synced and absent ids alike
        store.mark_event_synced("t1").await.unwrap();
        store.mark_event_synced("missing").await.unwrap();
        assert_eq!(store.events_by_synced(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cleanup_removes_aged_and_completed_tickets() {
        let store = InMemoryLocalStore::new();
        let now = now_ms();
        store
            .put_ticket(ticket("old", "u1", TicketStatus::Paid, now - Duration::days(40).num_milliseconds()))
            .await
            .unwrap();
        store
            .put_ticket(ticket("done", "u1", TicketStatus::Completed, now))
            .await
            .unwrap();
        store
            .put_ticket(ticket("fresh", "u1", TicketStatus::Paid, now))
            .await
            .unwrap();

        let stats = store.cleanup(Duration::days(30), Duration::days(7)).await.unwrap();
        assert_eq!(stats.tickets_removed, 2);
        assert!(store.ticket("old").await.unwrap().is_none());
        assert!(store.ticket("done").await.unwrap().is_none());
        assert!(store.ticket("fresh").await.unwrap().is_some());
        // Index entries went with the records
        assert_eq!(store.tickets_by_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cleanup_never_deletes_unsynced_events() {
        let store = InMemoryLocalStore::new();
        let ancient = now_ms() - Duration::days(365).num_milliseconds();

        store
            .put_event(OfflineVerificationEvent::new(
                "unsynced".to_string(),
                "d1".to_string(),
                ancient,
                None,
            ))
            .await
            .unwrap();

        let mut synced = OfflineVerificationEvent::new(
            "synced".to_string(),
            "d1".to_string(),
            ancient,
            None,
        );
        synced.synced = true;
        store.put_event(synced).await.unwrap();

        let stats = store.cleanup(Duration::days(30), Duration::days(7)).await.unwrap();
        assert_eq!(stats.events_removed, 1);
        assert!(store.event("unsynced").await.unwrap().is_some());
        assert!(store.event("synced").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_to_distinct_tickets_do_not_interfere() {
        let store = InMemoryLocalStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put_ticket(ticket(&format!("t{i}"), "u1", TicketStatus::Paid, i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.tickets_by_user("u1").await.unwrap().len(), 16);
    }
}
