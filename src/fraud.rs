//! Duplicate and excessive-scan policy.
//!
//! The fraud guard tracks per-ticket scan history and decides, for each
//! scan, whether it is a legitimate verification, a possible ticket-sharing
//! attempt (a *different* device inside the debounce window), or an abuse of
//! the per-ticket scan cap.
//!
//! [`ScanHistory`] is a port: production deployments can back it with a
//! distributed cache, while [`InMemoryScanHistory`] serves tests and
//! single-device verifiers. The in-memory implementation is process-local
//! and single-writer per verifying device; it is **not** safe to share
//! across concurrently-verifying devices without a centralized backing
//! store.

use crate::error::{Result, VerifyError};
use crate::types::{ScanRecord, now_ms};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of recording a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// Legitimate scan; history updated.
    Allow,
    /// A different device scanned this ticket within the debounce window.
    DuplicateScan,
    /// The ticket has reached its scan cap.
    ExcessiveScans,
}

/// Per-ticket scan history port.
///
/// Concurrent scans of the *same* ticket must serialize through
/// `record_scan` so count and debounce checks observe a consistent history;
/// scans of different tickets must not block each other beyond that.
pub trait ScanHistory: Send + Sync {
    /// Record a scan attempt and return the policy decision.
    ///
    /// A rejected scan never mutates the record: counts are monotonically
    /// non-decreasing and reset only by [`ScanHistory::clear`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn record_scan(
        &self,
        ticket_id: &str,
        device_id: &str,
    ) -> impl std::future::Future<Output = Result<ScanDecision>> + Send;

    /// Fetch the current record for a ticket, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(
        &self,
        ticket_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ScanRecord>>> + Send;

    /// Explicitly reset a ticket's history. Called only after trip
    /// completion by an external collaborator.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn clear(&self, ticket_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// In-memory scan history keyed by ticket id.
#[derive(Debug, Clone)]
pub struct InMemoryScanHistory {
    records: Arc<Mutex<HashMap<String, ScanRecord>>>,
    debounce_ms: i64,
    max_scans: u32,
}

impl InMemoryScanHistory {
    /// Create a history with the given debounce window and scan cap.
    #[must_use]
    pub fn new(debounce_window: Duration, max_scans: u32) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            debounce_ms: debounce_window.num_milliseconds(),
            max_scans,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, ScanRecord>>> {
        self.records
            .lock()
            .map_err(|_| VerifyError::Storage("scan history lock poisoned".to_string()))
    }

    /// Policy evaluation at an explicit instant.
    fn record_scan_at(&self, ticket_id: &str, device_id: &str, now: i64) -> Result<ScanDecision> {
        let mut records = self.lock()?;

        let Some(record) = records.get_mut(ticket_id) else {
            records.insert(
                ticket_id.to_string(),
                ScanRecord {
                    ticket_id: ticket_id.to_string(),
                    count: 1,
                    last_scan_at: now,
                    last_device_id: device_id.to_string(),
                },
            );
            return Ok(ScanDecision::Allow);
        };

        let within_debounce = now - record.last_scan_at < self.debounce_ms;
        if within_debounce && record.last_device_id != device_id {
            tracing::warn!(
                ticket_id,
                device_id,
                last_device_id = %record.last_device_id,
                "duplicate scan from a different device inside the debounce window"
            );
            return Ok(ScanDecision::DuplicateScan);
        }

        if record.count >= self.max_scans {
            tracing::warn!(ticket_id, device_id, count = record.count, "scan cap reached");
            return Ok(ScanDecision::ExcessiveScans);
        }

        record.count += 1;
        record.last_scan_at = now;
        record.last_device_id = device_id.to_string();
        Ok(ScanDecision::Allow)
    }
}

impl ScanHistory for InMemoryScanHistory {
    async fn record_scan(&self, ticket_id: &str, device_id: &str) -> Result<ScanDecision> {
        self.record_scan_at(ticket_id, device_id, now_ms())
    }

    async fn get(&self, ticket_id: &str) -> Result<Option<ScanRecord>> {
        Ok(self.lock()?.get(ticket_id).cloned())
    }

    async fn clear(&self, ticket_id: &str) -> Result<()> {
        self.lock()?.remove(ticket_id);
        tracing::debug!(ticket_id, "scan history cleared");
        Ok(())
    }
}
