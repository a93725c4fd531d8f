//! Core domain types.
//!
//! Wire representations match the consumed server endpoints exactly:
//! camelCase field names, UPPERCASE status strings, and epoch-millisecond
//! timestamps.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Ticket lifecycle status.
///
/// The status lattice is `PENDING → PAID → BOARDED → COMPLETED`, with
/// `CANCELLED` reachable only from `PENDING` or `PAID`. `COMPLETED` and
/// `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    /// Created but not yet paid.
    Pending,
    /// Paid and ready to scan.
    Paid,
    /// Passenger has boarded.
    Boarded,
    /// Trip finished. Terminal.
    Completed,
    /// Cancelled before boarding. Terminal.
    Cancelled,
}

impl TicketStatus {
    /// Returns `true` for statuses that admit no further transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if a ticket in this status may be scanned for boarding.
    #[must_use]
    pub const fn is_scannable(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Whether `next` is a valid transition from this status.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Paid, Self::Boarded)
                | (Self::Boarded, Self::Completed)
                | (Self::Pending | Self::Paid, Self::Cancelled)
        )
    }
}

/// A signed, priced unit of travel authorization.
///
/// Tickets are created by the booking collaborator and passed by value into
/// this subsystem; the verification pipeline only ever advances their status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// `TKT-{base36 timestamp}-{8 hex random}-{4 char checksum}`.
    pub id: String,
    /// Owning passenger.
    pub user_id: String,
    /// Origin stop.
    pub from: String,
    /// Destination stop.
    pub to: String,
    /// Number of passengers covered by this ticket.
    pub passenger_count: u32,
    /// Total fare in minor currency units.
    pub total_price: u64,
    /// Issuance time, epoch milliseconds.
    pub timestamp: i64,
    /// Ticket expiry, epoch milliseconds. Independent of token expiry.
    pub expires_at: i64,
    /// Lifecycle status.
    pub status: TicketStatus,
}

impl Ticket {
    /// Returns `true` if the ticket's own validity window has passed.
    #[must_use]
    pub const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }

    /// Returns `true` if the ticket can still be boarded: scannable status
    /// and within its validity window.
    #[must_use]
    pub const fn is_scannable(&self, now_ms: i64) -> bool {
        self.status.is_scannable() && !self.is_expired(now_ms)
    }
}

/// Per-ticket fraud-tracking state.
///
/// `count` is monotonically non-decreasing for the lifetime of the record;
/// it resets only through an explicit post-trip clear, never on a failed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// Ticket this record tracks.
    pub ticket_id: String,
    /// Number of recorded scans.
    pub count: u32,
    /// Most recent scan time, epoch milliseconds.
    pub last_scan_at: i64,
    /// Device that performed the most recent scan.
    pub last_device_id: String,
}

/// Optional geotag supplied by the location feed collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Durable record of a scan performed without server confirmation.
///
/// Created atomically at the moment of a successful offline verification;
/// persists until the server acknowledges it, then flips `synced = true` and
/// is pruned after the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineVerificationEvent {
    /// Ticket that was verified.
    pub ticket_id: String,
    /// Driver who performed the verification.
    pub driver_id: String,
    /// Verification time, epoch milliseconds.
    pub timestamp: i64,
    /// Optional geotag; absence is tolerated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Whether the server has acknowledged this event.
    pub synced: bool,
}

impl OfflineVerificationEvent {
    /// Create an unsynced event for a scan that just succeeded offline.
    #[must_use]
    pub const fn new(
        ticket_id: String,
        driver_id: String,
        timestamp: i64,
        location: Option<GeoPoint>,
    ) -> Self {
        Self {
            ticket_id,
            driver_id,
            timestamp,
            location,
            synced: false,
        }
    }

    /// Idempotency key for server submission.
    ///
    /// Stable across retries so a resubmitted event is never double-counted
    /// as a second boarding.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.ticket_id, self.timestamp)
    }
}
