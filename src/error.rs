//! Error types for ticket issuance and verification.
//!
//! Two taxonomies live here:
//!
//! - [`VerifyError`]: infrastructure failures (storage, serialization,
//!   network). These are the only errors that cross the subsystem boundary
//!   as `Err`.
//! - [`RejectReason`]: structured scan rejections. A rejected scan is a
//!   *successful* verification attempt with a negative outcome; it is
//!   returned inside [`crate::VerifyOutcome`], never thrown.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for verification operations.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Infrastructure error taxonomy for the verification subsystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Signing secret is not configured.
    ///
    /// There is deliberately no compiled-in fallback secret; the secret must
    /// be injected at startup (environment or secret store).
    #[error("Signing secret is not configured")]
    MissingSecret,

    /// Local store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network-level failure (timeout, unreachable host).
    ///
    /// Internal only: the coordinator recovers from this by falling back to
    /// offline verification. It is never surfaced to the scan UI.
    #[error("Network error: {0}")]
    Network(String),

    /// Ticket is not eligible for a fresh scan token.
    #[error("Ticket is not eligible for a token: {0}")]
    NotIssuable(String),
}

impl VerifyError {
    /// Returns `true` if this error should trigger the offline fallback.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Structured reason for a rejected scan.
///
/// The `Display` implementation carries the human-actionable message shown
/// to the verifying driver; [`RejectReason::code`] carries the stable wire
/// code used by the server protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Token could not be decoded.
    #[error("QR code is malformed or unreadable")]
    InvalidQrFormat,

    /// Token expiry (`e`) has passed, independently of the ticket's own expiry.
    #[error("QR code has expired, ask the passenger to refresh their ticket")]
    QrExpired,

    /// Embedded ticket id failed checksum validation.
    #[error("Ticket id is invalid or corrupted")]
    InvalidTicketId,

    /// Ticket is absent from the local cache; not a fraud signal.
    #[error("Ticket is not cached on this device, connectivity is required")]
    TicketNotCached,

    /// Ticket has already been used for travel.
    #[error("Ticket already used")]
    AlreadyUsed,

    /// Ticket was cancelled before boarding.
    #[error("Ticket has been cancelled")]
    Cancelled,

    /// Locally recomputed signature prefix does not match the token.
    #[error("Ticket signature does not match")]
    SignatureMismatch,

    /// A different device scanned this ticket within the debounce window.
    #[error("Duplicate scan detected")]
    DuplicateScan,

    /// The ticket has hit the per-ticket scan cap.
    #[error("Ticket scanned too many times")]
    ExcessiveScans,

    /// Authoritative rejection from the server with no local equivalent.
    #[error("Rejected by server: {0}")]
    Server(String),
}

impl RejectReason {
    /// Stable wire code for this rejection.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidQrFormat => "INVALID_QR_FORMAT",
            Self::QrExpired => "QR_EXPIRED",
            Self::InvalidTicketId => "INVALID_TICKET_ID",
            Self::TicketNotCached => "TICKET_NOT_CACHED",
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Cancelled => "CANCELLED",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::DuplicateScan => "DUPLICATE_SCAN",
            Self::ExcessiveScans => "EXCESSIVE_SCANS",
            Self::Server(_) => "SERVER_REJECTED",
        }
    }

    /// Map a server rejection onto the local taxonomy.
    ///
    /// The `fraudReason` field takes precedence over `error`; unrecognized
    /// codes are preserved verbatim as [`RejectReason::Server`] so an online
    /// rejection is always returned as-is.
    #[must_use]
    pub fn from_wire(error: Option<&str>, fraud_reason: Option<&str>) -> Self {
        let code = fraud_reason.or(error).unwrap_or("rejected");
        match code {
            "INVALID_QR_FORMAT" => Self::InvalidQrFormat,
            "QR_EXPIRED" => Self::QrExpired,
            "INVALID_TICKET_ID" => Self::InvalidTicketId,
            "TICKET_NOT_CACHED" => Self::TicketNotCached,
            "ALREADY_USED" => Self::AlreadyUsed,
            "CANCELLED" => Self::Cancelled,
            "SIGNATURE_MISMATCH" => Self::SignatureMismatch,
            "DUPLICATE_SCAN" => Self::DuplicateScan,
            "EXCESSIVE_SCANS" => Self::ExcessiveScans,
            other => Self::Server(other.to_string()),
        }
    }

    /// Returns `true` if this rejection indicates possible fraud rather than
    /// an operational failure.
    ///
    /// # Examples
    ///
    /// ```
    /// # use faregate::RejectReason;
    /// assert!(RejectReason::DuplicateScan.is_fraud_signal());
    /// assert!(!RejectReason::TicketNotCached.is_fraud_signal());
    /// ```
    #[must_use]
    pub const fn is_fraud_signal(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch | Self::DuplicateScan | Self::ExcessiveScans
        )
    }

    /// Returns `true` if retrying once connectivity is restored could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TicketNotCached | Self::QrExpired)
    }
}
