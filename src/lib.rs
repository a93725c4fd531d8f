//! # Faregate
//!
//! Secure ticket issuance and hybrid verification for transit scanning.
//!
//! This crate mints tamper-evident ticket identifiers, signs tickets with
//! HMAC-SHA-256, encodes them into short-lived scannable tokens, and verifies
//! scans either against a live server or, when the network is unavailable,
//! against a local cache, while resisting replay and duplicate-scan fraud.
//!
//! ## Components
//!
//! - [`IdGenerator`]: globally unique, self-checksummed ticket ids
//! - [`SignatureEngine`]: keyed HMAC over canonical ticket fields
//! - [`TokenCodec`]: compact, versioned, time-boxed scan tokens
//! - [`ScanHistory`] / [`InMemoryScanHistory`]: duplicate/excessive-scan policy
//! - [`LocalStore`] / [`InMemoryLocalStore`]: transactional, secondary-indexed
//!   offline cache for tickets and pending verification events
//! - [`VerificationCoordinator`]: online-first, offline-fallback verification
//! - [`SyncManager`]: idempotent replay of queued offline verifications
//!
//! ## Example: offline-capable verification
//!
//! ```rust,ignore
//! use faregate::*;
//!
//! let config = VerifierConfig::new(TicketSecret::from_env()?);
//! let coordinator = VerificationCoordinator::new(
//!     config,
//!     HttpVerifyApi::new("https://api.example.com".to_string()),
//!     InMemoryLocalStore::new(),
//! );
//!
//! let outcome = coordinator.verify(&qr_payload, "driver-1", "device-1", None).await?;
//! match outcome {
//!     VerifyOutcome::Accepted { ticket_id, mode } => println!("boarded {ticket_id} ({mode:?})"),
//!     VerifyOutcome::Rejected { reason, .. } => println!("rejected: {reason}"),
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fraud;
pub mod id;
pub mod issuer;
pub mod server;
pub mod signature;
pub mod store;
pub mod sync;
pub mod token;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use config::{TicketSecret, VerifierConfig};
pub use coordinator::{VerificationCoordinator, VerifyMode, VerifyOutcome};
pub use error::{RejectReason, Result, VerifyError};
pub use fraud::{InMemoryScanHistory, ScanDecision, ScanHistory};
pub use id::IdGenerator;
pub use issuer::TokenIssuer;
pub use server::{HttpVerifyApi, VerifyApi, VerifyRequest, VerifyResponse};
pub use signature::{SIG_PREFIX_LEN, SignatureEngine};
pub use store::{CleanupStats, InMemoryLocalStore, LocalStore};
pub use sync::{SyncManager, SyncReport};
pub use token::{ScanToken, TOKEN_VERSION, TokenCodec};
pub use types::{GeoPoint, OfflineVerificationEvent, ScanRecord, Ticket, TicketStatus};
