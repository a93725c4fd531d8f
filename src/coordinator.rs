//! Hybrid verification state machine.
//!
//! ```text
//! START → ONLINE_ATTEMPT → {ACCEPTED | REJECTED | network failure}
//!                                             │
//!                                             ▼
//!                          OFFLINE_ATTEMPT → {ACCEPTED | REJECTED}
//! ```
//!
//! The online attempt is bounded by a timeout and cancellable only by that
//! timeout. An online rejection is authoritative and returned as-is; there
//! is no offline second opinion for a ticket the server has refused. Only a
//! network-level failure (timeout, unreachable) falls back to the offline
//! pipeline, which runs entirely against local state.
//!
//! Every failure is returned as a structured [`VerifyOutcome::Rejected`];
//! nothing in this module raises a scan rejection as an error across the
//! subsystem boundary.

use crate::config::VerifierConfig;
use crate::error::{RejectReason, Result, VerifyError};
use crate::fraud::{InMemoryScanHistory, ScanDecision, ScanHistory};
use crate::id::IdGenerator;
use crate::server::{VerifyApi, VerifyRequest};
use crate::signature::SignatureEngine;
use crate::store::{CleanupStats, LocalStore};
use crate::token::TokenCodec;
use crate::types::{GeoPoint, OfflineVerificationEvent, TicketStatus, now_ms};

/// Which path produced a verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// The authoritative server answered in time.
    Online,
    /// Verified against the local cache after a network failure.
    Offline,
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Scan accepted; the passenger may board.
    Accepted {
        /// Ticket that was verified.
        ticket_id: String,
        /// Path that produced the acceptance.
        mode: VerifyMode,
    },
    /// Scan rejected with a human-actionable reason.
    Rejected {
        /// Why the scan was refused.
        reason: RejectReason,
        /// Path that produced the rejection.
        mode: VerifyMode,
    },
}

impl VerifyOutcome {
    /// Returns `true` for an accepted scan.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Orchestrates online-first, offline-fallback scan verification.
#[derive(Debug, Clone)]
pub struct VerificationCoordinator<A, L, H>
where
    A: VerifyApi,
    L: LocalStore,
    H: ScanHistory,
{
    config: VerifierConfig,
    api: A,
    store: L,
    history: H,
    id_gen: IdGenerator,
    signer: SignatureEngine,
    codec: TokenCodec,
}

impl<A, L> VerificationCoordinator<A, L, InMemoryScanHistory>
where
    A: VerifyApi,
    L: LocalStore,
{
    /// Create a coordinator whose scan history enforces the configured
    /// debounce window and scan cap.
    #[must_use]
    pub fn new(config: VerifierConfig, api: A, store: L) -> Self {
        let history = InMemoryScanHistory::new(config.debounce_window, config.max_scans);
        Self::with_history(config, api, store, history)
    }
}

impl<A, L, H> VerificationCoordinator<A, L, H>
where
    A: VerifyApi,
    L: LocalStore,
    H: ScanHistory,
{
    /// Create a coordinator over a caller-provided scan history backend
    /// (a distributed one, for fleets of scanners sharing fraud state).
    #[must_use]
    pub fn with_history(config: VerifierConfig, api: A, store: L, history: H) -> Self {
        let id_gen = IdGenerator::new(config.secret.clone());
        let signer = SignatureEngine::new(config.secret.clone());
        let codec = TokenCodec::new(config.token_ttl);
        Self {
            config,
            api,
            store,
            history,
            id_gen,
            signer,
            codec,
        }
    }

    /// Verify a scanned token.
    ///
    /// Tries the server first, bounded by the configured timeout; falls back
    /// to the offline pipeline on network failure. The optional `location`
    /// geotags an offline verification event when the location feed supplies
    /// one.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures (local storage,
    /// malformed server acceptance). Scan rejections are values, not errors.
    pub async fn verify(
        &self,
        raw_token: &str,
        driver_id: &str,
        device_id: &str,
        location: Option<GeoPoint>,
    ) -> Result<VerifyOutcome> {
        let request = VerifyRequest {
            qr_payload: raw_token.to_string(),
            device_id: device_id.to_string(),
        };

        match tokio::time::timeout(self.config.online_timeout, self.api.verify_scan(&request))
            .await
        {
            Ok(Ok(response)) if response.valid => {
                let ticket_id = match (&response.ticket, self.codec.decode(raw_token)) {
                    (Some(ticket), _) => ticket.id.clone(),
                    (None, Some(token)) => token.ticket_id,
                    (None, None) => {
                        return Err(VerifyError::Serialization(
                            "server accepted a scan but no ticket id is recoverable".to_string(),
                        ));
                    }
                };
                // Refresh the cache so an offline rescan of this ticket
                // observes ALREADY_USED instead of a stale PAID status.
                if let Some(mut ticket) = response.ticket {
                    ticket.status = TicketStatus::Boarded;
                    self.store.put_ticket(ticket).await?;
                }
                tracing::info!(%ticket_id, device_id, "scan accepted online");
                Ok(VerifyOutcome::Accepted {
                    ticket_id,
                    mode: VerifyMode::Online,
                })
            }
            Ok(Ok(response)) => {
                let reason = RejectReason::from_wire(
                    response.error.as_deref(),
                    response.fraud_reason.as_deref(),
                );
                tracing::info!(device_id, %reason, "scan rejected online (authoritative)");
                Ok(VerifyOutcome::Rejected {
                    reason,
                    mode: VerifyMode::Online,
                })
            }
            Ok(Err(e)) if e.is_network() => {
                tracing::warn!(error = %e, "online verification unreachable, trying offline");
                self.verify_offline(raw_token, driver_id, device_id, location).await
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                tracing::warn!(
                    timeout = ?self.config.online_timeout,
                    "online verification timed out, trying offline"
                );
                self.verify_offline(raw_token, driver_id, device_id, location).await
            }
        }
    }

    /// The offline pipeline, executed entirely against local state.
    async fn verify_offline(
        &self,
        raw_token: &str,
        driver_id: &str,
        device_id: &str,
        location: Option<GeoPoint>,
    ) -> Result<VerifyOutcome> {
        let rejected = |reason: RejectReason| {
            tracing::info!(%reason, device_id, "scan rejected offline");
            Ok(VerifyOutcome::Rejected {
                reason,
                mode: VerifyMode::Offline,
            })
        };

        let Some(token) = self.codec.decode(raw_token) else {
            return rejected(RejectReason::InvalidQrFormat);
        };

        let now = now_ms();
        if token.is_expired(now) {
            return rejected(RejectReason::QrExpired);
        }

        if !self.id_gen.validate_format(&token.ticket_id) {
            return rejected(RejectReason::InvalidTicketId);
        }

        // A cache miss means we simply cannot verify without connectivity;
        // it is not a fraud signal.
        let Some(mut ticket) = self.store.ticket(&token.ticket_id).await? else {
            return rejected(RejectReason::TicketNotCached);
        };

        match ticket.status {
            TicketStatus::Completed => return rejected(RejectReason::AlreadyUsed),
            TicketStatus::Cancelled => return rejected(RejectReason::Cancelled),
            _ => {}
        }

        if !self.signer.verify_prefix(&ticket, &token.sig_prefix) {
            return rejected(RejectReason::SignatureMismatch);
        }

        match self.history.record_scan(&token.ticket_id, device_id).await? {
            ScanDecision::DuplicateScan => return rejected(RejectReason::DuplicateScan),
            ScanDecision::ExcessiveScans => return rejected(RejectReason::ExcessiveScans),
            ScanDecision::Allow => {}
        }

        // The fraud guard has had its say; a ticket that is already BOARDED
        // cannot board again.
        if ticket.status == TicketStatus::Boarded {
            return rejected(RejectReason::AlreadyUsed);
        }

        let event = OfflineVerificationEvent::new(
            token.ticket_id.clone(),
            driver_id.to_string(),
            now,
            location,
        );
        self.store.put_event(event).await?;

        ticket.status = TicketStatus::Boarded;
        self.store.put_ticket(ticket).await?;

        tracing::info!(
            ticket_id = %token.ticket_id,
            driver_id,
            device_id,
            "scan accepted offline, verification event queued"
        );
        Ok(VerifyOutcome::Accepted {
            ticket_id: token.ticket_id,
            mode: VerifyMode::Offline,
        })
    }

    /// Reset a ticket's scan history after trip completion.
    ///
    /// Called by the trip-lifecycle collaborator, never by the scan path.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan history backend fails.
    pub async fn clear_scan_history(&self, ticket_id: &str) -> Result<()> {
        self.history.clear(ticket_id).await
    }

    /// Prune aged cached tickets and acknowledged verification events,
    /// using the configured retention windows.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub async fn cleanup(&self) -> Result<CleanupStats> {
        self.store
            .cleanup(self.config.ticket_max_age, self.config.synced_event_retention)
            .await
    }
}
