//! Ticket and token issuance for the booking collaborator.
//!
//! [`TokenIssuer`] composes the id generator, signature engine, and token
//! codec: it mints signed tickets and issues fresh scan tokens for them.
//! Tokens are re-issuable (a passenger can refresh the QR code for the
//! same still-valid ticket as often as needed), but a token's expiry is
//! always clamped strictly inside the ticket's own validity window.

use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};
use crate::id::IdGenerator;
use crate::signature::SignatureEngine;
use crate::token::TokenCodec;
use crate::types::{Ticket, TicketStatus, now_ms};

/// Mints tickets and their scan tokens.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    id_gen: IdGenerator,
    signer: SignatureEngine,
    codec: TokenCodec,
    token_ttl_ms: i64,
}

impl TokenIssuer {
    /// Create an issuer from the shared configuration.
    #[must_use]
    pub fn new(config: &VerifierConfig) -> Self {
        Self {
            id_gen: IdGenerator::new(config.secret.clone()),
            signer: SignatureEngine::new(config.secret.clone()),
            codec: TokenCodec::new(config.token_ttl),
            token_ttl_ms: config.token_ttl.num_milliseconds(),
        }
    }

    /// Mint a new PENDING ticket for a booking.
    ///
    /// `valid_for_ms` bounds the ticket's own validity window, measured from
    /// issuance.
    #[must_use]
    pub fn mint_ticket(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
        passenger_count: u32,
        total_price: u64,
        valid_for_ms: i64,
    ) -> Ticket {
        let timestamp = now_ms();
        Ticket {
            id: self.id_gen.generate(),
            user_id: user_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            passenger_count,
            total_price,
            timestamp,
            expires_at: timestamp + valid_for_ms,
            status: TicketStatus::Pending,
        }
    }

    /// Compute the full signature for a ticket.
    #[must_use]
    pub fn sign(&self, ticket: &Ticket) -> String {
        self.signer.sign(ticket)
    }

    /// Issue a fresh scan token for a ticket.
    ///
    /// The token expires after one TTL or at the ticket's own expiry,
    /// whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotIssuable`] if the ticket is expired or in a
    /// status that cannot board.
    pub fn issue_token(&self, ticket: &Ticket) -> Result<String> {
        let now = now_ms();
        if ticket.is_expired(now) {
            return Err(VerifyError::NotIssuable("ticket has expired".to_string()));
        }
        if !ticket.status.is_scannable() {
            return Err(VerifyError::NotIssuable(format!(
                "ticket status {:?} cannot board",
                ticket.status
            )));
        }

        let expires_at = (now + self.token_ttl_ms).min(ticket.expires_at);
        let signature = self.signer.sign(ticket);
        let token = self.codec.encode_at(&ticket.id, &signature, expires_at)?;
        tracing::debug!(ticket_id = %ticket.id, expires_at, "issued scan token");
        Ok(token)
    }
}
