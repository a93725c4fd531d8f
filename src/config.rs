//! Verification configuration.
//!
//! Configuration values should be provided by the application, not hardcoded.
//! The signing secret in particular has **no compiled-in default**: it must
//! be injected at startup, either explicitly or from the environment.

use crate::error::{Result, VerifyError};
use chrono::Duration;

/// Environment variable consulted by [`TicketSecret::from_env`].
pub const SECRET_ENV: &str = "FAREGATE_TICKET_SECRET";

/// Shared secret used for ticket signatures and id checksums.
///
/// The secret is redacted from `Debug` output so it never leaks into logs.
#[derive(Clone)]
pub struct TicketSecret(String);

impl TicketSecret {
    /// Create a secret from an explicit value (e.g. from a secret store).
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MissingSecret`] if the value is empty.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(VerifyError::MissingSecret);
        }
        Ok(Self(secret))
    }

    /// Load the secret from the [`SECRET_ENV`] environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MissingSecret`] if the variable is unset or empty.
    pub fn from_env() -> Result<Self> {
        match std::env::var(SECRET_ENV) {
            Ok(value) if !value.is_empty() => Ok(Self(value)),
            _ => Err(VerifyError::MissingSecret),
        }
    }

    /// Raw key material for signing.
    #[must_use]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for TicketSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TicketSecret(****)")
    }
}

/// Configuration for ticket verification.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Shared signing secret.
    pub secret: TicketSecret,

    /// Scan token time-to-live.
    ///
    /// Default: 5 minutes. Always strictly shorter than the ticket's own
    /// expiry; a fresh token can be minted repeatedly for a valid ticket.
    pub token_ttl: Duration,

    /// Window in which a scan from a *different* device is treated as a
    /// possible ticket-sharing attempt.
    ///
    /// Default: 2 minutes.
    pub debounce_window: Duration,

    /// Maximum scans per ticket before the scan cap triggers.
    ///
    /// Default: 3.
    pub max_scans: u32,

    /// Upper bound on the online verification round-trip.
    ///
    /// Default: 6 seconds.
    pub online_timeout: std::time::Duration,

    /// Age past which cached tickets are eligible for cleanup.
    ///
    /// Default: 30 days.
    pub ticket_max_age: Duration,

    /// Retention window for verification events that have been acknowledged
    /// by the server. Unsynced events are never cleaned up.
    ///
    /// Default: 7 days.
    pub synced_event_retention: Duration,
}

impl VerifierConfig {
    /// Create a configuration with the default windows and timeouts.
    #[must_use]
    pub fn new(secret: TicketSecret) -> Self {
        Self {
            secret,
            token_ttl: Duration::minutes(5),
            debounce_window: Duration::minutes(2),
            max_scans: 3,
            online_timeout: std::time::Duration::from_secs(6),
            ticket_max_age: Duration::days(30),
            synced_event_retention: Duration::days(7),
        }
    }

    /// Set the scan token time-to-live.
    #[must_use]
    pub const fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the duplicate-scan debounce window.
    #[must_use]
    pub const fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the per-ticket scan cap.
    #[must_use]
    pub const fn with_max_scans(mut self, max_scans: u32) -> Self {
        self.max_scans = max_scans;
        self
    }

    /// Set the online verification timeout.
    #[must_use]
    pub const fn with_online_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.online_timeout = timeout;
        self
    }

    /// Set the cached-ticket maximum age.
    #[must_use]
    pub const fn with_ticket_max_age(mut self, age: Duration) -> Self {
        self.ticket_max_age = age;
        self
    }

    /// Set the retention window for synced verification events.
    #[must_use]
    pub const fn with_synced_event_retention(mut self, retention: Duration) -> Self {
        self.synced_event_retention = retention;
        self
    }
}
