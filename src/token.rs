//! Scan token codec.
//!
//! A scan token is the compact payload embedded in the passenger's QR code:
//! URL-safe unpadded base64 of the JSON object
//! `{t: ticketId, s: sigPrefix, e: expiresAtMs, v: version}`.
//!
//! Tokens are short-lived and re-issuable: a fresh token can be minted
//! repeatedly for the same still-valid ticket, and a token's expiry is
//! always independent of (and shorter than) the ticket's own.
//!
//! Decoding returns `None` on *any* malformed input rather than an error,
//! so callers treat decode failure as one verification-failure branch, not
//! a crash.

use crate::error::{Result, VerifyError};
use crate::signature::SIG_PREFIX_LEN;
use crate::types::now_ms;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Current token format version.
pub const TOKEN_VERSION: u32 = 1;

/// Decoded scan token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanToken {
    /// Ticket id this token references.
    #[serde(rename = "t")]
    pub ticket_id: String,

    /// First [`SIG_PREFIX_LEN`] hex chars of the full ticket signature.
    /// The full signature is never placed in the token.
    #[serde(rename = "s")]
    pub sig_prefix: String,

    /// Absolute expiry, epoch milliseconds.
    #[serde(rename = "e")]
    pub expires_at: i64,

    /// Format version.
    #[serde(rename = "v")]
    pub version: u32,
}

impl ScanToken {
    /// Returns `true` if the token's own expiry has passed.
    #[must_use]
    pub const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }
}

/// Encodes and decodes scan tokens.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec with the given token time-to-live.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Encode a token expiring one TTL from now.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Serialization`] if `full_signature` is shorter
    /// than [`SIG_PREFIX_LEN`] or not valid hex.
    pub fn encode(&self, ticket_id: &str, full_signature: &str) -> Result<String> {
        self.encode_at(ticket_id, full_signature, now_ms() + self.ttl.num_milliseconds())
    }

    /// Encode a token with an explicit absolute expiry.
    ///
    /// Used by the issuer to clamp a token's expiry below the ticket's own.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Serialization`] if `full_signature` is shorter
    /// than [`SIG_PREFIX_LEN`] or not valid hex.
    pub fn encode_at(
        &self,
        ticket_id: &str,
        full_signature: &str,
        expires_at: i64,
    ) -> Result<String> {
        let sig_prefix = full_signature.get(..SIG_PREFIX_LEN).ok_or_else(|| {
            VerifyError::Serialization(format!(
                "signature too short for token fragment: {} < {SIG_PREFIX_LEN}",
                full_signature.len()
            ))
        })?;
        if !is_lower_hex(sig_prefix) {
            return Err(VerifyError::Serialization(
                "signature fragment is not lowercase hex".to_string(),
            ));
        }

        let token = ScanToken {
            ticket_id: ticket_id.to_string(),
            sig_prefix: sig_prefix.to_string(),
            expires_at,
            version: TOKEN_VERSION,
        };
        let json = serde_json::to_vec(&token)
            .map_err(|e| VerifyError::Serialization(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a raw scanned payload.
    ///
    /// Returns `None` for anything that is not a well-formed version-1 token:
    /// bad base64, bad JSON, wrong version, or a signature fragment of the
    /// wrong shape.
    #[must_use]
    pub fn decode(&self, raw: &str) -> Option<ScanToken> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        let token: ScanToken = serde_json::from_slice(&bytes).ok()?;
        if token.version != TOKEN_VERSION {
            return None;
        }
        if token.sig_prefix.len() != SIG_PREFIX_LEN || !is_lower_hex(&token.sig_prefix) {
            return None;
        }
        Some(token)
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SIG: &str = "9f3a1c0b2c7e1d44aabbccddeeff00112233445566778899aabbccddeeff0011";

    fn codec() -> TokenCodec {
        TokenCodec::new(Duration::minutes(5))
    }

    #[test]
    fn encode_decode_round_trip() {
        let codec = codec();
        let issued_at = now_ms();
        let raw = codec.encode("TKT-LX3F9A-0B2C7E1D-9F3A", SIG).unwrap();

        let token = codec.decode(&raw).unwrap();
        assert_eq!(token.ticket_id, "TKT-LX3F9A-0B2C7E1D-9F3A");
        assert_eq!(token.sig_prefix, &SIG[..SIG_PREFIX_LEN]);
        assert_eq!(token.version, TOKEN_VERSION);

        // Expiry is within one TTL of issuance
        let ttl_ms = Duration::minutes(5).num_milliseconds();
        assert!(token.expires_at > issued_at);
        assert!(token.expires_at <= issued_at + ttl_ms + 1_000);
    }

    #[test]
    fn token_is_url_safe() {
        let raw = codec().encode("TKT-LX3F9A-0B2C7E1D-9F3A", SIG).unwrap();
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert!(!raw.contains('='));
    }

    #[test]
    fn decode_rejects_malformed_input() {
        let codec = codec();
        assert_eq!(codec.decode(""), None);
        assert_eq!(codec.decode("not base64 !!!"), None);
        // Valid base64, not JSON
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode(b"hello")), None);
        // Valid JSON, missing fields
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode(b"{\"t\":\"x\"}")), None);
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let codec = codec();
        let json = format!(
            "{{\"t\":\"TKT-A-B-C\",\"s\":\"{}\",\"e\":99999999999999,\"v\":2}}",
            &SIG[..SIG_PREFIX_LEN]
        );
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode(json)), None);
    }

    #[test]
    fn decode_rejects_bad_fragment_shape() {
        let codec = codec();
        // Too short
        let json = "{\"t\":\"TKT-A-B-C\",\"s\":\"9f3a\",\"e\":99999999999999,\"v\":1}";
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode(json)), None);
        // Uppercase hex
        let json =
            "{\"t\":\"TKT-A-B-C\",\"s\":\"9F3A1C0B2C7E1D44\",\"e\":99999999999999,\"v\":1}";
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode(json)), None);
    }

    #[test]
    fn encode_rejects_short_signature() {
        let err = codec().encode("TKT-A-B-C", "9f3a").unwrap_err();
        assert!(matches!(err, VerifyError::Serialization(_)));
    }

    #[test]
    fn explicit_expiry_is_preserved() {
        let codec = codec();
        let raw = codec.encode_at("TKT-A-B-C", SIG, 1_700_000_300_000).unwrap();
        let token = codec.decode(&raw).unwrap();
        assert_eq!(token.expires_at, 1_700_000_300_000);
        assert!(token.is_expired(1_700_000_300_001));
        assert!(!token.is_expired(1_700_000_300_000));
    }

    proptest! {
        #[test]
        fn decode_never_panics_on_garbage(input in ".*") {
            let _ = codec().decode(&input);
        }

        #[test]
        fn round_trip_preserves_ticket_id(ticket_id in "[A-Z0-9-]{1,64}") {
            let codec = codec();
            let raw = codec.encode(&ticket_id, SIG).unwrap();
            let token = codec.decode(&raw).unwrap();
            prop_assert_eq!(token.ticket_id, ticket_id);
        }
    }
}
