//! Ticket identifier generation and format validation.
//!
//! Identifiers follow `TKT-{BASE36_TIMESTAMP}-{8-HEX-RANDOM}-{4-CHAR-CHECKSUM}`
//! (all uppercase). The checksum is a **typo/corruption detector**, not a
//! security boundary: it uses a fast non-cryptographic hash (FNV-1a) salted
//! with the shared secret, and must never be relied upon to prove
//! authenticity; that is the signature engine's job.

use crate::config::TicketSecret;
use crate::types::now_ms;
use rand::Rng;

/// Prefix shared by every ticket identifier.
pub const ID_PREFIX: &str = "TKT";

/// Length of the random hex component.
const RANDOM_LEN: usize = 8;

/// Length of the checksum component.
const CHECKSUM_LEN: usize = 4;

/// Mints globally unique, self-checksummed ticket identifiers.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    secret: TicketSecret,
}

impl IdGenerator {
    /// Create a generator salted with the shared secret.
    #[must_use]
    pub const fn new(secret: TicketSecret) -> Self {
        Self { secret }
    }

    /// Mint a fresh ticket identifier.
    #[must_use]
    pub fn generate(&self) -> String {
        self.generate_at(now_ms())
    }

    /// Mint an identifier for an explicit timestamp. Used by tests and by
    /// backfill tooling; `generate` is the normal entry point.
    #[must_use]
    pub fn generate_at(&self, timestamp_ms: i64) -> String {
        #[allow(clippy::cast_sign_loss)]
        let ts36 = to_base36_upper(timestamp_ms.max(0) as u64);
        let random: u32 = rand::thread_rng().r#gen();
        let random = format!("{random:08X}");
        let check = self.checksum(&ts36, &random);
        format!("{ID_PREFIX}-{ts36}-{random}-{check}")
    }

    /// Validate an identifier's structure and checksum.
    ///
    /// Any mutation to the timestamp or random components invalidates the
    /// checksum. A `false` here means the id is corrupted or hand-crafted;
    /// it says nothing about whether the ticket is authentic.
    #[must_use]
    pub fn validate_format(&self, id: &str) -> bool {
        let parts: Vec<&str> = id.split('-').collect();
        if parts.len() != 4 || parts[0] != ID_PREFIX {
            return false;
        }
        let (ts36, random, check) = (parts[1], parts[2], parts[3]);
        if ts36.is_empty() || !ts36.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()) {
            return false;
        }
        if random.len() != RANDOM_LEN
            || !random.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase())
        {
            return false;
        }
        if check.len() != CHECKSUM_LEN {
            return false;
        }
        self.checksum(ts36, random) == check
    }

    /// 4 uppercase hex chars of FNV-1a over `timestamp ‖ random ‖ secret`.
    fn checksum(&self, ts36: &str, random: &str) -> String {
        let mut hash = fnv1a64(ts36.as_bytes());
        hash = fnv1a64_continue(hash, random.as_bytes());
        hash = fnv1a64_continue(hash, self.secret.as_bytes());
        format!("{:04X}", hash & 0xFFFF)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_continue(FNV_OFFSET, bytes)
}

fn fnv1a64_continue(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Encode a number as uppercase base36.
fn to_base36_upper(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    // DIGITS is ASCII, so this cannot produce invalid UTF-8.
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn generator() -> IdGenerator {
        IdGenerator::new(TicketSecret::new("test-secret").unwrap())
    }

    #[test]
    fn generated_ids_validate() {
        let id_gen = generator();
        for _ in 0..100 {
            let id = id_gen.generate();
            assert!(id_gen.validate_format(&id), "id should validate: {id}");
        }
    }

    #[test]
    fn id_shape_matches_contract() {
        let id = generator().generate_at(1_700_000_000_000);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "TKT");
        assert_eq!(parts[1], to_base36_upper(1_700_000_000_000));
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[3].len(), 4);
        assert_eq!(id, id.to_uppercase());
    }

    #[test]
    fn tampered_components_fail_validation() {
        let id_gen = generator();
        let id = id_gen.generate();
        let parts: Vec<&str> = id.split('-').collect();

        // Flip the random component
        let tampered = format!("{}-{}-{}-{}", parts[0], parts[1], "00000000", parts[3]);
        assert!(!id_gen.validate_format(&tampered));

        // Flip the timestamp component
        let tampered = format!("{}-{}-{}-{}", parts[0], "ZZZZZZ", parts[2], parts[3]);
        assert!(!id_gen.validate_format(&tampered));
    }

    #[test]
    fn checksum_depends_on_secret() {
        let a = IdGenerator::new(TicketSecret::new("secret-a").unwrap());
        let b = IdGenerator::new(TicketSecret::new("secret-b").unwrap());
        let id = a.generate();
        assert!(a.validate_format(&id));
        assert!(!b.validate_format(&id));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let id_gen = generator();
        for bad in [
            "",
            "TKT",
            "TKT-",
            "TKT-LX3F9A",
            "TKT-LX3F9A-0B2C7E1D",
            "TKT-LX3F9A-0B2C7E1D-9F3A-EXTRA",
            "TIX-LX3F9A-0B2C7E1D-9F3A",
            "TKT-lx3f9a-0B2C7E1D-9F3A",
            "TKT-LX3F9A-0b2c7e1d-9F3A",
            "TKT-LX3F9A-0B2C7E-9F3A",
            "TKT--0B2C7E1D-9F3A",
        ] {
            assert!(!id_gen.validate_format(bad), "should reject: {bad}");
        }
    }

    #[test]
    fn base36_round_trip_known_values() {
        assert_eq!(to_base36_upper(0), "0");
        assert_eq!(to_base36_upper(35), "Z");
        assert_eq!(to_base36_upper(36), "10");
        assert_eq!(to_base36_upper(1_700_000_000_000), "LOYW3V28");
    }

    proptest! {
        #[test]
        fn validate_never_panics_on_garbage(input in ".*") {
            let _ = generator().validate_format(&input);
        }

        #[test]
        fn generated_ids_always_validate(ts in 0_i64..=4_102_444_800_000) {
            let id_gen = generator();
            let id = id_gen.generate_at(ts);
            prop_assert!(id_gen.validate_format(&id));
        }
    }
}
