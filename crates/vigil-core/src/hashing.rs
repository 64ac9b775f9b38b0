//! SHA-256 helpers shared by the audit trail and the memory chain.
//!
//! All digests are 64 lowercase hex characters. The width is part of the persisted format:
//! verification compares stored strings byte for byte.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sha2::{Digest, Sha256};

/// Length of every digest produced here.
pub const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    format!("{:x}", hasher.finalize())
}

/// Digest of optional text content; `None` hashes like the empty string.
pub fn content_hash(content: Option<&str>) -> String {
    sha256_hex(content.unwrap_or("").as_bytes())
}

/// True if `s` has the exact shape of a digest from this module.
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Truncates to the precision used in hash input so a stored timestamp re-serializes identically.
pub fn canonical_instant(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// RFC 3339, UTC, exactly six fractional digits, `Z` suffix (e.g. `2026-10-16T08:30:00.000000Z`).
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Short prefix of a digest for log lines.
pub fn digest_prefix(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash(None), content_hash(Some("")));
        assert!(is_digest(&sha256_hex(b"abc")));
    }

    #[test]
    fn digest_shape_is_strict() {
        assert!(!is_digest("ABC"));
        assert!(!is_digest(&"A".repeat(64)));
        assert!(!is_digest(&"a".repeat(63)));
        assert!(is_digest(&"0".repeat(64)));
    }

    #[test]
    fn canonical_timestamp_has_fixed_precision() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 0).unwrap();
        assert_eq!(canonical_timestamp(&ts), "2026-10-16T08:30:00.000000Z");

        let precise = ts + chrono::Duration::nanoseconds(123_456_789);
        let truncated = canonical_instant(precise);
        assert_eq!(canonical_timestamp(&truncated), "2026-10-16T08:30:00.123456Z");
        let reparsed: DateTime<Utc> = DateTime::parse_from_rfc3339(&canonical_timestamp(&truncated))
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(reparsed, truncated);
    }
}
