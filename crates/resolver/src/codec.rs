//! Forward transform and fingerprint format types
//!
//! A fingerprint is the lowercase hex MD5 digest of two magic bytes
//! followed by the little-endian encoding of a 64-bit account identifier.
//! The transform is pure and total; the reverse direction is only
//! answerable through the reverse index (see `store` and `service`).

use std::fmt;

use crate::error::ResolverError;

/// Fingerprint length in hex characters (128-bit digest).
pub const FINGERPRINT_LEN: usize = 32;

/// Default derivation-scheme tag prepended to the identifier bytes.
pub const DEFAULT_MAGIC: [u8; 2] = [0x42, 0x45];

const SHARD_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Checks that `s` is exactly 32 lowercase hex characters.
///
/// This is the input gate everywhere a fingerprint is accepted from an
/// external caller; case normalization happens before this check.
pub fn is_valid_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN
        && s.bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Stateless forward transform from identifier to fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct GuidCodec {
    magic: [u8; 2],
}

impl GuidCodec {
    pub fn new(magic: [u8; 2]) -> Self {
        Self { magic }
    }

    pub fn magic(&self) -> [u8; 2] {
        self.magic
    }

    /// Computes the fingerprint for an identifier.
    ///
    /// Byte layout fed to the digest: `magic ‖ little-endian-64(id)`.
    pub fn fingerprint(&self, id: u64) -> String {
        use md5::{Digest, Md5};

        let mut buf = [0u8; 10];
        buf[..2].copy_from_slice(&self.magic);
        buf[2..].copy_from_slice(&id.to_le_bytes());
        hex::encode(Md5::digest(buf))
    }
}

impl Default for GuidCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAGIC)
    }
}

/// Routing key for the 16 shard tables: the fingerprint's first hex digit.
///
/// Fingerprints are hash output, so they distribute uniformly over shard
/// keys; per-shard tables bound row scans without a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey(u8);

impl ShardKey {
    pub const COUNT: usize = 16;

    /// All 16 shard keys in hex-digit order.
    pub fn all() -> impl Iterator<Item = ShardKey> {
        SHARD_DIGITS.iter().map(|&b| ShardKey(b))
    }

    pub fn from_hex_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' | 'a'..='f' => Some(ShardKey(c as u8)),
            _ => None,
        }
    }

    pub fn from_index(index: usize) -> Self {
        assert!(index < Self::COUNT, "shard index out of range: {index}");
        ShardKey(SHARD_DIGITS[index])
    }

    pub fn index(&self) -> usize {
        match self.0 {
            b'0'..=b'9' => (self.0 - b'0') as usize,
            _ => (self.0 - b'a' + 10) as usize,
        }
    }

    pub fn as_char(&self) -> char {
        self.0 as char
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Validated, case-normalized fingerprint.
///
/// Construction lowercases the input and rejects anything that is not
/// exactly 32 hex characters, so every `Fingerprint` in the system is
/// known-valid. `parse` (or `FromStr`) is the only way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn parse(raw: &str) -> Result<Self, ResolverError> {
        let normalized = raw.to_ascii_lowercase();
        if !is_valid_fingerprint(&normalized) {
            return Err(ResolverError::invalid_fingerprint(raw));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Shard routing key: the first hex character.
    pub fn shard(&self) -> ShardKey {
        ShardKey(self.0.as_bytes()[0])
    }

    /// Search key: a fixed-length prefix of the characters after the shard
    /// key. This is a prefix filter for the store query, not a final match;
    /// candidates must be re-verified against the full fingerprint.
    pub fn search_key(&self, len: usize) -> &str {
        let end = (1 + len).min(FINGERPRINT_LEN);
        &self.0[1..end]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_matches_fixed_vector() {
        // Digest input for id 1 is exactly
        // [0x42, 0x45, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00].
        let codec = GuidCodec::default();
        assert_eq!(codec.fingerprint(1), "ddc0ded9724e23cfd4b2082074c3ba68");
        assert_eq!(codec.fingerprint(0), "da8dca043e0af0ae31dfe3b5a11181ca");
        assert_eq!(
            codec.fingerprint(76561197960265728),
            "4fc867abf98b934e9e7eeaf15170258c"
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let codec = GuidCodec::default();
        for id in [0u64, 1, 42, u64::MAX] {
            assert_eq!(codec.fingerprint(id), codec.fingerprint(id));
        }
    }

    #[test]
    fn fingerprint_is_always_valid_output() {
        let codec = GuidCodec::default();
        for id in [0u64, 7, 1 << 40, u64::MAX] {
            assert!(is_valid_fingerprint(&codec.fingerprint(id)));
        }
    }

    #[test]
    fn validation_rejects_malformed_input() {
        assert!(is_valid_fingerprint("ddc0ded9724e23cfd4b2082074c3ba68"));
        // uppercase
        assert!(!is_valid_fingerprint("DDC0DED9724E23CFD4B2082074C3BA68"));
        // wrong length
        assert!(!is_valid_fingerprint("ddc0ded9724e23cfd4b2082074c3ba6"));
        assert!(!is_valid_fingerprint("ddc0ded9724e23cfd4b2082074c3ba688"));
        // non-hex characters
        assert!(!is_valid_fingerprint("gdc0ded9724e23cfd4b2082074c3ba68"));
        assert!(!is_valid_fingerprint(""));
    }

    #[test]
    fn parse_normalizes_case() {
        let fp = Fingerprint::parse("DDC0DED9724E23CFD4B2082074C3BA68").unwrap();
        assert_eq!(fp.as_str(), "ddc0ded9724e23cfd4b2082074c3ba68");
    }

    #[test]
    fn parse_rejects_invalid() {
        assert!(Fingerprint::parse("not-a-fingerprint").is_err());
        assert!(Fingerprint::parse("").is_err());
    }

    #[test]
    fn shard_and_search_key() {
        let fp = Fingerprint::parse("ddc0ded9724e23cfd4b2082074c3ba68").unwrap();
        assert_eq!(fp.shard().as_char(), 'd');
        assert_eq!(fp.search_key(10), "dc0ded9724");
        // search key never runs past the fingerprint
        assert_eq!(fp.search_key(64).len(), FINGERPRINT_LEN - 1);
    }

    #[test]
    fn shard_key_round_trips_through_index() {
        for (i, shard) in ShardKey::all().enumerate() {
            assert_eq!(shard.index(), i);
            assert_eq!(ShardKey::from_index(i), shard);
        }
        assert_eq!(ShardKey::all().count(), ShardKey::COUNT);
    }
}
