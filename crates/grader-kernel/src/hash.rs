//! Keyed answer digests
//!
//! Locked outputs are stored as HMAC-SHA256 of the normalized answer text
//! under the store's [`HashKey`]. Verification compares in constant time.

use crate::error::{GraderError, GraderResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// Secret key of a locked store
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HashKey(String);

impl HashKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Fresh random key of 32 hex characters
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn mac(&self) -> GraderResult<HmacSha256> {
        HmacSha256::new_from_slice(self.0.as_bytes())
            .map_err(|e| GraderError::Digest(format!("invalid hash key: {e}")))
    }

    /// Digest of `answer` after normalization
    ///
    /// # Errors
    /// Returns [`GraderError::Digest`] if the key cannot initialize the MAC
    pub fn digest(&self, answer: &str) -> GraderResult<AnswerDigest> {
        let mut mac = self.mac()?;
        mac.update(normalize_answer(answer).as_bytes());
        AnswerDigest::from_slice(&mac.finalize().into_bytes())
    }

    /// Check `answer` against a stored digest in constant time
    ///
    /// # Errors
    /// Returns [`GraderError::Digest`] if the key cannot initialize the MAC
    pub fn verify(&self, answer: &str, expected: &AnswerDigest) -> GraderResult<bool> {
        let mut mac = self.mac()?;
        mac.update(normalize_answer(answer).as_bytes());
        Ok(mac.verify_slice(expected.as_bytes()).is_ok())
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("HashKey(<redacted>)")
    }
}

/// Strip line terminators and surrounding whitespace from a typed answer
#[must_use]
pub fn normalize_answer(answer: &str) -> &str {
    answer.trim()
}

/// A 32-byte HMAC-SHA256 digest, hex encoded in stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerDigest([u8; 32]);

impl AnswerDigest {
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// # Errors
    /// Returns [`GraderError::Digest`] unless the slice is exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> GraderResult<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            GraderError::Digest(format!("expected 32 digest bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl Display for AnswerDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for AnswerDigest {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| GraderError::Digest(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for AnswerDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for AnswerDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn verify_accepts_only_the_digested_answer() {
        let key = HashKey::new("b8e9c1f0a3d24f67");
        let digest = key.digest("4").unwrap();
        assert!(key.verify("4", &digest).unwrap());
        assert!(key.verify("  4\n", &digest).unwrap());
        assert!(!key.verify("5", &digest).unwrap());
        assert!(!HashKey::new("other").verify("4", &digest).unwrap());
    }

    #[test]
    fn generated_keys_are_32_hex_chars() {
        let key = HashKey::generate();
        assert_eq!(key.as_str().len(), 32);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, HashKey::generate());
    }

    #[test]
    fn debug_hides_the_key() {
        assert_eq!(format!("{:?}", HashKey::new("secret")), "HashKey(<redacted>)");
    }

    #[test]
    fn digest_hex_parse() {
        let digest = HashKey::new("k").digest("[1, 2]").unwrap();
        let text = digest.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<AnswerDigest>().unwrap(), digest);
        assert!("abc".parse::<AnswerDigest>().is_err());
        assert!("zz".repeat(32).parse::<AnswerDigest>().is_err());
    }

    #[test]
    fn digest_serializes_as_hex_string() {
        let digest = AnswerDigest::new([0xab; 32]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }

    proptest! {
        #[test]
        fn surrounding_whitespace_never_changes_the_digest(
            answer in "[a-z0-9\\[\\], ]{0,20}",
            pad in "[ \t\r\n]{0,4}",
        ) {
            let key = HashKey::new("prop-key");
            let padded = format!("{pad}{answer}{pad}");
            prop_assert_eq!(key.digest(&padded).unwrap(), key.digest(&answer).unwrap());
        }
    }
}
