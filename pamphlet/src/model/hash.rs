//! Content hashes for tile blobs.
//!
//! A tile is addressed by the SHA-256 digest of its encoded bytes, rendered
//! as 64 lowercase hex characters. The hash alone locates the blob in the
//! durable store; grid position and metadata version never take part in it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::error::ModelError;

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// A validated 64-character lowercase hex content digest.
///
/// # Example
///
/// ```
/// use pamphlet::model::ContentHash;
///
/// let a = ContentHash::of(b"tile bytes");
/// let b = ContentHash::of(b"tile bytes");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the content hash of the given bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(format!("{:x}", digest))
    }

    /// Parse and validate a hex digest.
    ///
    /// Uppercase input is rejected rather than normalized, so a hash string
    /// always has exactly one spelling in cache keys and URLs.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        if value.len() != HASH_HEX_LEN {
            return Err(ModelError::InvalidHash {
                value: value.to_string(),
                reason: format!("expected {} characters, got {}", HASH_HEX_LEN, value.len()),
            });
        }

        if let Some(c) = value
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(ModelError::InvalidHash {
                value: value.to_string(),
                reason: format!("unexpected character '{}'", c),
            });
        }

        Ok(Self(value.to_string()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log output.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl FromStr for ContentHash {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
