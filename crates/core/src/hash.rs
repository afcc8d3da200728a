//! Content checksums and incremental hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Hash algorithm used for revision checksums.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5, the digest GridFS records in its `md5` field.
    #[default]
    Md5,
    /// SHA-256.
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    /// Length of the lowercase hex encoding of a digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    /// Create an incremental hasher.
    pub fn hasher(&self) -> ChecksumHasher {
        match self {
            Self::Md5 => ChecksumHasher::Md5(md5::Context::new()),
            Self::Sha256 => ChecksumHasher::Sha256(Sha256::new()),
        }
    }

    /// Hash a complete buffer.
    pub fn digest(&self, data: &[u8]) -> Checksum {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(crate::Error::UnknownChecksumAlgorithm(other.to_string())),
        }
    }
}

/// A finished checksum: algorithm plus lowercase hex digest.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl Checksum {
    /// Build from a stored hex digest, validating its shape.
    pub fn from_hex(algorithm: ChecksumAlgorithm, hex: &str) -> crate::Result<Self> {
        if hex.len() != algorithm.hex_len() {
            return Err(crate::Error::InvalidChecksum(format!(
                "{algorithm} checksum must be {} hex chars, got {}",
                algorithm.hex_len(),
                hex.len()
            )));
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(crate::Error::InvalidChecksum(format!(
                "{algorithm} checksum is not hex: {hex}"
            )));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest.
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({}:{})", self.algorithm, self.hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Incremental hasher over an upload's byte stream.
pub enum ChecksumHasher {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl ChecksumHasher {
    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(data),
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finalize and return the checksum.
    pub fn finalize(self) -> Checksum {
        match self {
            Self::Md5(ctx) => Checksum {
                algorithm: ChecksumAlgorithm::Md5,
                hex: format!("{:x}", ctx.compute()),
            },
            Self::Sha256(hasher) => Checksum {
                algorithm: ChecksumAlgorithm::Sha256,
                hex: hasher.finalize().iter().map(|b| format!("{b:02x}")).collect(),
            },
        }
    }
}

impl fmt::Debug for ChecksumHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5(_) => f.write_str("ChecksumHasher(md5)"),
            Self::Sha256(_) => f.write_str("ChecksumHasher(sha256)"),
        }
    }
}
