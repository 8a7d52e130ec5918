//! BLAKE3 checksums guarding snapshots and the store image

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte BLAKE3 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum([u8; 32]);

impl Checksum {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Checksum(bytes)
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        Checksum(*blake3::hash(data).as_bytes())
    }

    /// Checksum of a value's bincode encoding
    ///
    /// bincode is deterministic for the plain-data types used here
    /// (vectors, options, strings, integers), so equal values get equal sums.
    pub fn of_value<T: Serialize>(value: &T) -> crate::Result<Self> {
        let data = bincode::serialize(value)?;
        Ok(Checksum::of_bytes(&data))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex digits, for log lines and error messages
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.short())
    }
}
