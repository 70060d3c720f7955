use serde::de::{self, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// A 32-byte hash stored in wire (little-endian) order. The conventional 64-hex-char
/// "id" printed everywhere outside the wire format is the byte-reversed
/// (big-endian) form; see [`H256::to_hex_id`]/[`ReversedH256`].
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct H256(pub [u8; 32]);

impl H256 {
    pub const ZERO: H256 = H256([0u8; 32]);

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The conventional big-endian hex id (reversed from wire order).
    #[must_use]
    pub fn to_hex_id(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parses a conventional big-endian hex id back into wire-order bytes.
    pub fn from_hex_id(s: &str) -> Result<Self, TypesError> {
        let mut bytes: [u8; 32] = hex::decode(s)
            .map_err(|e| TypesError::InvalidHex(e.to_string()))?
            .try_into()
            .map_err(|_| TypesError::InvalidHex(format!("wrong length: {s}")))?;
        bytes.reverse();
        Ok(H256(bytes))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", self.to_hex_id())
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl TryFrom<Vec<u8>> for H256 {
    type Error = TypesError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let len = value.len();
        Ok(H256(value.try_into().map_err(|_| TypesError::InvalidHex(
            format!("expected 32 bytes, got {len}"),
        ))?))
    }
}

/// Parses the conventional (reversed) hex id, matching `H256::from_hex_id`. Used by
/// tests and fixtures that write ids in the customary big-endian form.
impl FromStr for H256 {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        H256::from_hex_id(s)
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HexVisitor;

        impl<'de> Visitor<'de> for HexVisitor {
            type Value = H256;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 64-character hex string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                H256::from_hex_id(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

impl Serialize for H256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_id())
    }
}

#[must_use]
pub fn double_sha256(input: &[u8]) -> H256 {
    H256(Sha256::digest(Sha256::digest(input)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_id_round_trips() {
        let h = H256([
            1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
            25, 26, 27, 28, 29, 30, 31, 32,
        ]);
        let hex_id = h.to_hex_id();
        assert_eq!(H256::from_hex_id(&hex_id).unwrap(), h);
    }

    #[test]
    fn zero_hash_has_zero_chainwork_seed() {
        assert!(H256::ZERO.is_zero());
    }
}
