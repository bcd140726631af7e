//! Fixed-width ledger primitives.
//!
//! Solana identifies accounts, transactions and blocks with raw byte arrays
//! that are conventionally displayed as base58. ChainFeed keeps the raw bytes
//! for matching (hashing and equality are byte-wise) and only encodes at the
//! edges: serde, `Display`, and filter-spec parsing.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::KeyParseError;

/// A ledger slot number.
pub type Slot = u64;

macro_rules! base58_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Byte width of this value.
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Build from a byte slice, failing unless it is exactly `LEN` bytes.
            pub fn try_from_slice(bytes: &[u8]) -> Result<Self, KeyParseError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| KeyParseError::WrongLength {
                    kind: $kind,
                    expected: $len,
                    got: bytes.len(),
                })?;
                Ok(Self(arr))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(&self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = KeyParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = bs58::decode(s)
                    .into_vec()
                    .map_err(|e| KeyParseError::InvalidBase58 {
                        kind: $kind,
                        reason: e.to_string(),
                    })?;
                Self::try_from_slice(&bytes)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

base58_bytes!(
    /// 32-byte account identifier.
    Pubkey,
    32,
    "pubkey"
);

base58_bytes!(
    /// 64-byte transaction signature. The first signature identifies a transaction.
    Signature,
    64,
    "signature"
);

base58_bytes!(
    /// 32-byte hash (blockhash, entry hash).
    Hash,
    32,
    "hash"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_base58_roundtrip() {
        let key = Pubkey::new([7u8; 32]);
        let text = key.to_string();
        let parsed: Pubkey = text.parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn system_program_parses_as_zero_key() {
        let key: Pubkey = "11111111111111111111111111111111".parse().unwrap();
        assert_eq!(key, Pubkey::default());
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = Pubkey::try_from_slice(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, KeyParseError::WrongLength { expected: 32, got: 3, .. }));
    }

    #[test]
    fn invalid_base58_is_rejected() {
        // '0' and 'O' are not part of the base58 alphabet
        assert!("0OOO".parse::<Pubkey>().is_err());
    }

    #[test]
    fn signature_serializes_as_string() {
        let sig = Signature::new([1u8; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        assert!(json.starts_with('"'));
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }
}
