//! Ledger identifiers.
//!
//! Full identifiers (transactions, assets, outputs) are 32 bytes and short
//! identifiers (addresses) are 20 bytes. Both are rendered as CB58: base58
//! over the payload followed by the last four bytes of its SHA-256. Short
//! identifiers are also accepted in bech32 address form, optionally
//! prefixed with a chain alias (`X-avax1...`).

use std::fmt;
use std::str::FromStr;

use bitcoin::base58;
use bitcoin::hashes::{sha256, Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid base58 encoding")]
    Base58,

    #[error("checksum mismatch")]
    Checksum,

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid bech32 address: {0}")]
    Bech32(String),
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = sha256::Hash::hash(payload);
    let bytes = digest.as_byte_array();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&bytes[bytes.len() - CHECKSUM_LEN..]);
    out
}

fn encode_cb58(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum(payload));
    base58::encode(&data)
}

fn decode_cb58(s: &str) -> Result<Vec<u8>, IdError> {
    let data = base58::decode(s).map_err(|_| IdError::Base58)?;
    if data.len() < CHECKSUM_LEN {
        return Err(IdError::Checksum);
    }
    let (payload, sum) = data.split_at(data.len() - CHECKSUM_LEN);
    if sum != checksum(payload) {
        return Err(IdError::Checksum);
    }
    Ok(payload.to_vec())
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], IdError> {
    bytes.try_into().map_err(|_| IdError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

/// A 32-byte identifier of a transaction, asset or output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; 32]);

impl Id {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Id(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_cb58(s).and_then(|bytes| to_array(&bytes)).map(Id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_cb58(&self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

/// A 20-byte address identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId([u8; 20]);

impl ShortId {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        ShortId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    fn from_bech32(s: &str) -> Result<Self, IdError> {
        // Strip an optional chain alias such as "X-".
        let addr = s.split_once('-').map_or(s, |(_, rest)| rest);
        let (_hrp, data) = bech32::decode(addr).map_err(|e| IdError::Bech32(e.to_string()))?;
        to_array(&data).map(ShortId)
    }
}

impl FromStr for ShortId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match decode_cb58(s) {
            Ok(bytes) => to_array(&bytes).map(ShortId),
            Err(cb58_err) => Self::from_bech32(s).map_err(|_| cb58_err),
        }
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_cb58(&self.0))
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortId({})", self)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Id);
string_serde!(ShortId);

#[cfg(test)]
mod tests {
    use super::*;
    use bech32::{Bech32, Hrp};

    #[test]
    fn id_text_form_round_trips() {
        let id = Id::from_bytes([0xab; 32]);
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let mut bytes = Id::from_bytes([1; 32]).to_string().into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'2' { b'3' } else { b'2' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(tampered.parse::<Id>().is_err());
    }

    #[test]
    fn short_and_full_ids_do_not_overlap() {
        let short = ShortId::from_bytes([9; 20]).to_string();
        let full = Id::from_bytes([9; 32]).to_string();

        assert!(matches!(
            short.parse::<Id>(),
            Err(IdError::Length { expected: 32, actual: 20 })
        ));
        assert!(full.parse::<ShortId>().is_err());
        assert!(short.parse::<ShortId>().is_ok());
    }

    #[test]
    fn short_id_accepts_bech32_with_chain_prefix() {
        let hrp = Hrp::parse("avax").unwrap();
        let addr = bech32::encode::<Bech32>(hrp, &[7u8; 20]).unwrap();

        let plain: ShortId = addr.parse().unwrap();
        let prefixed: ShortId = format!("X-{addr}").parse().unwrap();
        assert_eq!(plain, ShortId::from_bytes([7; 20]));
        assert_eq!(prefixed, plain);
    }

    #[test]
    fn free_text_is_not_an_identifier() {
        assert!("avax".parse::<ShortId>().is_err());
        assert!("avax".parse::<Id>().is_err());
        assert!("1".parse::<Id>().is_err());
    }
}
