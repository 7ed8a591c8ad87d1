//! Fixed-size digest types
//!
//! All digests are raw byte arrays. Ethash reads them as arrays of
//! little-endian 32-bit words during mixing; only the boundary check treats a
//! digest as a big-endian integer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{EthashError, Result};

/// 256-bit digest (header hash, mix digest, final digest, seed, boundary)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C, align(32))]
pub struct Hash256 {
    pub data: [u8; 32],
}

/// 512-bit digest (light cache item, half of a dataset item)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C, align(64))]
pub struct Hash512 {
    pub data: [u8; 64],
}

/// 1024-bit full dataset item, stored as two 512-bit halves
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C, align(64))]
pub struct Hash1024 {
    pub hashes: [Hash512; 2],
}

// ============================================================================
// Hash256
// ============================================================================

impl Hash256 {
    pub const LEN: usize = 32;

    #[inline(always)]
    pub const fn zero() -> Self {
        Self { data: [0u8; 32] }
    }

    #[inline(always)]
    pub const fn from_bytes(data: [u8; 32]) -> Self {
        Self { data }
    }

    /// Copy from a slice, rejecting anything that is not exactly 32 bytes
    pub fn from_slice(field: &'static str, bytes: &[u8]) -> Result<Self> {
        let data: [u8; 32] = bytes.try_into().map_err(|_| EthashError::InvalidLength {
            field,
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { data })
    }

    pub fn from_hex(field: &'static str, hex_str: &str) -> Result<Self> {
        let bytes = decode_hex(field, hex_str)?;
        Self::from_slice(field, &bytes)
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub fn word(&self, i: usize) -> u32 {
        read_word(&self.data, i)
    }

    #[inline(always)]
    pub fn set_word(&mut self, i: usize, value: u32) {
        write_word(&mut self.data, i, value);
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.data)
    }
}

// ============================================================================
// Hash512
// ============================================================================

impl Hash512 {
    pub const LEN: usize = 64;
    pub const WORDS: usize = 16;

    #[inline(always)]
    pub const fn zero() -> Self {
        Self { data: [0u8; 64] }
    }

    #[inline(always)]
    pub const fn from_bytes(data: [u8; 64]) -> Self {
        Self { data }
    }

    pub fn from_slice(field: &'static str, bytes: &[u8]) -> Result<Self> {
        let data: [u8; 64] = bytes.try_into().map_err(|_| EthashError::InvalidLength {
            field,
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { data })
    }

    pub fn from_hex(field: &'static str, hex_str: &str) -> Result<Self> {
        let bytes = decode_hex(field, hex_str)?;
        Self::from_slice(field, &bytes)
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub fn word(&self, i: usize) -> u32 {
        read_word(&self.data, i)
    }

    #[inline(always)]
    pub fn set_word(&mut self, i: usize, value: u32) {
        write_word(&mut self.data, i, value);
    }

    /// Byte-wise XOR
    #[inline]
    pub fn xor(&self, other: &Hash512) -> Hash512 {
        let mut out = Hash512::zero();
        for (o, (a, b)) in out.data.iter_mut().zip(self.data.iter().zip(other.data.iter())) {
            *o = a ^ b;
        }
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.data)
    }
}

impl Default for Hash512 {
    fn default() -> Self {
        Self::zero()
    }
}

// ============================================================================
// Hash1024
// ============================================================================

impl Hash1024 {
    pub const LEN: usize = 128;
    pub const WORDS: usize = 32;

    #[inline(always)]
    pub const fn zero() -> Self {
        Self { hashes: [Hash512::zero(), Hash512::zero()] }
    }

    #[inline(always)]
    pub const fn from_halves(first: Hash512, second: Hash512) -> Self {
        Self { hashes: [first, second] }
    }

    /// Word `i` of the 32-word little-endian view
    #[inline(always)]
    pub fn word(&self, i: usize) -> u32 {
        self.hashes[i / Hash512::WORDS].word(i % Hash512::WORDS)
    }

    #[inline(always)]
    pub fn set_word(&mut self, i: usize, value: u32) {
        self.hashes[i / Hash512::WORDS].set_word(i % Hash512::WORDS, value);
    }

    pub fn to_bytes(&self) -> [u8; 128] {
        let mut out = [0u8; 128];
        out[..64].copy_from_slice(&self.hashes[0].data);
        out[64..].copy_from_slice(&self.hashes[1].data);
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

// ============================================================================
// Word access, hex, serde
// ============================================================================

#[inline(always)]
fn read_word(bytes: &[u8], i: usize) -> u32 {
    let o = i * 4;
    u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
}

#[inline(always)]
fn write_word(bytes: &mut [u8], i: usize, value: u32) {
    bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

fn decode_hex(field: &'static str, hex_str: &str) -> Result<Vec<u8>> {
    let trimmed = hex_str.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(trimmed).map_err(|e| EthashError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

macro_rules! impl_hex_traits {
    ($ty:ty, $name:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($name, "({})"), self.to_hex())
            }
        }

        impl FromStr for $ty {
            type Err = EthashError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex($name, s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex($name, &s).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_hex_traits!(Hash256, "Hash256");
impl_hex_traits!(Hash512, "Hash512");

impl fmt::Debug for Hash1024 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash1024({})", self.to_hex())
    }
}
