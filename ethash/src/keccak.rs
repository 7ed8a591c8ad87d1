//! Keccak sponge primitives
//!
//! Ethash uses the original Keccak submission padding (domain byte `0x01`),
//! not the NIST SHA-3 padding (`0x06`). `tiny_keccak::Keccak` implements the
//! former, so `keccak256(b"")` is `c5d246...a470`, not SHA3-256's `a7ffc6...`.

use tiny_keccak::{Hasher, Keccak};

use crate::hash::{Hash1024, Hash256, Hash512};

/// Keccak-256 of arbitrary bytes
#[inline]
pub fn keccak256(input: &[u8]) -> Hash256 {
    let mut hasher = Keccak::v256();
    hasher.update(input);
    let mut out = Hash256::zero();
    hasher.finalize(&mut out.data);
    out
}

/// Keccak-512 of arbitrary bytes
#[inline]
pub fn keccak512(input: &[u8]) -> Hash512 {
    let mut hasher = Keccak::v512();
    hasher.update(input);
    let mut out = Hash512::zero();
    hasher.finalize(&mut out.data);
    out
}

/// Keccak-256 over the concatenation of several byte slices
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = Hash256::zero();
    hasher.finalize(&mut out.data);
    out
}

/// Keccak-512 over the concatenation of several byte slices
pub fn keccak512_concat(parts: &[&[u8]]) -> Hash512 {
    let mut hasher = Keccak::v512();
    for part in parts {
        hasher.update(part);
    }
    let mut out = Hash512::zero();
    hasher.finalize(&mut out.data);
    out
}

#[inline]
pub fn keccak256_hash(input: &Hash256) -> Hash256 {
    keccak256(&input.data)
}

#[inline]
pub fn keccak512_hash(input: &Hash512) -> Hash512 {
    keccak512(&input.data)
}

/// Hash both 512-bit halves independently
#[inline]
pub fn double_keccak512(input: &Hash1024) -> Hash1024 {
    Hash1024::from_halves(
        keccak512_hash(&input.hashes[0]),
        keccak512_hash(&input.hashes[1]),
    )
}
