//! Epoch schedule
//!
//! Ethash parameters change every 30,000 blocks. Light cache and full
//! dataset sizes grow linearly per epoch and are then rounded down so the
//! item count is prime, which avoids short cycles in the access pattern.

use crate::hash::Hash256;
use crate::keccak::keccak256_hash;

/// Blocks per epoch
pub const EPOCH_LENGTH: u64 = 30_000;

/// Light cache size at epoch 0 before prime adjustment (2^24 = 16 MiB)
pub const LIGHT_CACHE_INIT_SIZE: u64 = 1 << 24;
/// Light cache growth per epoch (2^17 = 128 KiB)
pub const LIGHT_CACHE_GROWTH: u64 = 1 << 17;
/// Full dataset size at epoch 0 before prime adjustment (2^30 = 1 GiB)
pub const FULL_DATASET_INIT_SIZE: u64 = 1 << 30;
/// Full dataset growth per epoch (2^23 = 8 MiB)
pub const FULL_DATASET_GROWTH: u64 = 1 << 23;

pub const LIGHT_CACHE_ITEM_SIZE: u64 = 64;
pub const FULL_DATASET_ITEM_SIZE: u64 = 128;

/// RandMemoHash smoothing rounds over the light cache
pub const LIGHT_CACHE_ROUNDS: usize = 3;
/// Light cache parents mixed into each 512-bit dataset half
pub const FULL_DATASET_ITEM_PARENTS: u32 = 256;
/// Dataset accesses per hashimoto evaluation
pub const NUM_DATASET_ACCESSES: u32 = 64;

/// Epoch containing `block_number`
#[inline]
pub fn epoch_number(block_number: u64) -> u64 {
    block_number / EPOCH_LENGTH
}

/// Highest epoch whose light cache growth bound fits 32-bit item indexes
pub const MAX_EPOCH_NUMBER: u64 = 2_097_023;

/// Number of 64-byte items in the light cache
pub fn light_cache_num_items(epoch: u64) -> u64 {
    num_items(LIGHT_CACHE_INIT_SIZE, LIGHT_CACHE_GROWTH, LIGHT_CACHE_ITEM_SIZE, epoch)
}

/// Number of 128-byte items in the full dataset
pub fn full_dataset_num_items(epoch: u64) -> u64 {
    num_items(FULL_DATASET_INIT_SIZE, FULL_DATASET_GROWTH, FULL_DATASET_ITEM_SIZE, epoch)
}

/// Growth saturates, and the count is capped so its byte size fits in `u64`
fn num_items(init_size: u64, growth: u64, item_size: u64, epoch: u64) -> u64 {
    let upper_bound = (init_size / item_size)
        .saturating_add(epoch.saturating_mul(growth / item_size))
        .min(u64::MAX / item_size);
    find_largest_prime(upper_bound)
}

/// Light cache size in bytes
pub fn light_cache_size(epoch: u64) -> u64 {
    light_cache_num_items(epoch) * LIGHT_CACHE_ITEM_SIZE
}

/// Full dataset size in bytes
pub fn full_dataset_size(epoch: u64) -> u64 {
    full_dataset_num_items(epoch) * FULL_DATASET_ITEM_SIZE
}

/// Seed hash for an epoch: zero for epoch 0, then a Keccak-256 chain
pub fn seed_hash(epoch: u64) -> Hash256 {
    let mut seed = Hash256::zero();
    for _ in 0..epoch {
        seed = keccak256_hash(&seed);
    }
    seed
}

/// Recover the epoch number from a seed hash (e.g. received in a stratum job).
///
/// Walks the seed chain from epoch 0 up to `max_epoch` inclusive.
pub fn find_epoch_number(seed: &Hash256, max_epoch: u64) -> Option<u64> {
    let mut s = Hash256::zero();
    for epoch in 0..=max_epoch {
        if s == *seed {
            return Some(epoch);
        }
        s = keccak256_hash(&s);
    }
    None
}

/// Miller-Rabin witnesses that are exact for every `u64`
const PRIME_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

#[inline]
fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin primality test
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in PRIME_BASES {
        if n % p == 0 {
            return n == p;
        }
    }

    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;

    'witness: for a in PRIME_BASES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Largest prime `<= upper_bound` (0 if there is none)
pub fn find_largest_prime(upper_bound: u64) -> u64 {
    let mut n = upper_bound;
    if n < 2 {
        return 0;
    }
    if n == 2 {
        return 2;
    }
    if n % 2 == 0 {
        n -= 1;
    }
    while !is_prime(n) {
        n -= 2;
    }
    n
}

/// Sizes and seed of one epoch, as reported by the CLI and logs
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EpochInfo {
    pub epoch: u64,
    /// `None` past [`MAX_EPOCH_NUMBER`]
    pub seed_hash: Option<Hash256>,
    pub light_cache_items: u64,
    pub light_cache_size: u64,
    pub full_dataset_items: u64,
    pub full_dataset_size: u64,
}

impl EpochInfo {
    pub fn new(epoch: u64) -> Self {
        let light_cache_items = light_cache_num_items(epoch);
        let full_dataset_items = full_dataset_num_items(epoch);
        Self {
            epoch,
            seed_hash: (epoch <= MAX_EPOCH_NUMBER).then(|| seed_hash(epoch)),
            light_cache_items,
            light_cache_size: light_cache_items * LIGHT_CACHE_ITEM_SIZE,
            full_dataset_items,
            full_dataset_size: full_dataset_items * FULL_DATASET_ITEM_SIZE,
        }
    }

    pub fn from_block(block_number: u64) -> Self {
        Self::new(epoch_number(block_number))
    }
}
