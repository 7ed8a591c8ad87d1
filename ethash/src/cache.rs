//! Light cache builder
//!
//! The light cache is a Keccak-512 hash chain seeded by the epoch seed,
//! smoothed by `LIGHT_CACHE_ROUNDS` passes of Sergio Lerner's RandMemoHash.
//! It is immutable once built and byte-identical for a given epoch.

use std::time::Instant;

use crate::epoch::{
    light_cache_num_items, light_cache_size, seed_hash, LIGHT_CACHE_ITEM_SIZE, LIGHT_CACHE_ROUNDS,
    MAX_EPOCH_NUMBER,
};
use crate::error::{EthashError, Result};
use crate::hash::{Hash256, Hash512};
use crate::keccak::{keccak512, keccak512_hash};

/// Light cache of one epoch
pub struct LightCache {
    epoch: u64,
    items: Vec<Hash512>,
}

impl LightCache {
    /// Build the light cache for `epoch` with its protocol size
    pub fn build(epoch: u64) -> Result<Self> {
        // Checked before the seed chain, which is one Keccak per epoch
        if epoch > MAX_EPOCH_NUMBER {
            return Err(EthashError::Allocation {
                what: "light cache",
                bytes: light_cache_size(epoch),
            });
        }
        let num_items = light_cache_num_items(epoch);
        Self::build_with_seed(epoch, &seed_hash(epoch), num_items)
    }

    /// Build a light cache of an arbitrary item count.
    ///
    /// Used with the protocol size by [`LightCache::build`], and with tiny
    /// sizes in tests where a real epoch would be too large.
    pub fn build_with_seed(epoch: u64, seed: &Hash256, num_items: u64) -> Result<Self> {
        let start = Instant::now();
        let bytes = num_items.saturating_mul(LIGHT_CACHE_ITEM_SIZE);
        if num_items == 0 {
            return Err(EthashError::InvalidItemCount { what: "light cache", count: 0 });
        }
        if num_items > u32::MAX as u64 {
            return Err(EthashError::Allocation { what: "light cache", bytes });
        }
        let n = num_items as usize;

        let mut items: Vec<Hash512> = Vec::new();
        items
            .try_reserve_exact(n)
            .map_err(|_| EthashError::Allocation { what: "light cache", bytes })?;

        // First item = Keccak-512(seed), each next item hashes the previous one
        let mut item = keccak512(&seed.data);
        items.push(item);
        for _ in 1..n {
            item = keccak512_hash(&item);
            items.push(item);
        }

        for _ in 0..LIGHT_CACHE_ROUNDS {
            for i in 0..n {
                // First index: low 32 bits of the item, little-endian
                let v = items[i].word(0) as usize % n;
                let w = (i + n - 1) % n;
                items[i] = keccak512_hash(&items[v].xor(&items[w]));
            }
        }

        log::debug!(
            "ethash_light_cache_built epoch={} items={} bytes={} elapsed_ms={}",
            epoch,
            n,
            bytes,
            start.elapsed().as_millis()
        );

        Ok(Self { epoch, items })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> &Hash512 {
        &self.items[index]
    }

    pub fn items(&self) -> &[Hash512] {
        &self.items
    }

    /// Size of the cache in bytes
    pub fn size_bytes(&self) -> u64 {
        self.items.len() as u64 * LIGHT_CACHE_ITEM_SIZE
    }

    /// Raw cache bytes, item after item (e.g. for upload to a GPU)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.items.len() * LIGHT_CACHE_ITEM_SIZE as usize);
        for item in &self.items {
            out.extend_from_slice(&item.data);
        }
        out
    }
}

impl std::fmt::Debug for LightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightCache")
            .field("epoch", &self.epoch)
            .field("items", &self.items.len())
            .finish()
    }
}
