//! Full dataset items
//!
//! Every 1024-bit dataset item is a pure function of the light cache and its
//! index. A context either computes items on demand ([`LazyDataset`]) or
//! materializes all of them up front ([`EagerDataset`]); both go through
//! [`calculate_dataset_item`] and therefore return identical bytes.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::LightCache;
use crate::epoch::{FULL_DATASET_ITEM_PARENTS, FULL_DATASET_ITEM_SIZE};
use crate::error::{EthashError, Result};
use crate::hash::{Hash1024, Hash512};
use crate::keccak::keccak512_hash;

/// FNV prime used by Ethash mixing
pub const FNV_PRIME: u32 = 0x01000193;

/// Items computed per parallel work unit
const BUILD_CHUNK_ITEMS: usize = 4096;

/// Ethash FNV-1 variant: multiply then XOR (not FNV-1a)
#[inline(always)]
pub fn fnv(u: u32, v: u32) -> u32 {
    u.wrapping_mul(FNV_PRIME) ^ v
}

/// Lane-wise FNV over sixteen 32-bit words
#[inline]
pub fn fnv_hash512(u: &Hash512, v: &Hash512) -> Hash512 {
    let mut out = Hash512::zero();
    for i in 0..Hash512::WORDS {
        out.set_word(i, fnv(u.word(i), v.word(i)));
    }
    out
}

/// One 512-bit half of a dataset item; `index` counts 512-bit halves
pub fn calculate_dataset_item_512(cache: &LightCache, index: u64) -> Hash512 {
    let n = cache.len() as u64;
    let init = index as u32;

    let mut mix = *cache.get((index % n) as usize);
    mix.set_word(0, mix.word(0) ^ init);
    mix = keccak512_hash(&mix);

    for j in 0..FULL_DATASET_ITEM_PARENTS {
        let t = fnv(init ^ j, mix.word(j as usize % Hash512::WORDS));
        let parent = (t as u64 % n) as usize;
        mix = fnv_hash512(&mix, cache.get(parent));
    }

    keccak512_hash(&mix)
}

/// Full 1024-bit dataset item at `index`: halves `2*index` and `2*index + 1`
#[inline]
pub fn calculate_dataset_item(cache: &LightCache, index: u64) -> Hash1024 {
    Hash1024::from_halves(
        calculate_dataset_item_512(cache, index * 2),
        calculate_dataset_item_512(cache, index * 2 + 1),
    )
}

// ============================================================================
// ACCESSORS
// ============================================================================

/// Indexed access to the full dataset of an epoch
pub trait DatasetAccess: Send + Sync {
    /// Number of 1024-bit items
    fn num_items(&self) -> u64;

    /// Item at `index`; `index < num_items()`
    fn item(&self, index: u64) -> Hash1024;

    /// Whether items are resident in memory
    fn is_materialized(&self) -> bool {
        false
    }

    /// Bytes held by the accessor itself (beyond the shared light cache)
    fn memory_usage(&self) -> u64 {
        0
    }
}

fn check_num_items(num_items: u64) -> Result<()> {
    if num_items == 0 {
        return Err(EthashError::InvalidItemCount { what: "full dataset", count: 0 });
    }
    Ok(())
}

/// Computes every requested item from the light cache
#[derive(Debug, Clone)]
pub struct LazyDataset {
    cache: Arc<LightCache>,
    num_items: u64,
}

impl LazyDataset {
    pub fn new(cache: Arc<LightCache>, num_items: u64) -> Result<Self> {
        check_num_items(num_items)?;
        Ok(Self { cache, num_items })
    }

    pub fn light_cache(&self) -> &Arc<LightCache> {
        &self.cache
    }
}

impl DatasetAccess for LazyDataset {
    fn num_items(&self) -> u64 {
        self.num_items
    }

    #[inline]
    fn item(&self, index: u64) -> Hash1024 {
        calculate_dataset_item(&self.cache, index)
    }
}

/// Options for materializing a full dataset
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Worker threads (0 = one per logical CPU)
    pub threads: usize,
    /// Set to abandon an in-progress build
    pub cancel: Option<Arc<AtomicBool>>,
}

impl BuildOptions {
    pub fn with_threads(threads: usize) -> Self {
        Self { threads, cancel: None }
    }

    fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Fully materialized dataset
pub struct EagerDataset {
    items: Vec<Hash1024>,
}

impl EagerDataset {
    /// Compute all `num_items` items in parallel.
    ///
    /// Items are independent, so the output does not depend on the thread
    /// count. A cancelled build drops everything computed so far.
    pub fn build(cache: &LightCache, num_items: u64, options: &BuildOptions) -> Result<Self> {
        check_num_items(num_items)?;
        let start = Instant::now();
        let bytes = num_items.saturating_mul(FULL_DATASET_ITEM_SIZE);
        let n = usize::try_from(num_items)
            .map_err(|_| EthashError::Allocation { what: "full dataset", bytes })?;

        let mut items: Vec<Hash1024> = Vec::new();
        items
            .try_reserve_exact(n)
            .map_err(|_| EthashError::Allocation { what: "full dataset", bytes })?;
        items.resize(n, Hash1024::zero());

        let threads = options.effective_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ethash-dag-{i}"))
            .build()
            .map_err(|e| EthashError::ThreadPool(e.to_string()))?;

        log::info!(
            "ethash_dataset_building epoch={} items={} size_mb={} threads={}",
            cache.epoch(),
            num_items,
            bytes / (1024 * 1024),
            threads
        );

        let total_chunks = n.div_ceil(BUILD_CHUNK_ITEMS).max(1) as u64;
        let done_chunks = AtomicU64::new(0);
        let progress_step = (total_chunks / 10).max(1);

        let outcome = pool.install(|| {
            items
                .par_chunks_mut(BUILD_CHUNK_ITEMS)
                .enumerate()
                .try_for_each(|(chunk_index, chunk)| {
                    if options.is_cancelled() {
                        return Err(());
                    }
                    let first = (chunk_index * BUILD_CHUNK_ITEMS) as u64;
                    for (offset, slot) in chunk.iter_mut().enumerate() {
                        *slot = calculate_dataset_item(cache, first + offset as u64);
                    }
                    let done = done_chunks.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % progress_step == 0 {
                        log::debug!(
                            "ethash_dataset_progress epoch={} pct={:.1}",
                            cache.epoch(),
                            done as f64 * 100.0 / total_chunks as f64
                        );
                    }
                    Ok(())
                })
        });

        if outcome.is_err() {
            log::warn!("ethash_dataset_cancelled epoch={}", cache.epoch());
            return Err(EthashError::Cancelled { epoch: cache.epoch() });
        }

        log::info!(
            "ethash_dataset_built epoch={} items={} elapsed_s={:.1}",
            cache.epoch(),
            num_items,
            start.elapsed().as_secs_f64()
        );

        Ok(Self { items })
    }

    pub fn items(&self) -> &[Hash1024] {
        &self.items
    }
}

impl DatasetAccess for EagerDataset {
    fn num_items(&self) -> u64 {
        self.items.len() as u64
    }

    #[inline(always)]
    fn item(&self, index: u64) -> Hash1024 {
        self.items[index as usize]
    }

    fn is_materialized(&self) -> bool {
        true
    }

    fn memory_usage(&self) -> u64 {
        self.items.len() as u64 * FULL_DATASET_ITEM_SIZE
    }
}

impl std::fmt::Debug for EagerDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EagerDataset")
            .field("items", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;
    use crate::keccak::keccak512;

    fn small_cache() -> Arc<LightCache> {
        Arc::new(LightCache::build_with_seed(0, &Hash256::from_bytes([3u8; 32]), 509).unwrap())
    }

    #[test]
    fn test_fnv() {
        assert_eq!(fnv(0, 0), 0);
        assert_eq!(fnv(1, 0), FNV_PRIME);
        assert_eq!(fnv(1, 1), FNV_PRIME ^ 1);
        assert_eq!(fnv(u32::MAX, 0), u32::MAX.wrapping_mul(FNV_PRIME));
    }

    #[test]
    fn test_item_halves_use_consecutive_indices() {
        let cache = small_cache();
        let item = calculate_dataset_item(&cache, 10);
        assert_eq!(item.hashes[0], calculate_dataset_item_512(&cache, 20));
        assert_eq!(item.hashes[1], calculate_dataset_item_512(&cache, 21));
    }

    #[test]
    fn test_item_512_matches_byte_reference() {
        let cache = small_cache();
        let n = cache.len();
        let index = 1234u32;

        let mut mix = cache.get(index as usize % n).data;
        let w0 = u32::from_le_bytes(mix[..4].try_into().unwrap()) ^ index;
        mix[..4].copy_from_slice(&w0.to_le_bytes());
        let mut words: Vec<u32> = keccak512(&mix)
            .data
            .chunks(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        for j in 0..256u32 {
            let parent = (index ^ j).wrapping_mul(0x01000193) ^ words[j as usize % 16];
            let parent = parent as usize % n;
            for (k, w) in words.iter_mut().enumerate() {
                *w = w.wrapping_mul(0x01000193) ^ cache.get(parent).word(k);
            }
        }
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();

        assert_eq!(calculate_dataset_item_512(&cache, index as u64), keccak512(&bytes));
    }

    #[test]
    fn test_lazy_and_eager_agree_everywhere() {
        let cache = small_cache();
        let num_items = 2003;
        let lazy = LazyDataset::new(cache.clone(), num_items).unwrap();
        let eager = EagerDataset::build(&cache, num_items, &BuildOptions::with_threads(3)).unwrap();

        assert_eq!(eager.num_items(), num_items);
        assert!(eager.is_materialized());
        assert!(!lazy.is_materialized());
        for i in 0..num_items {
            assert_eq!(lazy.item(i), eager.item(i), "item {i}");
        }
    }

    #[test]
    fn test_eager_independent_of_thread_count() {
        let cache = small_cache();
        let one = EagerDataset::build(&cache, 9001, &BuildOptions::with_threads(1)).unwrap();
        let many = EagerDataset::build(&cache, 9001, &BuildOptions::with_threads(8)).unwrap();
        assert_eq!(one.items(), many.items());
        assert_eq!(one.memory_usage(), 9001 * 128);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let cache = small_cache();
        let err = LazyDataset::new(cache.clone(), 0).unwrap_err();
        assert!(matches!(err, EthashError::InvalidItemCount { what: "full dataset", count: 0 }));
        let err = EagerDataset::build(&cache, 0, &BuildOptions::with_threads(1)).unwrap_err();
        assert!(matches!(err, EthashError::InvalidItemCount { .. }));
    }

    #[test]
    fn test_cancelled_build_returns_error() {
        let cache = small_cache();
        let cancel = Arc::new(AtomicBool::new(true));
        let options = BuildOptions { threads: 2, cancel: Some(cancel) };
        let err = EagerDataset::build(&cache, 50_000, &options).unwrap_err();
        assert!(matches!(err, EthashError::Cancelled { epoch: 0 }));
    }
}
