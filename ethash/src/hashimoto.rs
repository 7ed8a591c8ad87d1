//! Hashimoto mixing
//!
//! ```text
//! seed  = keccak512(header_hash ‖ nonce_le)
//! mix   = seed ‖ seed                         (32 words)
//! 64×   p = fnv(i ^ seed[0], mix[i % 32]) % num_items
//!       mix = fnv(mix, dataset[p])            (lane-wise)
//! cmix  = fnv-fold each 4 words → 8 words
//! final = keccak256(seed ‖ cmix)
//! ```

use serde::{Deserialize, Serialize};

use crate::cache::LightCache;
use crate::dataset::{fnv, DatasetAccess, LazyDataset};
use crate::epoch::NUM_DATASET_ACCESSES;
use crate::error::Result;
use crate::hash::{Hash1024, Hash256, Hash512};
use crate::keccak::{keccak256_concat, keccak512_concat};

/// Output of one hashimoto evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixResult {
    pub final_hash: Hash256,
    pub mix_hash: Hash256,
}

#[inline]
fn hash_seed(header_hash: &Hash256, nonce: u64) -> Hash512 {
    keccak512_concat(&[&header_hash.data, &nonce.to_le_bytes()])
}

#[inline]
fn final_hash(seed: &Hash512, mix_hash: &Hash256) -> Hash256 {
    keccak256_concat(&[&seed.data, &mix_hash.data])
}

/// Run hashimoto against any dataset accessor (`num_items() > 0`)
pub fn hashimoto(dataset: &dyn DatasetAccess, header_hash: &Hash256, nonce: u64) -> MixResult {
    let num_items = dataset.num_items();
    let seed = hash_seed(header_hash, nonce);
    let seed_init = seed.word(0);

    let mut mix = Hash1024::from_halves(seed, seed);

    for i in 0..NUM_DATASET_ACCESSES {
        let p = fnv(i ^ seed_init, mix.word(i as usize % Hash1024::WORDS)) as u64 % num_items;
        let data = dataset.item(p);
        for j in 0..Hash1024::WORDS {
            mix.set_word(j, fnv(mix.word(j), data.word(j)));
        }
    }

    let mut mix_hash = Hash256::zero();
    for i in (0..Hash1024::WORDS).step_by(4) {
        let h1 = fnv(mix.word(i), mix.word(i + 1));
        let h2 = fnv(h1, mix.word(i + 2));
        let h3 = fnv(h2, mix.word(i + 3));
        mix_hash.set_word(i / 4, h3);
    }

    MixResult {
        final_hash: final_hash(&seed, &mix_hash),
        mix_hash,
    }
}

/// Hashimoto over a light cache only, computing dataset items on demand
pub fn hash_light(
    cache: &std::sync::Arc<LightCache>,
    full_dataset_num_items: u64,
    header_hash: &Hash256,
    nonce: u64,
) -> Result<MixResult> {
    let lazy = LazyDataset::new(cache.clone(), full_dataset_num_items)?;
    Ok(hashimoto(&lazy, header_hash, nonce))
}

/// Recompute only the final hash from a claimed mix hash.
///
/// Costs two Keccak calls, so it rejects most bogus proofs before the
/// dataset walk. Passing this check alone proves nothing about the mix.
pub fn verify_final_hash(
    header_hash: &Hash256,
    mix_hash: &Hash256,
    nonce: u64,
    boundary: &Hash256,
) -> bool {
    let seed = hash_seed(header_hash, nonce);
    crate::boundary::check_boundary(&final_hash(&seed, mix_hash), boundary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{BuildOptions, EagerDataset};
    use crate::keccak::keccak256;
    use std::sync::Arc;

    fn small_cache() -> Arc<LightCache> {
        Arc::new(LightCache::build_with_seed(0, &keccak256(b"hashimoto"), 331).unwrap())
    }

    #[test]
    fn test_deterministic() {
        let cache = small_cache();
        let header = keccak256(b"header");
        let a = hash_light(&cache, 1009, &header, 42).unwrap();
        let b = hash_light(&cache, 1009, &header, 42).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, hash_light(&cache, 1009, &header, 43).unwrap());
    }

    #[test]
    fn test_light_and_full_agree() {
        let cache = small_cache();
        let eager = EagerDataset::build(&cache, 1009, &BuildOptions::with_threads(2)).unwrap();
        let lazy = LazyDataset::new(cache.clone(), 1009).unwrap();
        for nonce in 0..16u64 {
            let header = keccak256(&nonce.to_be_bytes());
            assert_eq!(hashimoto(&eager, &header, nonce), hashimoto(&lazy, &header, nonce));
        }
    }

    #[test]
    fn test_final_hash_relation() {
        let cache = small_cache();
        let header = Hash256::from_bytes([9u8; 32]);
        let r = hash_light(&cache, 1009, &header, 7).unwrap();

        let seed = hash_seed(&header, 7);
        let mut joined = seed.data.to_vec();
        joined.extend_from_slice(&r.mix_hash.data);
        assert_eq!(r.final_hash, keccak256(&joined));

        assert!(verify_final_hash(&header, &r.mix_hash, 7, &r.final_hash));
        assert!(!verify_final_hash(&header, &r.mix_hash, 7, &Hash256::zero()));
    }

    #[test]
    fn test_epoch_zero_vectors() {
        let cache = Arc::new(LightCache::build(0).unwrap());
        let num_items = crate::epoch::full_dataset_num_items(0);

        let header: Hash256 = "2a8de2adf89af77358250bf908bf04ba94a6e8c3ba87775564a41d269a05e4ce"
            .parse()
            .unwrap();
        let r = hash_light(&cache, num_items, &header, 0x4242424242424242).unwrap();
        assert_eq!(
            r.mix_hash.to_hex(),
            "58f759ede17a706c93f13030328bcea40c1d1341fb26f2facd21ceb0dae57017"
        );
        assert_eq!(
            r.final_hash.to_hex(),
            "dd47fd2d98db51078356852d7c4014e6a5d6c387c35f40e2875b74a256ed7906"
        );
    }
}
