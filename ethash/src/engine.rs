//! Public hashing and verification API
//!
//! [`Ethash`] owns an [`EpochRegistry`]; every operation resolves its epoch
//! context through it. Byte-slice entry points validate digest lengths
//! before doing any work, so callers fed from untyped sources (RPC, CLI,
//! FFI) get an input error instead of a hash of garbage.

use std::sync::Arc;

use crate::boundary::{check_against_difficulty, check_boundary};
use crate::config::EthashConfig;
use crate::context::EpochContext;
use crate::epoch::epoch_number;
use crate::error::Result;
use crate::hash::{Hash256, Hash512};
use crate::hashimoto::{verify_final_hash, MixResult};
use crate::keccak;
use crate::registry::{EpochRegistry, RegistryStats};

/// Keccak-256 (original padding)
pub fn keccak_256(data: &[u8]) -> Hash256 {
    keccak::keccak256(data)
}

/// Keccak-512 (original padding)
pub fn keccak_512(data: &[u8]) -> Hash512 {
    keccak::keccak512(data)
}

/// Ethash engine
#[derive(Debug)]
pub struct Ethash {
    registry: EpochRegistry,
}

impl Ethash {
    pub fn new(config: &EthashConfig) -> Self {
        log::info!(
            "ethash_engine_init mode={} budget_mb={} max_contexts={}",
            config.registry.dataset_mode,
            config.registry.memory_budget_bytes / (1024 * 1024),
            config.registry.max_contexts
        );
        Self::with_registry(EpochRegistry::new(config.registry.clone()))
    }

    pub fn with_registry(registry: EpochRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EpochRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Shared context for `epoch`, built on first use
    pub fn epoch_context(&self, epoch: u64) -> Result<Arc<EpochContext>> {
        self.registry.get_or_build(epoch)
    }

    /// Hashimoto for raw inputs: returns `(final_hash, mix_hash)`
    pub fn compute_hash(
        &self,
        epoch: u64,
        header_hash: &[u8],
        nonce: u64,
    ) -> Result<(Hash256, Hash256)> {
        let header = Hash256::from_slice("header_hash", header_hash)?;
        let r = self.hash_typed(epoch, &header, nonce)?;
        Ok((r.final_hash, r.mix_hash))
    }

    /// Full verification for raw inputs.
    ///
    /// `Ok(false)` for a wrong mix hash or a final hash above `boundary`;
    /// `Err` only for malformed input or a failed context build.
    pub fn verify(
        &self,
        epoch: u64,
        header_hash: &[u8],
        mix_hash: &[u8],
        nonce: u64,
        boundary: &[u8],
    ) -> Result<bool> {
        let header = Hash256::from_slice("header_hash", header_hash)?;
        let mix = Hash256::from_slice("mix_hash", mix_hash)?;
        let boundary = Hash256::from_slice("boundary", boundary)?;
        self.verify_typed(epoch, &header, &mix, nonce, &boundary)
    }

    pub fn hash_typed(&self, epoch: u64, header_hash: &Hash256, nonce: u64) -> Result<MixResult> {
        let ctx = self.epoch_context(epoch)?;
        Ok(ctx.hash(header_hash, nonce))
    }

    pub fn verify_typed(
        &self,
        epoch: u64,
        header_hash: &Hash256,
        mix_hash: &Hash256,
        nonce: u64,
        boundary: &Hash256,
    ) -> Result<bool> {
        // Cheap rejection: the claimed mix cannot reach the boundary
        if !verify_final_hash(header_hash, mix_hash, nonce, boundary) {
            return Ok(false);
        }

        let r = self.hash_typed(epoch, header_hash, nonce)?;
        if r.mix_hash != *mix_hash {
            log::debug!("ethash_verify_mix_mismatch epoch={} nonce={:#x}", epoch, nonce);
            return Ok(false);
        }
        Ok(check_boundary(&r.final_hash, boundary))
    }

    /// Verify against a difficulty instead of a boundary
    pub fn verify_against_difficulty(
        &self,
        epoch: u64,
        header_hash: &Hash256,
        mix_hash: &Hash256,
        nonce: u64,
        difficulty: &Hash256,
    ) -> Result<bool> {
        let r = self.hash_typed(epoch, header_hash, nonce)?;
        Ok(r.mix_hash == *mix_hash && check_against_difficulty(&r.final_hash, difficulty))
    }

    /// [`Ethash::verify_typed`] with the epoch derived from a block number
    pub fn verify_block(
        &self,
        block_number: u64,
        header_hash: &Hash256,
        mix_hash: &Hash256,
        nonce: u64,
        boundary: &Hash256,
    ) -> Result<bool> {
        self.verify_typed(epoch_number(block_number), header_hash, mix_hash, nonce, boundary)
    }
}

impl Default for Ethash {
    fn default() -> Self {
        Self::new(&EthashConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::context::{ContextOptions, DatasetMode};
    use crate::dataset::BuildOptions;
    use crate::epoch::seed_hash;
    use crate::error::EthashError;

    /// Engine over small synthetic epochs so tests stay fast
    fn small_engine() -> Ethash {
        let registry = EpochRegistry::with_builder(RegistryConfig::default(), |epoch| {
            EpochContext::build_with_sizes(
                epoch,
                &seed_hash(epoch),
                127,
                509,
                &ContextOptions { mode: DatasetMode::Lazy, build: BuildOptions::with_threads(1) },
            )
        });
        Ethash::with_registry(registry)
    }

    #[test]
    fn test_compute_hash_rejects_bad_header_length() {
        let engine = small_engine();
        let err = engine.compute_hash(0, &[0u8; 31], 0).unwrap_err();
        assert!(matches!(
            err,
            EthashError::InvalidLength { field: "header_hash", expected: 32, actual: 31 }
        ));
        // Rejected before any context was built
        assert_eq!(engine.stats().misses, 0);
    }

    #[test]
    fn test_unbuildable_epoch_is_a_build_failure() {
        let engine = Ethash::default();
        let start = std::time::Instant::now();
        let err = engine.compute_hash(u64::MAX, &[0u8; 32], 0).unwrap_err();
        assert!(matches!(err, EthashError::Allocation { .. }));
        assert!(!err.is_input_error());
        assert!(start.elapsed().as_secs() < 5);
        assert!(engine.registry().is_empty());
        assert_eq!(engine.stats().failures, 1);
    }

    #[test]
    fn test_verify_validates_every_digest() {
        let engine = small_engine();
        let ok = [0u8; 32];
        let short = [0u8; 33];
        assert!(engine.verify(0, &short, &ok, 0, &ok).unwrap_err().is_input_error());
        assert!(engine.verify(0, &ok, &short, 0, &ok).unwrap_err().is_input_error());
        assert!(engine.verify(0, &ok, &ok, 0, &short).unwrap_err().is_input_error());
        assert!(engine.verify(0, &ok, &ok, 0, &[]).is_err());
        assert_eq!(engine.stats().misses, 0);
    }

    #[test]
    fn test_verify_roundtrip_and_boundary_edge() {
        let engine = small_engine();
        let header = keccak_256(b"block header");
        let (final_hash, mix_hash) = engine.compute_hash(1, &header.data, 99).unwrap();

        assert!(engine.verify(1, &header.data, &mix_hash.data, 99, &final_hash.data).unwrap());
        assert!(engine.verify(1, &header.data, &mix_hash.data, 99, &[0xFF; 32]).unwrap());

        // Boundary one below the final hash
        let mut below = final_hash;
        for byte in below.data.iter_mut().rev() {
            let (v, borrow) = byte.overflowing_sub(1);
            *byte = v;
            if !borrow {
                break;
            }
        }
        assert!(!engine.verify(1, &header.data, &mix_hash.data, 99, &below.data).unwrap());
    }

    #[test]
    fn test_verify_rejects_forged_mix() {
        let engine = small_engine();
        let header = keccak_256(b"forged");
        let r = engine.hash_typed(2, &header, 5).unwrap();

        let mut forged = r.mix_hash;
        forged.data[0] ^= 1;
        // Maximal boundary: only the mix equality check can reject
        let max = Hash256::from_bytes([0xFF; 32]);
        assert!(!engine.verify_typed(2, &header, &forged, 5, &max).unwrap());
        assert!(!engine.verify_typed(2, &header, &r.mix_hash, 6, &max).unwrap());
        assert!(engine.verify_typed(2, &header, &r.mix_hash, 5, &max).unwrap());
    }

    #[test]
    fn test_verify_block_maps_to_epoch() {
        let engine = small_engine();
        let header = keccak_256(b"block");
        let r = engine.hash_typed(3, &header, 1).unwrap();
        let max = Hash256::from_bytes([0xFF; 32]);
        assert!(engine.verify_block(90_000, &header, &r.mix_hash, 1, &max).unwrap());
        assert!(engine.verify_block(119_999, &header, &r.mix_hash, 1, &max).unwrap());
        assert!(!engine.verify_block(120_000, &header, &r.mix_hash, 1, &max).unwrap());
    }

    #[test]
    fn test_verify_against_difficulty() {
        let engine = small_engine();
        let header = keccak_256(b"difficulty");
        let r = engine.hash_typed(0, &header, 0).unwrap();
        let one = {
            let mut d = Hash256::zero();
            d.data[31] = 1;
            d
        };
        assert!(engine.verify_against_difficulty(0, &header, &r.mix_hash, 0, &one).unwrap());
        assert!(!engine
            .verify_against_difficulty(0, &header, &r.mix_hash, 0, &Hash256::from_bytes([0xFF; 32]))
            .unwrap());
    }

    #[test]
    fn test_contexts_are_shared() {
        let engine = small_engine();
        let a = engine.epoch_context(4).unwrap();
        let b = engine.epoch_context(4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.stats().builds, 1);
    }
}
