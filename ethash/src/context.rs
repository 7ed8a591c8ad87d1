//! Epoch context: light cache plus a dataset accessor
//!
//! ## Dataset modes
//!
//! - **Lazy** (default): only the light cache is kept (16 MiB at epoch 0);
//!   every dataset access recomputes the item. Enough for verification.
//! - **Eager**: the full dataset is materialized (1 GiB at epoch 0 and
//!   growing); hashing is ~500× cheaper per access. Worth it for mining.
//!
//! Both modes produce identical results.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::LightCache;
use crate::dataset::{BuildOptions, DatasetAccess, EagerDataset, LazyDataset};
use crate::epoch::{
    full_dataset_num_items, light_cache_num_items, light_cache_size, seed_hash, MAX_EPOCH_NUMBER,
};
use crate::error::{EthashError, Result};
use crate::hash::Hash256;
use crate::hashimoto::{hashimoto, MixResult};

/// How the full dataset is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetMode {
    #[default]
    Lazy,
    Eager,
}

impl DatasetMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lazy" | "light" => Some(Self::Lazy),
            "eager" | "full" => Some(Self::Eager),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lazy => "lazy",
            Self::Eager => "eager",
        }
    }
}

impl std::fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dataset accessor selected when the context was built
#[derive(Debug)]
pub enum Dataset {
    Lazy(LazyDataset),
    Eager(EagerDataset),
}

impl Dataset {
    pub fn as_access(&self) -> &dyn DatasetAccess {
        match self {
            Self::Lazy(d) => d as &dyn DatasetAccess,
            Self::Eager(d) => d as &dyn DatasetAccess,
        }
    }
}

/// Options for building a context
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub mode: DatasetMode,
    pub build: BuildOptions,
}

/// Immutable, shareable state of one epoch
#[derive(Debug)]
pub struct EpochContext {
    epoch: u64,
    seed_hash: Hash256,
    light_cache: Arc<LightCache>,
    dataset: Dataset,
}

impl EpochContext {
    /// Build the context of `epoch` with protocol sizes
    pub fn build(epoch: u64, options: &ContextOptions) -> Result<Self> {
        if epoch > MAX_EPOCH_NUMBER {
            return Err(EthashError::Allocation {
                what: "light cache",
                bytes: light_cache_size(epoch),
            });
        }
        let seed = seed_hash(epoch);
        Self::build_with_sizes(
            epoch,
            &seed,
            light_cache_num_items(epoch),
            full_dataset_num_items(epoch),
            options,
        )
    }

    /// Build a context with explicit item counts.
    ///
    /// Real epochs always use [`EpochContext::build`]; explicit sizes exist
    /// so that eager contexts can be exercised without gigabytes of memory.
    pub fn build_with_sizes(
        epoch: u64,
        seed: &Hash256,
        light_cache_items: u64,
        full_dataset_items: u64,
        options: &ContextOptions,
    ) -> Result<Self> {
        if full_dataset_items == 0 {
            return Err(EthashError::InvalidItemCount { what: "full dataset", count: 0 });
        }
        let start = Instant::now();
        let light_cache = Arc::new(LightCache::build_with_seed(epoch, seed, light_cache_items)?);

        let dataset = match options.mode {
            DatasetMode::Lazy => {
                Dataset::Lazy(LazyDataset::new(light_cache.clone(), full_dataset_items)?)
            }
            DatasetMode::Eager => {
                Dataset::Eager(EagerDataset::build(&light_cache, full_dataset_items, &options.build)?)
            }
        };

        log::info!(
            "ethash_context_ready epoch={} mode={} cache_mb={} elapsed_ms={}",
            epoch,
            options.mode,
            light_cache.size_bytes() / (1024 * 1024),
            start.elapsed().as_millis()
        );

        Ok(Self {
            epoch,
            seed_hash: *seed,
            light_cache,
            dataset,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn seed_hash(&self) -> &Hash256 {
        &self.seed_hash
    }

    pub fn light_cache(&self) -> &Arc<LightCache> {
        &self.light_cache
    }

    pub fn full_dataset_num_items(&self) -> u64 {
        self.dataset.as_access().num_items()
    }

    pub fn dataset(&self) -> &dyn DatasetAccess {
        self.dataset.as_access()
    }

    pub fn mode(&self) -> DatasetMode {
        match self.dataset {
            Dataset::Lazy(_) => DatasetMode::Lazy,
            Dataset::Eager(_) => DatasetMode::Eager,
        }
    }

    pub fn is_full(&self) -> bool {
        self.dataset.as_access().is_materialized()
    }

    /// Bytes held: light cache plus a materialized dataset, if any
    pub fn memory_usage(&self) -> u64 {
        self.light_cache.size_bytes() + self.dataset.as_access().memory_usage()
    }

    /// Hashimoto over this context's dataset
    pub fn hash(&self, header_hash: &Hash256, nonce: u64) -> MixResult {
        hashimoto(self.dataset.as_access(), header_hash, nonce)
    }
}
