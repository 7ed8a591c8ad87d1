//! ZION Ethash
//!
//! Memory-hard Ethash proof-of-work: Keccak primitives, epoch schedule,
//! light cache, dataset items, hashimoto and boundary checks, plus an
//! epoch context registry that shares built contexts between threads.
//!
//! ```no_run
//! use zion_ethash::{Ethash, Hash256};
//!
//! let engine = Ethash::default();
//! let header = Hash256::zero();
//! let r = engine.hash_typed(0, &header, 0)?;
//! assert!(engine.verify_typed(0, &header, &r.mix_hash, 0, &r.final_hash)?);
//! # Ok::<(), zion_ethash::EthashError>(())
//! ```

pub mod boundary;
pub mod cache;
pub mod config;
pub mod context;
pub mod dataset;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod hash;
pub mod hashimoto;
pub mod keccak;
pub mod registry;

pub use boundary::{check_against_difficulty, check_boundary, difficulty_to_boundary};
pub use cache::LightCache;
pub use config::{EthashConfig, LoggingConfig, RegistryConfig};
pub use context::{ContextOptions, DatasetMode, EpochContext};
pub use dataset::{BuildOptions, DatasetAccess, EagerDataset, LazyDataset};
pub use engine::{keccak_256, keccak_512, Ethash};
pub use epoch::{epoch_number, EpochInfo, EPOCH_LENGTH};
pub use error::{EthashError, Result};
pub use hash::{Hash1024, Hash256, Hash512};
pub use hashimoto::{hashimoto, verify_final_hash, MixResult};
pub use registry::{EpochRegistry, RegistryStats};
