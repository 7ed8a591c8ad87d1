//! Epoch context registry
//!
//! Holds built [`EpochContext`]s keyed by epoch and hands out shared
//! `Arc`s. Guarantees:
//!
//! - at most one build per epoch at a time; concurrent callers for the same
//!   epoch wait and receive the same context
//! - builds for different epochs run concurrently (the map lock is never
//!   held across a build)
//! - a failed build leaves no entry behind once no other caller waits on
//!   it; waiters retry the build on the same slot
//! - `invalidate` and `clear` never drop a build in flight
//! - contexts still referenced by a caller are never evicted; idle ones are
//!   dropped least-recently-used first once the memory budget or the
//!   context limit is exceeded

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::context::{ContextOptions, EpochContext};
use crate::dataset::BuildOptions;
use crate::error::Result;

type Slot = Arc<OnceCell<Arc<EpochContext>>>;
type Builder = dyn Fn(u64) -> Result<EpochContext> + Send + Sync;

struct Entry {
    slot: Slot,
    last_used: u64,
}

impl Entry {
    fn context(&self) -> Option<&Arc<EpochContext>> {
        self.slot.get()
    }

    /// Completed and referenced by nobody but the registry
    fn is_idle(&self) -> bool {
        match self.slot.get() {
            Some(ctx) => Arc::strong_count(&self.slot) == 1 && Arc::strong_count(ctx) == 1,
            None => false,
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    evictions: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub evictions: u64,
    pub failures: u64,
}

pub struct EpochRegistry {
    config: RegistryConfig,
    builder: Box<Builder>,
    entries: Mutex<HashMap<u64, Entry>>,
    clock: AtomicU64,
    counters: Counters,
}

impl EpochRegistry {
    /// Registry building protocol-sized contexts per `config`
    pub fn new(config: RegistryConfig) -> Self {
        let options = ContextOptions {
            mode: config.dataset_mode,
            build: BuildOptions::with_threads(config.build_threads),
        };
        Self::with_builder(config, move |epoch| EpochContext::build(epoch, &options))
    }

    /// Registry with a custom context builder
    pub fn with_builder<F>(config: RegistryConfig, builder: F) -> Self
    where
        F: Fn(u64) -> Result<EpochContext> + Send + Sync + 'static,
    {
        Self {
            config,
            builder: Box::new(builder),
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Context for `epoch`, building it if needed
    pub fn get_or_build(&self, epoch: u64) -> Result<Arc<EpochContext>> {
        let now = self.tick();
        let slot = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(epoch).or_insert_with(|| Entry {
                slot: Arc::new(OnceCell::new()),
                last_used: now,
            });
            entry.last_used = now;
            entry.slot.clone()
        };

        if let Some(ctx) = slot.get() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(ctx.clone());
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let mut built_here = false;
        let result = slot.get_or_try_init(|| {
            built_here = true;
            log::debug!("ethash_context_build_start epoch={}", epoch);
            (self.builder)(epoch).map(Arc::new)
        });

        match result {
            Ok(ctx) => {
                let ctx = ctx.clone();
                if built_here {
                    self.counters.builds.fetch_add(1, Ordering::Relaxed);
                    self.enforce_limits(epoch);
                }
                Ok(ctx)
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("ethash_context_build_failed epoch={} error={}", epoch, e);
                // New callers clone the slot under this lock, so the count
                // is stable here: one reference for the map, one for us
                let mut entries = self.entries.lock();
                if entries.get(&epoch).is_some_and(|entry| {
                    Arc::ptr_eq(&entry.slot, &slot) && Arc::strong_count(&slot) == 2
                }) {
                    entries.remove(&epoch);
                }
                Err(e)
            }
        }
    }

    /// Already-built context for `epoch`, without building
    pub fn get(&self, epoch: u64) -> Option<Arc<EpochContext>> {
        let now = self.tick();
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&epoch)?;
        let ctx = entry.context()?.clone();
        entry.last_used = now;
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(ctx)
    }

    /// Forget the completed context of `epoch`. Callers holding it keep a
    /// valid `Arc`. A build still in flight is left alone and `false` is
    /// returned.
    pub fn invalidate(&self, epoch: u64) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.get(&epoch) {
                Some(entry) if entry.context().is_some() => entries.remove(&epoch),
                _ => None,
            }
        };
        removed.is_some()
    }

    /// Forget every completed context; builds in flight stay registered
    pub fn clear(&self) {
        let drained: Vec<Entry> = {
            let mut entries = self.entries.lock();
            let done: Vec<u64> = entries
                .iter()
                .filter(|(_, e)| e.context().is_some())
                .map(|(epoch, _)| *epoch)
                .collect();
            done.iter().filter_map(|epoch| entries.remove(epoch)).collect()
        };
        log::debug!("ethash_registry_cleared contexts={}", drained.len());
    }

    /// Number of completed contexts
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| e.context().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Epochs with a completed context, ascending
    pub fn epochs(&self) -> Vec<u64> {
        let mut epochs: Vec<u64> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, e)| e.context().is_some())
            .map(|(epoch, _)| *epoch)
            .collect();
        epochs.sort_unstable();
        epochs
    }

    /// Bytes held by completed contexts
    pub fn memory_usage(&self) -> u64 {
        Self::usage(&self.entries.lock())
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    fn usage(entries: &HashMap<u64, Entry>) -> u64 {
        entries
            .values()
            .filter_map(|e| e.context())
            .map(|ctx| ctx.memory_usage())
            .sum()
    }

    fn over_limits(&self, entries: &HashMap<u64, Entry>) -> bool {
        let count = entries.values().filter(|e| e.context().is_some()).count();
        count > self.config.max_contexts || Self::usage(entries) > self.config.memory_budget_bytes
    }

    /// Evict idle contexts, oldest first, until within limits. `keep` is
    /// the epoch that triggered the check.
    fn enforce_limits(&self, keep: u64) {
        let mut evicted = Vec::new();
        {
            let mut entries = self.entries.lock();
            while self.over_limits(&entries) {
                let victim = entries
                    .iter()
                    .filter(|(epoch, entry)| **epoch != keep && entry.is_idle())
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(epoch, _)| *epoch);

                let Some(victim) = victim else {
                    log::warn!(
                        "ethash_registry_over_budget usage_mb={} budget_mb={} contexts={}",
                        Self::usage(&entries) / (1024 * 1024),
                        self.config.memory_budget_bytes / (1024 * 1024),
                        entries.len()
                    );
                    break;
                };

                if let Some(entry) = entries.remove(&victim) {
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                    log::info!("ethash_context_evicted epoch={}", victim);
                    evicted.push(entry);
                }
            }
        }
        // Contexts are freed here, outside the lock
        drop(evicted);
    }
}

impl std::fmt::Debug for EpochRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochRegistry")
            .field("config", &self.config)
            .field("epochs", &self.epochs())
            .field("stats", &self.stats())
            .finish()
    }
}
