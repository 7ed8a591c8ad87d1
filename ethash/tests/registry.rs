//! Registry behaviour under concurrent callers
//!
//! Run with: cargo test -p zion-ethash --test registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use zion_ethash::epoch::seed_hash;
use zion_ethash::{
    BuildOptions, ContextOptions, DatasetMode, EpochContext, EpochRegistry, Ethash, EthashError,
    Hash256, RegistryConfig,
};

fn small_context(epoch: u64, mode: DatasetMode) -> zion_ethash::Result<EpochContext> {
    EpochContext::build_with_sizes(
        epoch,
        &seed_hash(epoch),
        211,
        1021,
        &ContextOptions { mode, build: BuildOptions::with_threads(2) },
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_concurrent_verify_shares_one_context() {
    let engine = Ethash::default();
    let header: Hash256 = "2a8de2adf89af77358250bf908bf04ba94a6e8c3ba87775564a41d269a05e4ce"
        .parse()
        .unwrap();
    let mix: Hash256 = "58f759ede17a706c93f13030328bcea40c1d1341fb26f2facd21ceb0dae57017"
        .parse()
        .unwrap();
    let boundary: Hash256 = "dd47fd2d98db51078356852d7c4014e6a5d6c387c35f40e2875b74a256ed7906"
        .parse()
        .unwrap();

    thread::scope(|s| {
        for _ in 0..6 {
            s.spawn(|| {
                assert!(engine
                    .verify_typed(0, &header, &mix, 0x4242424242424242, &boundary)
                    .unwrap());
            });
        }
    });

    assert_eq!(engine.stats().builds, 1);
    assert_eq!(engine.registry().epochs(), vec![0]);
}

#[test]
fn test_parallel_builds_of_different_epochs() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let registry = EpochRegistry::with_builder(RegistryConfig::default(), move |epoch| {
        counter.fetch_add(1, Ordering::SeqCst);
        small_context(epoch, DatasetMode::Lazy)
    });

    let results: Vec<(u64, Arc<EpochContext>)> = thread::scope(|s| {
        let handles: Vec<_> = (0..12u64)
            .map(|i| {
                let registry = &registry;
                s.spawn(move || {
                    let epoch = i % 3;
                    (epoch, registry.get_or_build(epoch).unwrap())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(builds.load(Ordering::SeqCst), 3);
    for (epoch, ctx) in &results {
        assert_eq!(ctx.epoch(), *epoch);
        assert!(Arc::ptr_eq(ctx, &registry.get(*epoch).unwrap()));
    }
}

#[test]
fn test_failed_build_is_retried_by_next_caller() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let registry = EpochRegistry::with_builder(RegistryConfig::default(), move |epoch| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(EthashError::Allocation { what: "full dataset", bytes: 1 << 40 });
        }
        small_context(epoch, DatasetMode::Eager)
    });

    let err = registry.get_or_build(9).unwrap_err();
    assert!(matches!(err, EthashError::Allocation { .. }));
    assert!(registry.get(9).is_none());

    let ctx = registry.get_or_build(9).unwrap();
    assert!(ctx.is_full());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(registry.stats().failures, 1);
    assert_eq!(registry.stats().builds, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Eviction
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_budget_evicts_idle_eager_contexts() {
    let per_context = 211 * 64 + 1021 * 128;
    let config = RegistryConfig {
        memory_budget_bytes: per_context * 2,
        max_contexts: 8,
        dataset_mode: DatasetMode::Eager,
        build_threads: 2,
    };
    let registry =
        EpochRegistry::with_builder(config, |epoch| small_context(epoch, DatasetMode::Eager));

    let pinned = registry.get_or_build(100).unwrap();
    for epoch in 101..106 {
        registry.get_or_build(epoch).unwrap();
    }

    // The pinned context survives; only the newest idle one fits beside it
    assert_eq!(registry.epochs(), vec![100, 105]);
    assert_eq!(registry.memory_usage(), per_context * 2);
    assert_eq!(registry.stats().evictions, 4);
    assert_eq!(pinned.memory_usage(), per_context);

    // Results from a pinned context stay usable after invalidation
    let header = Hash256::from_bytes([7u8; 32]);
    let before = pinned.hash(&header, 1);
    assert!(registry.invalidate(100));
    assert_eq!(pinned.hash(&header, 1), before);
}
