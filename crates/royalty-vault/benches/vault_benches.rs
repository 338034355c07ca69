//! Criterion benchmarks for the revenue vault.
//!
//! Covers: claimable_revenue over many snapshots and checkpointed share transfers.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use royalty_core::config::{RoyaltyConfig, RoyaltySettings};
use royalty_core::types::{Address, EntityId, TokenId};
use royalty_vault::RevenueVault;

const T0: u64 = 1_700_000_000;

fn config(token: TokenId) -> RoyaltyConfig {
    let settings = RoyaltySettings {
        snapshot_interval_secs: 1,
        whitelisted_tokens: vec![token],
        ..RoyaltySettings::default()
    };
    RoyaltyConfig::from_settings(&settings).unwrap()
}

/// A vault with `snapshots` snapshots of revenue, with a share transfer
/// between each so every holder carries checkpoints.
fn busy_vault(snapshots: u64) -> RevenueVault {
    let token = TokenId([0x55; 32]);
    let cfg = config(token);
    let mut vault = RevenueVault::new(EntityId([1; 32]), Address([1; 32]), T0);
    let mut balance = 0u64;
    for i in 1..=snapshots {
        vault
            .transfer_shares(&Address([1; 32]), &Address([2; 32]), 1_000)
            .unwrap();
        vault.deposit(&cfg, token, 10_000).unwrap();
        balance += 10_000;
        let balances = BTreeMap::from([(token, balance)]);
        vault.snapshot(&cfg, T0 + i, &balances).unwrap();
    }
    vault
}

fn bench_claimable_revenue(c: &mut Criterion) {
    let vault = busy_vault(256);
    let token = TokenId([0x55; 32]);
    let holder = Address([2; 32]);
    c.bench_function("claimable_revenue_256_snapshots", |b| {
        b.iter(|| vault.claimable_revenue(black_box(&holder), black_box(&token)).unwrap())
    });
}

fn bench_share_transfer(c: &mut Criterion) {
    c.bench_function("transfer_shares_checkpointed", |b| {
        b.iter_with_setup(
            || busy_vault(16),
            |mut vault| {
                vault
                    .transfer_shares(&Address([1; 32]), black_box(&Address([3; 32])), 5)
                    .unwrap();
            },
        )
    });
}

criterion_group!(benches, bench_claimable_revenue, bench_share_transfer);
criterion_main!(benches);
