//! Publish hot path: snapshot + dispatch over N subscribers.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nebula_pubsub::{Bus, BusConfig, KeyRegistry, StoreKind};

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    for store in [StoreKind::Locked, StoreKind::Sharded] {
        for subscribers in [0_usize, 1, 16] {
            let keys = KeyRegistry::new();
            let key = keys.key::<u64>("bench.tick").unwrap();
            let bus = Bus::with_config(BusConfig::default().with_store(store));
            for _ in 0..subscribers {
                bus.subscribe(&key, |n: &u64| {
                    black_box(n);
                });
            }

            group.bench_with_input(
                BenchmarkId::new(format!("{store:?}"), subscribers),
                &subscribers,
                |b, _| b.iter(|| bus.publish(&key, black_box(&42))),
            );
        }
    }

    group.finish();
}

fn bench_subscribe_dispose(c: &mut Criterion) {
    let keys = KeyRegistry::new();
    let key = keys.key::<u64>("bench.churn").unwrap();
    let bus = Bus::new();

    c.bench_function("subscribe_dispose", |b| {
        b.iter(|| {
            let sub = bus.subscribe(&key, |_: &u64| ());
            black_box(sub.dispose())
        });
    });
}

criterion_group!(benches, bench_publish, bench_subscribe_dispose);
criterion_main!(benches);
