//! Criterion benchmarks for the lookup paths every packet takes:
//! content-store matching and FIB longest-prefix match.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nnnsim::nnnsim_common::metrics::NodeMetrics;
use nnnsim::nnnsim_common::{FaceId, NodeId};
use nnnsim::nnnsim_core::config::ContentStoreConfig;
use nnnsim::nnnsim_core::trie::Trie;
use nnnsim::nnnsim_core::{create_content_store, EventQueue, Fib, PolicyRegistry, Tracer};
use nnnsim::{Data, Interest, Name};
use std::sync::Arc;

fn prefix(i: usize) -> Name {
    format!("/site{}/app{}/data", i % 64, i).parse().unwrap()
}

fn bench_trie(c: &mut Criterion) {
    let mut group = c.benchmark_group("trie_lpm");
    for size in [100usize, 1_000, 10_000] {
        let mut trie: Trie<_, usize> = Trie::new();
        for i in 0..size {
            trie.insert(prefix(i).components(), i);
        }
        let key = prefix(size / 2).append_seq_num(7);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(trie.longest_prefix_match(key.components())))
        });
    }
    group.finish();
}

fn bench_fib(c: &mut Criterion) {
    let mut fib = Fib::new();
    for i in 0..1_000 {
        fib.add(&prefix(i), FaceId((i % 8) as u32), 1);
    }
    let hit = prefix(500).append_seq_num(3);
    let miss: Name = "/nowhere/at/all".parse().unwrap();

    c.bench_function("fib_lpm_hit", |b| {
        b.iter(|| black_box(fib.longest_prefix_match(&hit)))
    });
    c.bench_function("fib_lpm_miss", |b| {
        b.iter(|| black_box(fib.longest_prefix_match(&miss)))
    });
}

fn bench_content_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("cs_lookup");
    for policy in ["Lru", "Lfu", "Random"] {
        let config = ContentStoreConfig {
            policy: policy.into(),
            max_size: 1_000,
            ..Default::default()
        };
        let mut cs = create_content_store(
            &config,
            &PolicyRegistry::new(),
            Tracer::new(NodeId(0)),
            Arc::new(NodeMetrics::new()),
        )
        .unwrap();
        let mut queue = EventQueue::new();
        let mut sched = queue.for_node(NodeId(0));
        for i in 0..1_000 {
            cs.add(&Data::new(prefix(i).append_seq_num(0), &b"payload"[..]), &mut sched);
        }
        let interest = Interest::new(prefix(250).append_seq_num(0));

        group.bench_function(policy, |b| {
            b.iter(|| black_box(cs.lookup(&interest, &mut sched)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_trie, bench_fib, bench_content_store);
criterion_main!(benches);
