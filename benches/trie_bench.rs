//! Build and query benchmarks for the LOUDS trie

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use loudtrie::{Agent, Config, Keyset, LoudsTrie, NodeOrder};

fn random_keys(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys = std::collections::HashSet::new();
    while keys.len() < count {
        let len = rng.gen_range(4..20);
        let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect();
        keys.insert(key);
    }
    keys.into_iter().collect()
}

fn build_trie(keys: &[Vec<u8>], flags: u32) -> LoudsTrie {
    let mut keyset = Keyset::new();
    for key in keys {
        keyset.push(key).unwrap();
    }
    let mut trie = LoudsTrie::new();
    trie.build(&mut keyset, flags).unwrap();
    trie
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &count in &[1_000usize, 10_000] {
        let keys = random_keys(count, 1);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &keys, |b, keys| {
            b.iter(|| build_trie(black_box(keys), 0));
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let keys = random_keys(10_000, 2);
    let label_flags = Config::builder()
        .node_order(NodeOrder::Label)
        .build()
        .unwrap()
        .flags();

    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(keys.len() as u64));
    for (name, flags) in [("weight_order", 0u32), ("label_order", label_flags)] {
        let trie = build_trie(&keys, flags);
        group.bench_function(name, |b| {
            let mut agent = Agent::new();
            b.iter(|| {
                let mut hits = 0usize;
                for key in &keys {
                    agent.set_query(black_box(key));
                    if trie.lookup(&mut agent).unwrap() {
                        hits += 1;
                    }
                }
                hits
            });
        });
    }
    group.finish();
}

fn bench_mapped_lookup(c: &mut Criterion) {
    let keys = random_keys(10_000, 3);
    let trie = build_trie(&keys, 0);
    let image = trie.to_bytes().unwrap();
    let mapped = LoudsTrie::map_bytes(&image).unwrap();

    c.bench_function("lookup/mapped", |b| {
        let mut agent = Agent::new();
        b.iter(|| {
            let mut hits = 0usize;
            for key in keys.iter().step_by(10) {
                agent.set_query(black_box(key));
                if mapped.lookup(&mut agent).unwrap() {
                    hits += 1;
                }
            }
            hits
        });
    });
}

fn bench_predictive(c: &mut Criterion) {
    let keys = random_keys(10_000, 4);
    let trie = build_trie(&keys, 0);

    c.bench_function("predictive_search/two_byte_prefix", |b| {
        let mut agent = Agent::new();
        b.iter(|| {
            let mut total = 0usize;
            agent.set_query(b"ab");
            while trie.predictive_search(&mut agent).unwrap() {
                total += agent.key().len();
            }
            total
        });
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_lookup,
    bench_mapped_lookup,
    bench_predictive
);
criterion_main!(benches);
