// Lookup cost of an object key with 2, 8 and 18 properties, against maps
// keyed by a stable string encoding of the same key.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use equivalent_key_map::{EquivalentKeyMap, Key};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

const SIZES: [usize; 3] = [2, 8, 18];

// `{a: 0, b: 1, ...}` with `n` properties, inserted in reverse so the
// property order differs from the sorted order.
fn key(n: usize) -> Key {
    Key::object((0..n).rev().map(|j| (char::from(b'a' + j as u8).to_string(), j)))
}

fn stable_json(k: &Key) -> String {
    // serde_json's default map type keeps names sorted.
    Value::from(k).to_string()
}

fn stable_query(k: &Key) -> String {
    let mut out = String::new();
    if let Key::Object(props) = k {
        for (name, value) in props.iter() {
            if !out.is_empty() {
                out.push('&');
            }
            let _ = write!(out, "{}={}", name, Value::from(value));
        }
    }
    out
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    for n in SIZES {
        let k = key(n);

        let mut ekm = EquivalentKeyMap::new();
        ekm.set(k.clone(), 0u32);
        group.bench_with_input(BenchmarkId::new("equivalent_key_map/memoized", n), &k, |b, k| {
            b.iter(|| black_box(ekm.get(k)))
        });

        // Alternating between two equivalent references defeats the memo on
        // every call, so each lookup walks the tree.
        let refs = [key(n), key(n)];
        let mut turn = 0usize;
        group.bench_function(BenchmarkId::new("equivalent_key_map/fresh_reference", n), |b| {
            b.iter(|| {
                turn ^= 1;
                black_box(ekm.get(&refs[turn]))
            })
        });

        let mut json: HashMap<String, u32> = HashMap::new();
        json.insert(stable_json(&k), 0);
        group.bench_with_input(BenchmarkId::new("stable_json_hashmap", n), &k, |b, k| {
            b.iter(|| black_box(json.get(&stable_json(k))))
        });

        let mut query: HashMap<String, u32> = HashMap::new();
        query.insert(stable_query(&k), 0);
        group.bench_with_input(BenchmarkId::new("stable_query_hashmap", n), &k, |b, k| {
            b.iter(|| black_box(query.get(&stable_query(k))))
        });
    }
    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    for n in SIZES {
        let mut ekm = EquivalentKeyMap::new();
        let mut i = 0u32;
        group.bench_function(BenchmarkId::new("equivalent_key_map/new_reference", n), |b| {
            b.iter(|| {
                i = i.wrapping_add(1);
                ekm.set(key(n), i);
            })
        });
    }
    group.finish();
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(3))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_get, bench_set
}
criterion_main!(benches);
