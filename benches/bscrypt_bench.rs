//! Benchmark for the bscrypt KDF engine

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bscrypt::kdf::Params;

fn bench_small_memory(c: &mut Criterion) {
    let params = Params { memory_kib: 1024, iterations: 2, parallelism: 1 };
    let mut out = [0u8; 32];

    c.bench_function("bscrypt_1mib_single_lane", |b| {
        b.iter(|| {
            bscrypt::kdf(&mut out, black_box(b"benchmark password"), black_box(b"0123456789abcdef"), params, 1).unwrap();
            out
        })
    });
}

fn bench_parallel_lanes(c: &mut Criterion) {
    let params = Params { memory_kib: 1024, iterations: 2, parallelism: 4 };
    let mut out = [0u8; 32];

    c.bench_function("bscrypt_1mib_four_lanes", |b| {
        b.iter(|| {
            bscrypt::kdf(&mut out, black_box(b"benchmark password"), black_box(b"0123456789abcdef"), params, 4).unwrap();
            out
        })
    });
}

criterion_group!(benches, bench_small_memory, bench_parallel_lanes);
criterion_main!(benches);
