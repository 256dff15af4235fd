use cow_collections::CowVec;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_push_back_100k(c: &mut Criterion) {
    c.bench_function("cow_vec::push_back_100k", |b| {
        b.iter(|| {
            let mut v = CowVec::new();
            for x in lcg(1).take(100_000) {
                v.push_back(x);
            }
            black_box(v)
        })
    });

    c.bench_function("std_vec::push_100k", |b| {
        b.iter(|| {
            let mut v = Vec::new();
            for x in lcg(1).take(100_000) {
                v.push(x);
            }
            black_box(v)
        })
    });
}

fn bench_clone_then_write(c: &mut Criterion) {
    let base: CowVec<String> = lcg(3).take(10_000).map(|x| format!("{x:016x}")).collect();

    c.bench_function("cow_vec::clone_read_10k", |b| {
        b.iter(|| {
            let copy = base.clone();
            black_box(copy.iter().map(String::len).sum::<usize>())
        })
    });

    c.bench_function("cow_vec::clone_first_write_10k", |b| {
        b.iter_batched(
            || base.clone(),
            |mut copy| {
                copy[0].push('!');
                black_box(copy)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_single_element(c: &mut Criterion) {
    // Inline storage: no heap traffic for the block itself.
    c.bench_function("cow_vec::single_push_pop_1m", |b| {
        b.iter(|| {
            let mut v = CowVec::new();
            for x in lcg(5).take(1_000_000) {
                v.push_back(x);
                black_box(v.pop_back());
            }
        })
    });
}

fn bench_insert_erase_middle(c: &mut Criterion) {
    c.bench_function("cow_vec::insert_erase_middle_1k_on_10k", |b| {
        b.iter_batched(
            || (0..10_000u64).collect::<CowVec<_>>(),
            |mut v| {
                for (i, x) in lcg(9).take(1_000).enumerate() {
                    let at = (x as usize) % v.len();
                    if i % 2 == 0 {
                        v.insert(at, x);
                    } else {
                        black_box(v.erase(at));
                    }
                }
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_push_back_100k, bench_clone_then_write, bench_single_element, bench_insert_erase_middle
}
criterion_main!(benches);
