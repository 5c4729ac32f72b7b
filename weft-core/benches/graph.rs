use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_core::{batch, diff, Effect, Memo, State, Value};

fn bench_diamond_write(c: &mut Criterion) {
    let x = State::new(0_i64);
    let a = Memo::new(move || x.get() + 1);
    let b = Memo::new(move || x.get() + 2);
    let tail = Memo::new(move || a.get().unwrap_or(0) + b.get().unwrap_or(0));

    c.bench_function("diamond_write_and_pull", |bench| {
        let mut counter = 0_i64;
        bench.iter(|| {
            counter += 1;
            x.set(black_box(counter)).unwrap();
            black_box(tail.get().unwrap())
        })
    });
}

fn bench_chain_pull_clean(c: &mut Criterion) {
    let x = State::new(0_i64);
    let mut head = Memo::new(move || x.get());
    for _ in 0..32 {
        let prev = head;
        head = Memo::new(move || prev.get().unwrap_or(0) + 1);
    }
    head.get().unwrap();

    // No writes between pulls: measures the clean-read fast path.
    c.bench_function("chain_pull_clean_32", |bench| {
        bench.iter(|| black_box(head.get().unwrap()))
    });
}

fn bench_batched_effect(c: &mut Criterion) {
    let x = State::new(0_i64);
    let _effect = Effect::new(move || {
        black_box(x.get());
    });

    c.bench_function("batch_ten_writes_one_flush", |bench| {
        let mut counter = 0_i64;
        bench.iter(|| {
            batch(|| {
                for _ in 0..10 {
                    counter += 1;
                    x.set(counter).unwrap();
                }
            });
        })
    });
}

fn bench_diff_records(c: &mut Criterion) {
    let old = Value::record((0..64).map(|i| (format!("key{i}"), Value::from(i))));
    let new = Value::record(
        (0..64).map(|i| (format!("key{i}"), Value::from(if i % 8 == 0 { i + 1 } else { i }))),
    );

    c.bench_function("diff_64_keys", |bench| {
        bench.iter(|| black_box(diff(black_box(&old), black_box(&new)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_diamond_write,
    bench_chain_pull_clean,
    bench_batched_effect,
    bench_diff_records
);
criterion_main!(benches);
