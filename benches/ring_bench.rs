use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sqlload::ring::RingHistory;

fn bench_add_and_sleep_time(c: &mut Criterion) {
    let mut ring = RingHistory::new(10_000);
    let mut t = 0i64;
    for _ in 0..10_000 {
        ring.add(t, t + 5_000_000);
        t += 5_000_000;
    }

    c.bench_function("ring_add", |b| {
        b.iter(|| {
            ring.add(black_box(t), black_box(t + 5_000_000));
            t += 5_000_000;
        });
    });

    c.bench_function("ring_sleep_time", |b| {
        b.iter(|| black_box(ring.sleep_time_ns(black_box(10_000_000))));
    });
}

criterion_group!(benches, bench_add_and_sleep_time);
criterion_main!(benches);
