use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use sqlload::data_table::DataTable;
use sqlload::generator::ValueGenerator;
use std::sync::Arc;

fn bench_generators(c: &mut Criterion) {
    let data = Arc::new(DataTable::empty());
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);

    let int_gen = ValueGenerator::parse("{int,1,1000000}", Arc::clone(&data)).unwrap();
    c.bench_function("generator_int", |b| {
        b.iter(|| black_box(int_gen.next_value(&mut rng)));
    });

    let string_gen = ValueGenerator::parse("{string,8,32}", Arc::clone(&data)).unwrap();
    c.bench_function("generator_string", |b| {
        b.iter(|| black_box(string_gen.next_value(&mut rng)));
    });

    let date_gen = ValueGenerator::parse("{date,1990/01/01,2020/01/01}", Arc::clone(&data)).unwrap();
    c.bench_function("generator_date", |b| {
        b.iter(|| black_box(date_gen.next_value(&mut rng)));
    });
}

criterion_group!(benches, bench_generators);
criterion_main!(benches);
