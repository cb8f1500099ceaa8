use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use twap::{
    Arena, Column, ColumnType, Executor, GroupByFunction, Record, Table, TwapFactory, ValueTypes,
};

fn table(rows: usize, symbols: &[&'static str]) -> Table {
    Table::builder()
        .symbol_column((0..rows).map(|x| symbols[x % symbols.len()]).collect())
        .f64_column((0..rows).map(|x| (x % 100) as f64).collect())
        .timestamp_column((0..rows as i64).map(|x| x * 1_000).collect())
        .build()
        .unwrap()
}

fn accumulate(c: &mut Criterion) {
    let table = table(100_000, &["A"]);

    c.bench_function("accumulate 100k rows", |b| {
        b.iter(|| {
            let mut func = TwapFactory::new(1, 2).create();
            let mut types = ValueTypes::new();
            func.init_value_types(&mut types);
            func.set_allocator(Arena::with_capacity(4 * 1_024 * 1_024));

            let mut value = types.new_value();
            func.compute_first(&mut value, &table.record(0));
            for row in 1..table.row_count() {
                func.compute_next(&mut value, &table.record(row));
            }
            value
        });
    });
}

fn merge(c: &mut Criterion) {
    let table = table(200_000, &["A"]);

    let build = |rows: std::ops::Range<usize>| {
        let mut func = TwapFactory::with_functions(Arc::new(Column(1)), Arc::new(Column(2))).create();
        let mut types = ValueTypes::new();
        types.add(ColumnType::Long);
        func.init_value_types(&mut types);

        let mut value = types.new_value();
        func.set_null(&mut value);
        for row in rows.step_by(2) {
            func.compute_next(&mut value, &table.record(row));
        }
        (func, value)
    };

    let (src, src_value) = build(1..200_000);

    c.bench_function("merge 2 x 100k observations", |b| {
        b.iter_batched(
            || build(0..200_000),
            |(mut dest, mut dest_value)| {
                dest.merge(&mut dest_value, &src_value, src.allocator());
                dest.get_f64(&dest_value)
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

fn executor(c: &mut Criterion) {
    let table = table(1_000_000, &["A", "B", "C", "D", "E"]);

    for workers in [1, 4] {
        let executor = Executor::builder()
            .workers(workers)
            .frame_size(10_000)
            .group_by(0)
            .function(TwapFactory::new(1, 2))
            .build()
            .unwrap();

        c.bench_function(&format!("group by 1M rows ({workers} workers)"), |b| {
            b.iter(|| executor.run(&table).unwrap());
        });
    }
}

fn record(c: &mut Criterion) {
    let table = table(1, &["A"]);

    c.bench_function("read record", |b| {
        b.iter(|| table.record(0).get_f64(1));
    });
}

criterion_group!(benches, accumulate, merge, executor, record);
criterion_main!(benches);
