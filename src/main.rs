use std::time::Instant;
use twap::{Executor, Table, Timestamp, TwapFactory};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> twap::Result<()> {
    env_logger::builder()
        .filter_module("twap", log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    let row_count = 2_000_000;

    let start = Instant::now();

    let table = {
        use rand::Rng;

        let mut rng = rand::thread_rng();

        let mut syms = Vec::with_capacity(row_count);
        let mut prices = Vec::with_capacity(row_count);
        let mut timestamps = Vec::with_capacity(row_count);

        for idx in 0..row_count {
            syms.push(["A", "B", "C", "D", "E"][rng.gen_range(0..5)]);

            // Every 10th price is missing
            prices.push(if rng.gen_ratio(1, 10) {
                f64::NAN
            } else {
                rng.gen_range(0.0..100.0)
            });

            #[allow(clippy::cast_possible_wrap)]
            timestamps.push(idx as Timestamp * 1_000);
        }

        Table::builder()
            .symbol_column(syms)
            .f64_column(prices)
            .timestamp_column(timestamps)
            .build()?
    };

    log::info!("generated {row_count} rows in {:?}", start.elapsed());

    for workers in [1, 2, 4, 8] {
        let executor = Executor::builder()
            .workers(workers)
            .frame_size(100_000)
            .group_by(0)
            .function(TwapFactory::new(1, 2))
            .build()?;

        let start = Instant::now();
        let rows = executor.run(&table)?;

        log::info!("{workers} workers done in {:?}", start.elapsed());
        log::info!("TWAP result: {rows:#?}");
    }

    Ok(())
}
