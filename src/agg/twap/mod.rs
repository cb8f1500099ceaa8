mod buffer;
mod compute;
mod merge;

use super::{GroupByFunction, GroupByFunctionFactory, SampleByFill};
use crate::{Arena, Column, ColumnType, Function, MapValue, Observation, Record, ValueTypes};
use buffer::{Buffer, SLOT_COUNT};
use compute::ResultCache;
use std::sync::Arc;

/// Time-weighted average aggregate function.
///
/// Buffers every valid `(timestamp, value)` observation of a group in the
/// instance's [`Arena`], in arrival order. Within one worker, frames are
/// processed chronologically, so each buffer is sorted by timestamp. Partial
/// buffers of different workers are combined with a linear merge step, and the
/// step function is integrated when the value is read:
///
/// ```text
/// TWAP = sum(value_i * (ts_{i+1} - ts_i)) / (ts_last - ts_first)
/// ```
///
/// The instance is not thread-safe: every worker needs its own instance
/// (and with it, its own arena). Use [`TwapFactory`] to create them.
pub struct TwapFunction {
    value_func: Arc<dyn Function>,
    ts_func: Arc<dyn Function>,
    arena: Arena,
    cache: ResultCache,
    value_index: usize,

    #[cfg(test)]
    scans: usize,
}

impl TwapFunction {
    /// Creates a function reading values from `value_func` and timestamps from `ts_func`.
    #[must_use]
    pub fn new(value_func: Arc<dyn Function>, ts_func: Arc<dyn Function>) -> Self {
        Self {
            value_func,
            ts_func,
            arena: Arena::new(),
            cache: ResultCache::default(),
            value_index: 0,

            #[cfg(test)]
            scans: 0,
        }
    }

    /// Value provider.
    #[must_use]
    pub fn left(&self) -> &Arc<dyn Function> {
        &self.value_func
    }

    /// Timestamp provider.
    #[must_use]
    pub fn right(&self) -> &Arc<dyn Function> {
        &self.ts_func
    }

    fn read(&self, rec: &dyn Record) -> Observation {
        Observation::new(self.ts_func.get_timestamp(rec), self.value_func.get_f64(rec))
    }
}

impl std::fmt::Debug for TwapFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "twap({:?}, {:?})@{}",
            self.value_func, self.ts_func, self.value_index
        )
    }
}

impl GroupByFunction for TwapFunction {
    fn name(&self) -> &'static str {
        "twap"
    }

    fn init_value_types(&mut self, types: &mut ValueTypes) {
        self.value_index = types.column_count();

        for _ in 0..SLOT_COUNT {
            types.add(ColumnType::Long);
        }
    }

    fn init_value_index(&mut self, idx: usize) {
        self.value_index = idx;
    }

    fn value_index(&self) -> usize {
        self.value_index
    }

    fn set_allocator(&mut self, arena: Arena) {
        self.arena = arena;
        self.cache.clear();
    }

    fn allocator(&self) -> &Arena {
        &self.arena
    }

    fn compute_first(&mut self, value: &mut MapValue, rec: &dyn Record) {
        self.cache.clear();

        let obs = self.read(rec);
        Buffer::first(&mut self.arena, obs).store(value, self.value_index);
    }

    fn compute_next(&mut self, value: &mut MapValue, rec: &dyn Record) {
        let obs = self.read(rec);
        if !obs.is_valid() {
            return;
        }

        let mut buf = Buffer::load(value, self.value_index);
        buf.push(&mut self.arena, obs);
        buf.store(value, self.value_index);
    }

    fn merge(&mut self, dest: &mut MapValue, src: &MapValue, src_arena: &Arena) {
        let src = Buffer::load(src, self.value_index);
        if src.is_empty() {
            return;
        }

        let dest_buf = Buffer::load(dest, self.value_index);
        merge::merge(&mut self.arena, dest_buf, src, src_arena).store(dest, self.value_index);
    }

    fn set_null(&mut self, value: &mut MapValue) {
        Buffer::EMPTY.store(value, self.value_index);
    }

    fn get_f64(&mut self, value: &MapValue) -> f64 {
        let buf = Buffer::load(value, self.value_index);
        if buf.is_empty() {
            return f64::NAN;
        }

        if let Some(value) = self.cache.get(&buf) {
            return value;
        }

        #[cfg(test)]
        {
            self.scans += 1;
        }

        let result = compute::compute(&buf, &self.arena);
        self.cache.put(&buf, result);
        result
    }

    fn supports_parallelism(&self) -> bool {
        true
    }

    fn is_thread_safe(&self) -> bool {
        // NOTE: Instances own a non-synchronized arena
        false
    }

    fn sample_by_flags(&self) -> SampleByFill {
        SampleByFill::ALL
    }
}

/// Creates [`TwapFunction`] instances, one per worker.
#[derive(Clone, Debug)]
pub struct TwapFactory {
    value_func: Arc<dyn Function>,
    ts_func: Arc<dyn Function>,
}

impl TwapFactory {
    /// Reads values and timestamps straight from two input columns.
    #[must_use]
    pub fn new(value_col: usize, ts_col: usize) -> Self {
        Self::with_functions(Arc::new(Column(value_col)), Arc::new(Column(ts_col)))
    }

    /// Reads values and timestamps through arbitrary value providers.
    #[must_use]
    pub fn with_functions(value_func: Arc<dyn Function>, ts_func: Arc<dyn Function>) -> Self {
        Self {
            value_func,
            ts_func,
        }
    }

    /// Creates a concrete instance.
    #[must_use]
    pub fn create(&self) -> TwapFunction {
        TwapFunction::new(self.value_func.clone(), self.ts_func.clone())
    }
}

impl GroupByFunctionFactory for TwapFactory {
    fn new_instance(&self) -> Box<dyn GroupByFunction> {
        Box::new(self.create())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Timestamp, TIMESTAMP_NULL};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use test_log::test;

    /// Single input row: column 0 = value, column 1 = timestamp
    struct Row(f64, Timestamp);

    impl Record for Row {
        fn get_f64(&self, col: usize) -> f64 {
            match col {
                0 => self.0,
                _ => f64::NAN,
            }
        }

        fn get_i64(&self, col: usize) -> i64 {
            match col {
                1 => self.1,
                _ => TIMESTAMP_NULL,
            }
        }

        fn get_symbol(&self, _: usize) -> Option<&str> {
            None
        }
    }

    /// One worker's function instance with its group record
    struct Partial {
        func: TwapFunction,
        value: MapValue,
    }

    impl Partial {
        fn new() -> Self {
            let mut func = TwapFactory::new(0, 1).create();
            let mut types = ValueTypes::new();

            // NOTE: Some other function's slot in front of ours
            types.add(ColumnType::Long);
            func.init_value_types(&mut types);
            func.set_allocator(Arena::new());

            let mut value = types.new_value();
            func.set_null(&mut value);

            Self { func, value }
        }

        fn accumulate(rows: &[(Timestamp, f64)]) -> Self {
            let mut partial = Self::new();

            for (idx, &(ts, value)) in rows.iter().enumerate() {
                let row = Row(value, ts);
                if idx == 0 {
                    partial.func.compute_first(&mut partial.value, &row);
                } else {
                    partial.func.compute_next(&mut partial.value, &row);
                }
            }

            partial
        }

        fn merge(&mut self, src: &Self) {
            self.func
                .merge(&mut self.value, &src.value, src.func.allocator());
        }

        fn get(&mut self) -> f64 {
            self.func.get_f64(&self.value)
        }
    }

    fn sorted_twap(rows: &[(Timestamp, f64)]) -> f64 {
        let mut rows = rows
            .iter()
            .copied()
            .filter(|&(ts, value)| !value.is_nan() && ts != TIMESTAMP_NULL)
            .collect::<Vec<_>>();
        rows.sort_by_key(|&(ts, _)| ts);
        compute::integrate(rows.into_iter().map(|(ts, value)| Observation::new(ts, value)))
    }

    #[test]
    fn twap_flags() {
        let func = TwapFactory::new(0, 1).create();

        assert_eq!("twap", func.name());
        assert!(func.supports_parallelism());
        assert!(!func.is_thread_safe());
        assert!(!func.is_constant());
        assert_eq!(SampleByFill::ALL, func.sample_by_flags());
        assert!(func.sample_by_flags().contains(SampleByFill::PREV));
    }

    #[test]
    fn twap_value_types() {
        let mut func = TwapFactory::new(0, 1).create();
        let mut types = ValueTypes::new();
        types.add(ColumnType::Long);
        types.add(ColumnType::Long);

        func.init_value_types(&mut types);

        assert_eq!(2, func.value_index());
        assert_eq!(5, types.column_count());

        func.init_value_index(7);
        assert_eq!(7, func.value_index());
    }

    #[test]
    fn twap_basic() {
        let mut partial =
            Partial::accumulate(&[(0, 10.0), (10_000_000, 20.0), (30_000_000, 30.0)]);
        assert_eq!(16.666_666_666_666_668, partial.get());
    }

    #[test]
    fn twap_single_row() {
        let mut partial = Partial::accumulate(&[(0, 42.5)]);
        assert_eq!(42.5, partial.get());
    }

    #[test]
    fn twap_all_null() {
        let mut partial = Partial::accumulate(&[
            (0, f64::NAN),
            (10_000_000, f64::NAN),
            (20_000_000, f64::NAN),
        ]);
        assert!(partial.get().is_nan());
        assert_eq!(0, partial.func.allocator().allocated_bytes());
    }

    #[test]
    fn twap_no_rows() {
        let mut partial = Partial::new();
        assert!(partial.get().is_nan());
    }

    #[test]
    fn twap_all_same_timestamp() {
        let mut partial = Partial::accumulate(&[(0, 10.0), (0, 20.0), (0, 30.0)]);
        assert_eq!(20.0, partial.get());
    }

    #[test]
    fn twap_some_null() {
        let mut partial =
            Partial::accumulate(&[(0, 10.0), (10_000_000, f64::NAN), (20_000_000, 30.0)]);
        assert_eq!(10.0, partial.get());
    }

    #[test]
    fn twap_null_timestamp() {
        let mut partial = Partial::accumulate(&[
            (TIMESTAMP_NULL, 10.0),
            (10_000_000, 20.0),
            (TIMESTAMP_NULL, 30.0),
            (30_000_000, 40.0),
        ]);
        assert_eq!(20.0, partial.get());
    }

    #[test]
    fn twap_memoized() {
        let mut partial =
            Partial::accumulate(&[(0, 10.0), (10_000_000, 20.0), (30_000_000, 30.0)]);

        let first = partial.get();
        let second = partial.get();

        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(1, partial.func.scans);
    }

    #[test]
    fn twap_memo_invalidated_by_merge() {
        let mut dest = Partial::accumulate(&[(0, 10.0), (10, 20.0)]);
        let src = Partial::accumulate(&[(20, 40.0)]);

        assert_eq!(10.0, dest.get());

        dest.merge(&src);
        assert_eq!(15.0, dest.get());
        assert_eq!(2, dest.func.scans);
    }

    #[test]
    fn twap_memo_invalidated_by_append() {
        let mut partial = Partial::accumulate(&[(0, 10.0), (10, 20.0)]);
        assert_eq!(10.0, partial.get());

        partial
            .func
            .compute_next(&mut partial.value, &Row(40.0, 20));
        assert_eq!(15.0, partial.get());
    }

    #[test]
    fn twap_merge_empty_src() {
        let mut dest = Partial::accumulate(&[(0, 10.0), (10_000_000, 20.0), (30_000_000, 30.0)]);
        let before = dest.value.clone();

        dest.merge(&Partial::accumulate(&[(5, f64::NAN)]));
        dest.merge(&Partial::new());

        assert_eq!(before, dest.value);
        assert_eq!(16.666_666_666_666_668, dest.get());
    }

    #[test]
    fn twap_merge_into_empty_dest() {
        let mut dest = Partial::accumulate(&[(0, f64::NAN)]);
        let src = Partial::accumulate(&[(0, 10.0), (10_000_000, 20.0), (30_000_000, 30.0)]);

        dest.merge(&src);

        let dest_buf = Buffer::load(&dest.value, dest.func.value_index());
        let src_buf = Buffer::load(&src.value, src.func.value_index());
        assert_ne!(dest_buf.ptr, src_buf.ptr);
        assert!(dest_buf.ptr.is_some_and(|ptr| dest.func.allocator().owns(ptr)));
        assert_eq!(
            src_buf.iter(src.func.allocator()).collect::<Vec<_>>(),
            dest_buf.iter(dest.func.allocator()).collect::<Vec<_>>(),
        );

        drop(src);
        assert_eq!(16.666_666_666_666_668, dest.get());
    }

    #[test]
    fn twap_merge_chunked_worker() {
        // Worker 0 sees frames 0 and 2, worker 1 sees frame 1
        let mut worker_0 = Partial::accumulate(&[(0, 10.0), (1, 10.0), (4, 30.0), (5, 30.0)]);
        let worker_1 = Partial::accumulate(&[(2, 20.0), (3, 20.0)]);

        worker_0.merge(&worker_1);

        // 10 * 2 + 20 * 2 + 30 * 1 = 90 over 5
        assert_eq!(18.0, worker_0.get());
    }

    #[test]
    fn twap_null_skipping_invariant() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let len = rng.gen_range(1..60);
            let mut ts = 0;
            let mut clean = vec![];
            let mut noisy = vec![];

            for _ in 0..len {
                ts += rng.gen_range(0..1_000);
                let obs = (ts, rng.gen_range(0.0..100.0));
                clean.push(obs);
                noisy.push(obs);

                match rng.gen_range(0..4) {
                    0 => noisy.push((ts + 1, f64::NAN)),
                    1 => noisy.push((TIMESTAMP_NULL, 1.0)),
                    _ => {}
                }
            }

            if rng.gen_bool(0.5) {
                noisy.insert(0, (0, f64::NAN));
            }

            let clean = Partial::accumulate(&clean).get();
            let noisy = Partial::accumulate(&noisy).get();

            assert_eq!(clean.to_bits(), noisy.to_bits());
        }
    }

    #[test]
    fn twap_order_invariance() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let len = rng.gen_range(0..300);
            let workers = rng.gen_range(1..6);

            // NOTE: Distinct timestamps, so ties cannot reorder equal keys
            let mut ts = 0;
            let rows = (0..len)
                .map(|_| {
                    ts += rng.gen_range(1..1_000);
                    (ts, rng.gen_range(0.0..100.0))
                })
                .collect::<Vec<_>>();

            // Deal contiguous frames round-robin, so every worker stays sorted
            let mut chunks = vec![vec![]; workers];
            for (idx, frame) in rows.chunks(7).enumerate() {
                chunks[idx % workers].extend_from_slice(frame);
            }

            let mut partials = chunks
                .iter()
                .map(|rows| Partial::accumulate(rows))
                .collect::<Vec<_>>();

            // Random association order
            while partials.len() > 1 {
                let src = partials.swap_remove(rng.gen_range(0..partials.len()));
                let dest = rng.gen_range(0..partials.len());
                partials[dest].merge(&src);
            }

            let actual = partials[0].get();
            let expected = sorted_twap(&rows);

            if expected.is_nan() {
                assert!(actual.is_nan());
            } else {
                assert_eq!(expected.to_bits(), actual.to_bits());
            }
        }
    }
}
