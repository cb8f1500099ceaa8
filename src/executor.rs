use crate::{
    executor_builder::Builder, table::TableColumn, Arena, GroupByFunction,
    GroupByFunctionFactory, MapValue, Record, Table, ValueTypes,
};
use rayon::prelude::*;
use std::{
    ops::Range,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// One output row: a group key and one value per aggregate function.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupRow {
    /// Group key, `None` when not grouping
    pub key: Option<String>,

    /// Aggregate values, `NaN` meaning no value
    pub values: Vec<f64>,
}

/// Parallel GROUP BY driver.
///
/// Splits the input into page frames which workers claim in ascending order,
/// so every worker sees its share of a group chronologically. Each worker
/// accumulates into its own partial map with its own function instances,
/// each handed a fresh [`Arena`] before the first row.
/// Partials are then merged pairwise until one remains.
pub struct Executor {
    pub(crate) workers: usize,
    pub(crate) frame_size: usize,
    pub(crate) group_by: Option<usize>,
    pub(crate) factories: Vec<Arc<dyn GroupByFunctionFactory>>,
    pub(crate) arena_capacity: usize,
}

/// One worker's accumulation state
struct Partial {
    functions: Vec<Box<dyn GroupByFunction>>,
    types: ValueTypes,
    map: crate::HashMap<String, MapValue>,

    /// Rows without a symbol, or every row when not grouping
    null_group: Option<MapValue>,
}

impl Partial {
    fn new(factories: &[Arc<dyn GroupByFunctionFactory>], arena_capacity: usize) -> Self {
        let mut types = ValueTypes::new();

        let functions = factories
            .iter()
            .map(|factory| {
                let mut func = factory.new_instance();
                func.init_value_types(&mut types);
                func.set_allocator(Arena::with_capacity(arena_capacity));
                func
            })
            .collect();

        Self {
            functions,
            types,
            map: crate::HashMap::default(),
            null_group: None,
        }
    }

    fn supports_parallelism(&self) -> bool {
        self.functions.iter().all(|func| func.supports_parallelism())
    }

    fn group_count(&self) -> usize {
        self.map.len() + usize::from(self.null_group.is_some())
    }

    fn accumulate(&mut self, table: &Table, rows: Range<usize>, group_by: Option<usize>) {
        for row in rows {
            self.accumulate_record(&table.record(row), group_by);
        }
    }

    fn accumulate_record(&mut self, rec: &dyn Record, group_by: Option<usize>) {
        let key = group_by.and_then(|col| rec.get_symbol(col));

        let existing = match key {
            Some(key) => self.map.get_mut(key),
            None => self.null_group.as_mut(),
        };

        if let Some(value) = existing {
            for func in &mut self.functions {
                func.compute_next(value, rec);
            }
            return;
        }

        let mut value = self.types.new_value();
        for func in &mut self.functions {
            func.compute_first(&mut value, rec);
        }

        match key {
            Some(key) => {
                self.map.insert(key.to_owned(), value);
            }
            None => self.null_group = Some(value),
        }
    }

    /// Folds `src` into `self`, dropping `src` (and its arenas) afterwards.
    fn merge(&mut self, src: Self) {
        let Self {
            functions: src_functions,
            map: src_map,
            null_group: src_null_group,
            ..
        } = src;

        let groups = src_map
            .into_iter()
            .map(|(key, value)| (Some(key), value))
            .chain(src_null_group.map(|value| (None, value)));

        for (key, src_value) in groups {
            let existing = match &key {
                Some(key) => self.map.get_mut(key),
                None => self.null_group.as_mut(),
            };

            if let Some(dest) = existing {
                for (func, src_func) in self.functions.iter_mut().zip(&src_functions) {
                    func.merge(dest, &src_value, src_func.allocator());
                }
                continue;
            }

            let mut dest = self.types.new_value();
            for (func, src_func) in self.functions.iter_mut().zip(&src_functions) {
                func.set_null(&mut dest);
                func.merge(&mut dest, &src_value, src_func.allocator());
            }

            match key {
                Some(key) => {
                    self.map.insert(key, dest);
                }
                None => self.null_group = Some(dest),
            }
        }
    }

    /// Reads the final values of every group, sorted by key, null key first.
    fn finish(self) -> Vec<GroupRow> {
        let Self {
            mut functions,
            map,
            null_group,
            ..
        } = self;

        let mut rows = null_group
            .map(|value| (None, value))
            .into_iter()
            .chain(map.into_iter().map(|(key, value)| (Some(key), value)))
            .map(|(key, value)| GroupRow {
                key,
                values: functions.iter_mut().map(|func| func.get_f64(&value)).collect(),
            })
            .collect::<Vec<_>>();

        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }
}

impl Executor {
    /// Starts configuring an executor.
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    fn reduce(mut partials: Vec<Partial>) -> Option<Partial> {
        while partials.len() > 1 {
            log::trace!("reducing {} partials", partials.len());

            let mut pairs = Vec::with_capacity(partials.len().div_ceil(2));
            let mut iter = partials.into_iter();

            while let Some(dest) = iter.next() {
                pairs.push((dest, iter.next()));
            }

            partials = pairs
                .into_par_iter()
                .map(|(mut dest, src)| {
                    if let Some(src) = src {
                        dest.merge(src);
                    }
                    dest
                })
                .collect();
        }

        partials.pop()
    }

    /// Runs all aggregate functions over the table.
    ///
    /// Returns one row per group, sorted by group key. Without a group key,
    /// exactly one row is returned, even for an empty table. Rows whose group
    /// symbol is missing form their own group with key `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the group key column does not exist or is not a symbol column.
    pub fn run(&self, table: &Table) -> crate::Result<Vec<GroupRow>> {
        if let Some(col) = self.group_by {
            if !matches!(table.column(col), Some(TableColumn::Symbol(_))) {
                return Err(crate::Error::UnknownColumn(col));
            }
        }

        let frame_count = table.frame_count(self.frame_size);

        let first = Partial::new(&self.factories, self.arena_capacity);
        let workers = if first.supports_parallelism() {
            self.workers.min(frame_count).max(1)
        } else {
            log::debug!("function without merge support, running on a single worker");
            1
        };

        let mut partials = Vec::with_capacity(workers);
        partials.push(first);
        partials.extend((1..workers).map(|_| Partial::new(&self.factories, self.arena_capacity)));

        let next_frame = AtomicUsize::new(0);

        log::debug!(
            "aggregating {} rows in {frame_count} frames on {workers} workers",
            table.row_count()
        );

        let partials = partials
            .into_par_iter()
            .enumerate()
            .map(|(worker, mut partial)| {
                let mut frames = 0;

                loop {
                    let idx = next_frame.fetch_add(1, Ordering::Relaxed);
                    if idx >= frame_count {
                        break;
                    }

                    partial.accumulate(table, table.frame(idx, self.frame_size), self.group_by);
                    frames += 1;
                }

                log::trace!(
                    "worker {worker} accumulated {frames} frames into {} groups",
                    partial.group_count()
                );

                partial
            })
            .collect::<Vec<_>>();

        let Some(mut partial) = Self::reduce(partials) else {
            return Ok(vec![]);
        };

        if self.group_by.is_none() && partial.null_group.is_none() {
            let mut value = partial.types.new_value();
            for func in &mut partial.functions {
                func.set_null(&mut value);
            }
            partial.null_group = Some(value);
        }

        let rows = partial.finish();

        log::debug!("aggregated {} groups", rows.len());

        Ok(rows)
    }
}
