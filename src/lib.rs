//! Time-weighted average (TWAP) aggregation for parallel GROUP BY engines.
//!
//! Computes `sum(value_i * (ts_{i+1} - ts_i)) / (ts_last - ts_first)` per group, treating
//! each value as held constant until the next observation. When every observation of a
//! group sits on the same timestamp, the result falls back to the arithmetic mean.
//!
//! A running weighted sum cannot be kept per worker: workers steal non-adjacent page frames,
//! so a worker seeing frames 0, 4 and 8 would bridge gaps that belong to other workers.
//! Instead every worker buffers raw `(timestamp, value)` observations per group in its own
//! [`Arena`], the partial buffers are merged pairwise with a linear merge step, and the
//! step function is integrated once over the fully sorted buffer.
//!
//! ```
//! use twap::{Executor, Table, TwapFactory};
//!
//! let table = Table::builder()
//!     .symbol_column(vec!["A", "B", "A", "B", "A"])
//!     .f64_column(vec![10.0, 100.0, 20.0, 200.0, 30.0])
//!     .timestamp_column(vec![0, 0, 10_000_000, 20_000_000, 30_000_000])
//!     .build()?;
//!
//! let rows = Executor::builder()
//!     .workers(2)
//!     .frame_size(2)
//!     .group_by(0)
//!     .function(TwapFactory::new(1, 2))
//!     .build()?
//!     .run(&table)?;
//!
//! assert_eq!(rows[0].key.as_deref(), Some("A"));
//! assert_eq!(rows[0].values[0], 16.666_666_666_666_668);
//! assert_eq!(rows[1].values[0], 100.0);
//!
//! # Ok::<(), twap::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![warn(clippy::result_unit_err)]

mod agg;
mod arena;
mod error;
mod executor;
mod executor_builder;
mod map_value;
mod observation;
mod record;
mod table;

/// Timestamp in microseconds.
pub type Timestamp = i64;

type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;

pub use agg::twap::{TwapFactory, TwapFunction};
pub use agg::{GroupByFunction, GroupByFunctionFactory, SampleByFill};
pub use arena::{Arena, BufferHandle};
pub use error::{Error, Result};
pub use executor::{Executor, GroupRow};
pub use executor_builder::Builder as ExecutorBuilder;
pub use map_value::{ColumnType, MapValue, ValueTypes};
pub use observation::{Observation, ENTRY_SIZE, TIMESTAMP_NULL};
pub use record::{Column, Function, Record};
pub use table::{Table, TableBuilder, TableColumn, TableRecord};
