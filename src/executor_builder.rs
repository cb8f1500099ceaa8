use crate::{Executor, GroupByFunctionFactory};
use std::sync::Arc;

/// Builder for [`Executor`].
pub struct Builder {
    workers: usize,
    frame_size: usize,
    group_by: Option<usize>,
    factories: Vec<Arc<dyn GroupByFunctionFactory>>,
    arena_capacity: usize,
}

impl Builder {
    pub(crate) fn new() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            frame_size: 1_024,
            group_by: None,
            factories: vec![],
            arena_capacity: 64 * 1_024,
        }
    }

    /// Sets the number of workers accumulating in parallel.
    ///
    /// Default = available parallelism
    #[must_use]
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    /// Sets the number of rows per page frame, the unit of work handed to a worker.
    ///
    /// Default = 1024
    #[must_use]
    pub fn frame_size(mut self, rows: usize) -> Self {
        self.frame_size = rows;
        self
    }

    /// Groups rows by a symbol column.
    ///
    /// Without a group key, all rows fall into one group.
    #[must_use]
    pub fn group_by(mut self, col: usize) -> Self {
        self.group_by = Some(col);
        self
    }

    /// Sets the initial size of the arena each worker hands to each function.
    ///
    /// The arena grows past it as needed.
    ///
    /// Default = 64 KiB
    #[must_use]
    pub fn arena_capacity(mut self, bytes: usize) -> Self {
        self.arena_capacity = bytes;
        self
    }

    /// Adds an aggregate function; output values follow the order functions were added in.
    #[must_use]
    pub fn function<F: GroupByFunctionFactory + 'static>(mut self, factory: F) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Validates the configuration and creates the executor.
    ///
    /// # Errors
    ///
    /// Returns error if there are no workers, frames are empty, or no function was added.
    pub fn build(self) -> crate::Result<Executor> {
        if self.workers == 0 {
            return Err(crate::Error::InvalidConfig("workers must be at least 1"));
        }
        if self.frame_size == 0 {
            return Err(crate::Error::InvalidConfig("frame size must be at least 1"));
        }
        if self.factories.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "at least one aggregate function is required",
            ));
        }

        Ok(Executor {
            workers: self.workers,
            frame_size: self.frame_size,
            group_by: self.group_by,
            factories: self.factories,
            arena_capacity: self.arena_capacity,
        })
    }
}
