use crate::{Record, Timestamp, TIMESTAMP_NULL};
use std::ops::Range;

/// One column of an in-memory table.
#[derive(Clone, Debug, PartialEq)]
pub enum TableColumn {
    /// Floats, `NaN` meaning null
    F64(Vec<f64>),

    /// Microsecond timestamps, [`TIMESTAMP_NULL`] meaning null
    Timestamp(Vec<Timestamp>),

    /// String keys
    Symbol(Vec<String>),
}

impl TableColumn {
    fn len(&self) -> usize {
        match self {
            Self::F64(v) => v.len(),
            Self::Timestamp(v) => v.len(),
            Self::Symbol(v) => v.len(),
        }
    }
}

/// Builder for [`Table`].
#[derive(Default)]
pub struct TableBuilder {
    columns: Vec<TableColumn>,
}

impl TableBuilder {
    /// Appends a float column.
    #[must_use]
    pub fn f64_column(mut self, values: Vec<f64>) -> Self {
        self.columns.push(TableColumn::F64(values));
        self
    }

    /// Appends a timestamp column.
    #[must_use]
    pub fn timestamp_column(mut self, values: Vec<Timestamp>) -> Self {
        self.columns.push(TableColumn::Timestamp(values));
        self
    }

    /// Appends a symbol column.
    #[must_use]
    pub fn symbol_column<S: Into<String>>(mut self, values: Vec<S>) -> Self {
        self.columns.push(TableColumn::Symbol(
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Builds the table.
    ///
    /// # Errors
    ///
    /// Returns error if the columns do not all have the same length.
    pub fn build(self) -> crate::Result<Table> {
        let row_count = self.columns.first().map_or(0, TableColumn::len);

        for column in &self.columns {
            if column.len() != row_count {
                return Err(crate::Error::ColumnMismatch {
                    expected: row_count,
                    actual: column.len(),
                });
            }
        }

        Ok(Table {
            columns: self.columns,
            row_count,
        })
    }
}

/// In-memory columnar table, rows in timestamp order.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<TableColumn>,
    row_count: usize,
}

impl Table {
    /// Starts building a table.
    #[must_use]
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Column at `idx`.
    #[must_use]
    pub fn column(&self, idx: usize) -> Option<&TableColumn> {
        self.columns.get(idx)
    }

    /// Number of page frames of `frame_size` rows.
    pub(crate) fn frame_count(&self, frame_size: usize) -> usize {
        self.row_count.div_ceil(frame_size)
    }

    /// Row range of page frame `idx`.
    pub(crate) fn frame(&self, idx: usize, frame_size: usize) -> Range<usize> {
        let start = idx * frame_size;
        start..(start + frame_size).min(self.row_count)
    }

    /// Cursor positioned at `row`.
    #[must_use]
    pub fn record(&self, row: usize) -> TableRecord<'_> {
        TableRecord { table: self, row }
    }
}

/// Row cursor over a [`Table`].
#[derive(Copy, Clone, Debug)]
pub struct TableRecord<'a> {
    table: &'a Table,
    row: usize,
}

impl Record for TableRecord<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn get_f64(&self, col: usize) -> f64 {
        match self.table.column(col) {
            Some(TableColumn::F64(v)) => v.get(self.row).copied().unwrap_or(f64::NAN),
            Some(TableColumn::Timestamp(v)) => match v.get(self.row) {
                Some(&ts) if ts != TIMESTAMP_NULL => ts as f64,
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    fn get_i64(&self, col: usize) -> i64 {
        match self.table.column(col) {
            Some(TableColumn::Timestamp(v)) => v.get(self.row).copied().unwrap_or(TIMESTAMP_NULL),
            _ => TIMESTAMP_NULL,
        }
    }

    fn get_symbol(&self, col: usize) -> Option<&str> {
        match self.table.column(col) {
            Some(TableColumn::Symbol(v)) => v.get(self.row).map(String::as_str),
            _ => None,
        }
    }
}
