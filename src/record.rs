use crate::Timestamp;

/// Cursor over one input row.
///
/// Reading a column that does not exist, or that cannot be represented
/// in the requested type, yields the null marker of that type
/// (`NaN` or [`TIMESTAMP_NULL`](crate::TIMESTAMP_NULL)).
pub trait Record {
    /// Reads a column as a 64-bit float.
    fn get_f64(&self, col: usize) -> f64;

    /// Reads a column as a 64-bit integer.
    fn get_i64(&self, col: usize) -> i64;

    /// Reads a column as a symbol (string key).
    fn get_symbol(&self, col: usize) -> Option<&str>;
}

/// Upstream value provider, evaluated once per input row.
pub trait Function: std::fmt::Debug + Send + Sync {
    /// Evaluates to a float, `NaN` meaning no value.
    fn get_f64(&self, rec: &dyn Record) -> f64;

    /// Evaluates to a timestamp in microseconds.
    fn get_timestamp(&self, rec: &dyn Record) -> Timestamp;
}

/// Reads a column of the input row as-is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Column(pub usize);

impl Function for Column {
    fn get_f64(&self, rec: &dyn Record) -> f64 {
        rec.get_f64(self.0)
    }

    fn get_timestamp(&self, rec: &dyn Record) -> Timestamp {
        rec.get_i64(self.0)
    }
}
