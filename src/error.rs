/// Error type
#[derive(Debug)]
pub enum Error {
    /// The executor was configured with an unusable setting.
    InvalidConfig(&'static str),

    /// Table columns do not have the same number of rows.
    ColumnMismatch {
        /// Row count of the first column
        expected: usize,

        /// Row count of the offending column
        actual: usize,
    },

    /// A function or the group key refers to a column that does not exist,
    /// or that has the wrong type.
    UnknownColumn(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(msg) => {
                write!(f, "InvalidConfig: {msg}")
            }
            Self::ColumnMismatch { expected, actual } => {
                write!(f, "ColumnMismatch: expected {expected} rows, got {actual}")
            }
            Self::UnknownColumn(idx) => {
                write!(f, "UnknownColumn: {idx}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result helper type
pub type Result<T> = std::result::Result<T, Error>;
