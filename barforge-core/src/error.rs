//! Error types for the core engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Parameter lookup without a default for a key that was never set.
    #[error("parameter not found: {0}")]
    ParamNotFound(String),

    /// Parameter exists but holds a different type than requested.
    #[error("parameter {name} has type {actual}, expected {expected}")]
    ParamType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Mutable access past the end of a line buffer.
    #[error("line buffer index {0} out of range")]
    IndexOutOfRange(i64),

    /// Line lookup by a name the series does not carry.
    #[error("line not found: {0}")]
    LineNotFound(String),

    /// Raw-slice access requested on a bounded (ring) buffer.
    #[error("raw data access requires an unbounded buffer")]
    NotUnbounded,

    /// Order referenced a data feed the broker does not know.
    #[error("unknown data feed: {0}")]
    UnknownData(String),

    /// Order reference that is not in the book.
    #[error("unknown order ref: {0}")]
    UnknownOrder(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
