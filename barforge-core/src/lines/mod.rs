//! Line-buffer data model.
//!
//! A *line* is one time-series column read through a cursor: index `0` is
//! the current bar, positive indices look back, negative indices peek
//! forward (only meaningful during bulk indicator computation). A *line
//! series* is a named set of lines sharing one cursor.

mod buffer;
mod series;

pub use buffer::LineBuffer;
pub use series::{ohlcv, FeedSeries, LineSeries, OhlcvSeries};

/// Sentinel for "no value yet". All warm-up prefixes are NaN.
pub const NAN: f64 = f64::NAN;
