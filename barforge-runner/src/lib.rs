//! Parameter sweeps for barforge backtests.
//!
//! A [`ParamGrid`] spans the Cartesian product of parameter assignments;
//! the [`Optimizer`] runs one engine per assignment on a rayon worker
//! pool and collects sortable result records.

mod grid;
mod optimizer;

pub use grid::ParamGrid;
pub use optimizer::{sort_results, OptResult, Optimizer, SortBy, FAILED_RUN_PNL};
