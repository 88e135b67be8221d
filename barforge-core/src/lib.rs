//! Barforge core engine.
//!
//! Provides the line-buffer data model, indicator computation (incremental
//! and bulk), broker simulation with commission/slippage/volume rules, and
//! the Cerebro per-bar scheduler.

pub mod analyzers;
pub mod broker;
pub mod commission;
pub mod engine;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod kernels;
pub mod lines;
pub mod observers;
pub mod order;
pub mod params;
pub mod position;
pub mod signal;
pub mod sizer;
pub mod strategy;
pub mod timer;
pub mod trade;

pub use error::Error;
pub use params::{ParamValue, Params};

/// Crate version as a dotted triple.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
