//! Analyzers: per-bar aggregators producing final statistics.
//!
//! Each analyzer mirrors the strategy lifecycle (`start`, `next` per bar,
//! trade notifications, `stop`) and ends with a flat
//! `lowercase_underscore_name → value` map.

mod annual;
mod drawdown;
mod returns;
mod sharpe;
mod sqn;
mod trades;

pub use annual::AnnualReturn;
pub use drawdown::DrawDown;
pub use returns::ReturnsAnalyzer;
pub use sharpe::SharpeRatio;
pub use sqn::Sqn;
pub use trades::TradeAnalyzer;

use crate::broker::Broker;
use crate::trade::Trade;
use std::collections::BTreeMap;

/// A per-run statistics aggregator.
#[allow(unused_variables)]
pub trait Analyzer: Send {
    fn name(&self) -> &'static str;

    /// Called once before the first bar.
    fn start(&mut self, broker: &Broker) {}

    /// Called once per bar after broker matching and strategy hooks.
    /// `dt` is the bar datetime in days-since-epoch.
    fn next(&mut self, broker: &Broker, dt: f64) {}

    /// Trade open/close events.
    fn notify_trade(&mut self, trade: &Trade) {}

    /// Called after the last bar.
    fn stop(&mut self, broker: &Broker) {}

    /// Final results.
    fn analysis(&self) -> BTreeMap<String, f64>;
}

/// Mean of a slice; 0 when empty.
pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Standard deviation; population by default, sample divides by n−1.
pub(crate) fn stddev(data: &[f64], sample: bool) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let sq_sum: f64 = data.iter().map(|v| (v - m) * (v - m)).sum();
    let n = if sample { data.len() - 1 } else { data.len() };
    (sq_sum / n as f64).sqrt()
}
