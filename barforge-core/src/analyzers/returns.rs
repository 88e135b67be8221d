//! Return series statistics.

use crate::analyzers::{mean, stddev, Analyzer};
use crate::broker::Broker;
use std::collections::BTreeMap;

/// Total return plus mean and standard deviation of per-bar returns, all
/// in percent.
#[derive(Debug, Default)]
pub struct ReturnsAnalyzer {
    start_value: f64,
    prev_value: f64,
    returns: Vec<f64>,
    analysis: BTreeMap<String, f64>,
}

impl ReturnsAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for ReturnsAnalyzer {
    fn name(&self) -> &'static str {
        "returns"
    }

    fn start(&mut self, broker: &Broker) {
        self.start_value = broker.value();
        self.prev_value = self.start_value;
        self.returns.clear();
        self.analysis.clear();
    }

    fn next(&mut self, broker: &Broker, _dt: f64) {
        let value = broker.value();
        if self.prev_value > 0.0 {
            self.returns.push((value - self.prev_value) / self.prev_value);
        }
        self.prev_value = value;
    }

    fn stop(&mut self, broker: &Broker) {
        let end_value = broker.value();
        self.analysis.insert(
            "total_return".into(),
            if self.start_value > 0.0 {
                (end_value - self.start_value) / self.start_value * 100.0
            } else {
                0.0
            },
        );
        self.analysis
            .insert("avg_return".into(), mean(&self.returns) * 100.0);
        self.analysis
            .insert("return_std".into(), stddev(&self.returns, false) * 100.0);
    }

    fn analysis(&self) -> BTreeMap<String, f64> {
        self.analysis.clone()
    }
}
