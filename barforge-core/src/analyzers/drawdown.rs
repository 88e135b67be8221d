//! Drawdown tracking.

use crate::analyzers::Analyzer;
use crate::broker::Broker;
use std::collections::BTreeMap;

/// Running peak of portfolio value with current and maximum drawdown,
/// absolute and percent, and streak durations in bars.
#[derive(Debug, Default)]
pub struct DrawDown {
    peak: f64,
    current: f64,
    current_pct: f64,
    max: f64,
    max_pct: f64,
    len: usize,
    max_len: usize,
    analysis: BTreeMap<String, f64>,
}

impl DrawDown {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for DrawDown {
    fn name(&self) -> &'static str {
        "drawdown"
    }

    fn start(&mut self, broker: &Broker) {
        *self = Self::default();
        self.peak = broker.value();
    }

    fn next(&mut self, broker: &Broker, _dt: f64) {
        let value = broker.value();
        self.peak = self.peak.max(value);
        self.current = self.peak - value;
        self.current_pct = if self.peak > 0.0 {
            self.current / self.peak
        } else {
            0.0
        };
        self.max = self.max.max(self.current);
        self.max_pct = self.max_pct.max(self.current_pct);

        if self.current > 0.0 {
            self.len += 1;
            self.max_len = self.max_len.max(self.len);
        } else {
            self.len = 0;
        }
    }

    fn stop(&mut self, _broker: &Broker) {
        let a = &mut self.analysis;
        a.insert("drawdown".into(), self.current_pct * 100.0);
        a.insert("moneydown".into(), self.current);
        a.insert("len".into(), self.len as f64);
        a.insert("max_drawdown".into(), self.max_pct * 100.0);
        a.insert("max_moneydown".into(), self.max);
        a.insert("max_len".into(), self.max_len as f64);
    }

    fn analysis(&self) -> BTreeMap<String, f64> {
        self.analysis.clone()
    }
}
