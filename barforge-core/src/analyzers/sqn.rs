//! System Quality Number.

use crate::analyzers::{mean, stddev, Analyzer};
use crate::broker::Broker;
use crate::trade::Trade;
use std::collections::BTreeMap;

/// Van Tharp's SQN: `√n · mean(trade pnl) / std_sample(trade pnl)` over
/// closed trades (after commission). Fewer than two trades yields 0.
#[derive(Debug, Default)]
pub struct Sqn {
    pnls: Vec<f64>,
    analysis: BTreeMap<String, f64>,
}

impl Sqn {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for Sqn {
    fn name(&self) -> &'static str {
        "sqn"
    }

    fn start(&mut self, _broker: &Broker) {
        self.pnls.clear();
        self.analysis.clear();
    }

    fn notify_trade(&mut self, trade: &Trade) {
        if !trade.is_open {
            self.pnls.push(trade.pnl_comm);
        }
    }

    fn stop(&mut self, _broker: &Broker) {
        let sqn = if self.pnls.len() < 2 {
            0.0
        } else {
            let std = stddev(&self.pnls, true);
            if std == 0.0 {
                0.0
            } else {
                (self.pnls.len() as f64).sqrt() * mean(&self.pnls) / std
            }
        };
        self.analysis.insert("sqn".into(), sqn);
        self.analysis.insert("trades".into(), self.pnls.len() as f64);
    }

    fn analysis(&self) -> BTreeMap<String, f64> {
        self.analysis.clone()
    }
}
