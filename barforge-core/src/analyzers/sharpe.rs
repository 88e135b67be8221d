//! Sharpe ratio over per-bar portfolio returns.

use crate::analyzers::{mean, stddev, Analyzer};
use crate::broker::Broker;
use std::collections::BTreeMap;

/// `(mean(r) − rf/N) / std(r)`, optionally annualized by √N, where `r`
/// is the per-bar return series of portfolio value and N the configured
/// bars-per-year. Zero variance yields 0.
#[derive(Debug)]
pub struct SharpeRatio {
    pub risk_free_rate: f64,
    pub annualize: bool,
    pub trading_days: usize,
    /// Sample (n−1) instead of population standard deviation.
    pub sample_std: bool,
    prev_value: f64,
    returns: Vec<f64>,
    analysis: BTreeMap<String, f64>,
}

impl Default for SharpeRatio {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.01,
            annualize: true,
            trading_days: 252,
            sample_std: false,
            prev_value: 0.0,
            returns: Vec::new(),
            analysis: BTreeMap::new(),
        }
    }
}

impl SharpeRatio {
    pub fn new(risk_free_rate: f64, annualize: bool, trading_days: usize) -> Self {
        Self {
            risk_free_rate,
            annualize,
            trading_days,
            ..Self::default()
        }
    }
}

impl Analyzer for SharpeRatio {
    fn name(&self) -> &'static str {
        "sharpe"
    }

    fn start(&mut self, broker: &Broker) {
        self.prev_value = broker.value();
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

    fn stop(&mut self, _broker: &Broker) {
        let sharpe = if self.returns.len() < 2 {
            0.0
        } else {
            let avg = mean(&self.returns);
            let std = stddev(&self.returns, self.sample_std);
            if std == 0.0 {
                0.0
            } else {
                let per_bar_rf = self.risk_free_rate / self.trading_days as f64;
                let mut s = (avg - per_bar_rf) / std;
                if self.annualize {
                    s *= (self.trading_days as f64).sqrt();
                }
                s
            }
        };
        self.analysis.insert("sharpe_ratio".into(), sharpe);
    }

    fn analysis(&self) -> BTreeMap<String, f64> {
        self.analysis.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed a synthetic value curve straight through the analyzer.
    fn sharpe_of(values: &[f64], rf: f64, annualize: bool, days: usize) -> f64 {
        let broker = Broker::new(0.0);
        let mut a = SharpeRatio::new(rf, annualize, days);
        a.prev_value = values[0];
        for &v in &values[1..] {
            if a.prev_value > 0.0 {
                a.returns.push((v - a.prev_value) / a.prev_value);
            }
            a.prev_value = v;
        }
        a.stop(&broker);
        a.analysis()["sharpe_ratio"]
    }

    #[test]
    fn constant_returns_have_zero_std() {
        let values: Vec<f64> = (0..253).map(|i| 100_000.0 * 1.001f64.powi(i)).collect();
        assert_eq!(sharpe_of(&values, 0.0, true, 252), 0.0);
    }

    #[test]
    fn noisy_constant_drift() {
        // Returns alternate 0.1% ± 0.1%: mean 0.001, std 0.001 →
        // annualized Sharpe = 1.0 * sqrt(252) ≈ 15.87.
        let mut values = vec![100_000.0];
        for i in 0..252 {
            let r = if i % 2 == 0 { 0.002 } else { 0.0 };
            values.push(values.last().unwrap() * (1.0 + r));
        }
        let s = sharpe_of(&values, 0.0, true, 252);
        assert!((s - 15.87).abs() < 0.15, "sharpe {s}");
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let mut values = vec![100_000.0];
        for i in 0..252 {
            let r = if i % 2 == 0 { 0.002 } else { 0.0 };
            values.push(values.last().unwrap() * (1.0 + r));
        }
        let with_rf = sharpe_of(&values, 0.05, true, 252);
        let without = sharpe_of(&values, 0.0, true, 252);
        assert!(with_rf < without);
    }

    #[test]
    fn too_few_bars_is_zero() {
        assert_eq!(sharpe_of(&[100.0, 101.0], 0.0, true, 252), 0.0);
    }
}
