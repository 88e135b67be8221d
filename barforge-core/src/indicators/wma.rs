//! Linearly weighted moving average.

use crate::indicators::Indicator;
use crate::lines::LineSeries;
use std::collections::VecDeque;

/// WMA: the newest value in the window carries weight `period`, the oldest
/// weight 1.
#[derive(Debug, Clone)]
pub struct Wma {
    period: usize,
    window: VecDeque<f64>,
    lines: LineSeries,
}

impl Wma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "WMA period must be >= 1");
        let mut lines = LineSeries::new();
        lines.add_line("wma");
        lines.set_min_period(period);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            lines,
        }
    }
}

impl Indicator for Wma {
    fn lines(&self) -> &LineSeries {
        &self.lines
    }

    fn lines_mut(&mut self) -> &mut LineSeries {
        &mut self.lines
    }

    fn min_period(&self) -> usize {
        self.period
    }

    fn update(&mut self, inputs: &[f64]) {
        if inputs[0].is_nan() {
            self.lines.line_mut(0).push(f64::NAN);
            return;
        }
        self.window.push_back(inputs[0]);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        let out = if self.window.len() == self.period {
            let mut weighted = 0.0;
            let mut weight_total = 0.0;
            for (i, &v) in self.window.iter().enumerate() {
                let w = (i + 1) as f64;
                weighted += v * w;
                weight_total += w;
            }
            weighted / weight_total
        } else {
            f64::NAN
        };
        self.lines.line_mut(0).push(out);
    }

    fn reset(&mut self) {
        self.window.clear();
        self.lines.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_favor_recent() {
        let mut wma = Wma::new(3);
        for v in [1.0, 2.0, 3.0] {
            wma.update(&[v]);
        }
        // (1*1 + 2*2 + 3*3) / 6 = 14/6
        assert!((wma.lines().line(0).last() - 14.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn warmup_is_nan() {
        let mut wma = Wma::new(4);
        wma.update(&[1.0]);
        wma.update(&[2.0]);
        assert!(wma.lines().line(0).last().is_nan());
    }
}
