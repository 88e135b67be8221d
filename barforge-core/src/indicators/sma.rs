//! Simple moving average.

use crate::indicators::Indicator;
use crate::kernels;
use crate::lines::LineSeries;
use std::collections::VecDeque;

/// Rolling mean over a fixed window. The event path keeps a running sum
/// (one subtraction + one addition per bar), matching the incremental
/// sliding-mean kernel bit for bit.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    acc: f64,
    lines: LineSeries,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let mut lines = LineSeries::new();
        lines.add_line("sma");
        lines.set_min_period(period);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            acc: 0.0,
            lines,
        }
    }
}

impl Indicator for Sma {
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
        let x = inputs[0];
        if x.is_nan() {
            self.lines.line_mut(0).push(f64::NAN);
            return;
        }
        self.window.push_back(x);
        self.acc += x;
        if self.window.len() > self.period {
            self.acc -= self.window.pop_front().expect("window is non-empty");
        }
        let out = if self.window.len() == self.period {
            self.acc / self.period as f64
        } else {
            f64::NAN
        };
        self.lines.line_mut(0).push(out);
    }

    fn once(&mut self, inputs: &[&[f64]], _start: usize, end: usize) {
        self.reset();
        let src = &inputs[0][..end.min(inputs[0].len())];
        let mut out = Vec::new();
        kernels::sliding_mean(src, self.period, &mut out);
        self.lines.line_mut(0).extend_from_slice(&out);
    }

    fn reset(&mut self) {
        self.window.clear();
        self.acc = 0.0;
        self.lines.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::testutil::assert_event_bulk_parity;

    #[test]
    fn known_values() {
        let mut sma = Sma::new(5);
        let input = [
            100.0, 101.0, 102.0, 101.0, 103.0, 104.5, 105.0, 104.0, 106.0, 107.5,
        ];
        for &v in &input {
            sma.update(&[v]);
        }
        let line = sma.lines().line(0);
        assert!(line.try_get(line.pos() as i64).unwrap().is_nan()); // bar 0
        let at = |i: usize| line.try_get(line.pos() as i64 - i as i64).unwrap();
        assert!(at(3).is_nan());
        assert!((at(4) - 101.4).abs() < 1e-12);
        assert!((at(9) - 105.4).abs() < 1e-12);
    }

    #[test]
    fn event_and_bulk_agree() {
        let input: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 8.0)
            .collect();
        assert_event_bulk_parity(&Sma::new(20), &input);
    }

    #[test]
    fn period_one_copies_input() {
        let mut sma = Sma::new(1);
        sma.update(&[42.0]);
        assert_eq!(sma.lines().line(0).last(), 42.0);
    }
}
