//! Moving Average Convergence/Divergence.

use crate::indicators::{EmaState, Indicator};
use crate::kernels;
use crate::lines::LineSeries;

/// MACD line (fast EMA − slow EMA), signal (EMA of the MACD line, seeded
/// from its first valid value), histogram (macd − signal). Every output
/// before `slow + signal − 2` is NaN.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    fast_ema: EmaState,
    slow_ema: EmaState,
    signal_ema: EmaState,
    lines: LineSeries,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1);
        assert!(fast < slow, "fast period must be below slow period");
        let mut lines = LineSeries::new();
        lines.add_line("macd");
        lines.add_line("signal");
        lines.add_line("histogram");
        lines.set_min_period(slow + signal - 1);
        Self {
            fast,
            slow,
            signal,
            fast_ema: EmaState::new(fast),
            slow_ema: EmaState::new(slow),
            signal_ema: EmaState::new(signal),
            lines,
        }
    }

    pub fn standard() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    fn lines(&self) -> &LineSeries {
        &self.lines
    }

    fn lines_mut(&mut self) -> &mut LineSeries {
        &mut self.lines
    }

    fn min_period(&self) -> usize {
        self.slow + self.signal - 1
    }

    fn update(&mut self, inputs: &[f64]) {
        let x = inputs[0];
        let fast = self.fast_ema.push(x);
        let slow = self.slow_ema.push(x);

        let macd = if fast.is_nan() || slow.is_nan() {
            f64::NAN
        } else {
            fast - slow
        };
        let signal = if macd.is_nan() {
            f64::NAN
        } else {
            self.signal_ema.push(macd)
        };
        let hist = if macd.is_nan() || signal.is_nan() {
            f64::NAN
        } else {
            macd - signal
        };

        self.lines.line_mut(0).push(macd);
        self.lines.line_mut(1).push(signal);
        self.lines.line_mut(2).push(hist);
    }

    fn once(&mut self, inputs: &[&[f64]], _start: usize, end: usize) {
        self.reset();
        let src = &inputs[0][..end.min(inputs[0].len())];
        let (mut m, mut s, mut h) = (Vec::new(), Vec::new(), Vec::new());
        kernels::macd(src, self.fast, self.slow, self.signal, &mut m, &mut s, &mut h);
        self.lines.line_mut(0).extend_from_slice(&m);
        self.lines.line_mut(1).extend_from_slice(&s);
        self.lines.line_mut(2).extend_from_slice(&h);
    }

    fn reset(&mut self) {
        self.fast_ema.reset();
        self.slow_ema.reset();
        self.signal_ema.reset();
        self.lines.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::testutil::assert_event_bulk_parity;

    #[test]
    fn nan_prefix_boundary() {
        let mut macd = Macd::new(3, 6, 4);
        let input: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 0.5).collect();
        for &v in &input {
            macd.update(&[v]);
        }
        let hist = macd.lines().line(2);
        let at = |i: usize| hist.try_get(hist.pos() as i64 - i as i64).unwrap();
        // slow + signal - 2 = 8: last NaN index is 7
        assert!(at(7).is_nan());
        assert!(at(8).is_finite());
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let mut macd = Macd::standard();
        let input: Vec<f64> = (0..80)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 3.0)
            .collect();
        for &v in &input {
            macd.update(&[v]);
        }
        let (m, s, h) = (
            macd.lines().line(0).get(macd.lines().line(0).pos() as i64 - 79),
            macd.lines().line(1).get(macd.lines().line(1).pos() as i64 - 79),
            macd.lines().line(2).get(macd.lines().line(2).pos() as i64 - 79),
        );
        assert!((h - (m - s)).abs() < 1e-12);
    }

    #[test]
    fn event_and_bulk_agree() {
        let input: Vec<f64> = (0..160)
            .map(|i| 200.0 + (i as f64 * 0.23).sin() * 9.0 + i as f64 * 0.05)
            .collect();
        assert_event_bulk_parity(&Macd::standard(), &input);
    }
}
