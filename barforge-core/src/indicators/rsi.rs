//! Relative Strength Index.

use crate::indicators::{EmaState, Indicator};
use crate::kernels;
use crate::lines::LineSeries;

/// Wilder's RSI. One-step price changes are split into gains and losses,
/// each smoothed with α = 1/period after an SMA seed, then
/// `RSI = 100 − 100/(1 + gain/loss)`. No losses pegs at 100, no gains at
/// 0. The differencing consumes one bar, so the minimum period is
/// `period + 1`.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev: Option<f64>,
    avg_gain: EmaState,
    avg_loss: EmaState,
    lines: LineSeries,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        let mut lines = LineSeries::new();
        lines.add_line("rsi");
        lines.set_min_period(period + 1);
        Self {
            period,
            prev: None,
            avg_gain: EmaState::wilder(period),
            avg_loss: EmaState::wilder(period),
            lines,
        }
    }
}

impl Indicator for Rsi {
    fn lines(&self) -> &LineSeries {
        &self.lines
    }

    fn lines_mut(&mut self) -> &mut LineSeries {
        &mut self.lines
    }

    fn min_period(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, inputs: &[f64]) {
        let x = inputs[0];
        if x.is_nan() {
            self.lines.line_mut(0).push(f64::NAN);
            return;
        }
        let out = match self.prev {
            None => f64::NAN,
            Some(prev) => {
                let change = x - prev;
                let gain = change.max(0.0);
                let loss = (-change).max(0.0);
                let ag = self.avg_gain.push(gain);
                let al = self.avg_loss.push(loss);
                if ag.is_nan() || al.is_nan() {
                    f64::NAN
                } else if al == 0.0 {
                    100.0
                } else if ag == 0.0 {
                    0.0
                } else {
                    100.0 - 100.0 / (1.0 + ag / al)
                }
            }
        };
        self.prev = Some(x);
        self.lines.line_mut(0).push(out);
    }

    fn once(&mut self, inputs: &[&[f64]], _start: usize, end: usize) {
        self.reset();
        let src = &inputs[0][..end.min(inputs[0].len())];
        let mut out = Vec::new();
        kernels::rsi(src, self.period, &mut out);
        self.lines.line_mut(0).extend_from_slice(&out);
    }

    fn reset(&mut self) {
        self.prev = None;
        self.avg_gain.reset();
        self.avg_loss.reset();
        self.lines.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::testutil::assert_event_bulk_parity;

    #[test]
    fn all_gains_peg_at_100() {
        let mut rsi = Rsi::new(5);
        for i in 0..10 {
            rsi.update(&[100.0 + i as f64]);
        }
        assert_eq!(rsi.lines().line(0).last(), 100.0);
    }

    #[test]
    fn all_losses_peg_at_0() {
        let mut rsi = Rsi::new(5);
        for i in 0..10 {
            rsi.update(&[100.0 - i as f64]);
        }
        assert_eq!(rsi.lines().line(0).last(), 0.0);
    }

    #[test]
    fn warmup_prefix() {
        let mut rsi = Rsi::new(14);
        for i in 0..14 {
            rsi.update(&[100.0 + (i % 3) as f64]);
        }
        assert!(rsi.lines().line(0).last().is_nan());
        rsi.update(&[101.0]);
        assert!(rsi.lines().line(0).last().is_finite());
    }

    #[test]
    fn event_and_bulk_agree() {
        let input: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.17).sin() * 4.0 + (i as f64 * 0.05).cos())
            .collect();
        assert_event_bulk_parity(&Rsi::new(14), &input);
    }
}
