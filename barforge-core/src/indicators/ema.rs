//! Exponential moving average.

use crate::indicators::{EmaState, Indicator};
use crate::kernels;
use crate::lines::LineSeries;

/// EMA with SMA seeding: the first defined value at bar `period − 1` is the
/// simple mean of the first `period` inputs, after which
/// `out = α·x + (1−α)·prev` with α = 2/(period+1).
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    state: EmaState,
    lines: LineSeries,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        let mut lines = LineSeries::new();
        lines.add_line("ema");
        lines.set_min_period(period);
        Self {
            period,
            state: EmaState::new(period),
            lines,
        }
    }
}

impl Indicator for Ema {
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
        let out = self.state.push(inputs[0]);
        self.lines.line_mut(0).push(out);
    }

    fn once(&mut self, inputs: &[&[f64]], _start: usize, end: usize) {
        self.reset();
        let src = &inputs[0][..end.min(inputs[0].len())];
        let mut out = Vec::new();
        kernels::ema(src, self.period, &mut out);
        self.lines.line_mut(0).extend_from_slice(&out);
    }

    fn reset(&mut self) {
        self.state.reset();
        self.lines.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::testutil::assert_event_bulk_parity;

    #[test]
    fn seed_is_sma() {
        let mut ema = Ema::new(4);
        for v in [2.0, 4.0, 6.0, 8.0] {
            ema.update(&[v]);
        }
        assert_eq!(ema.lines().line(0).last(), 5.0);
    }

    #[test]
    fn recursion_after_seed() {
        let mut ema = Ema::new(2);
        for v in [1.0, 3.0, 5.0] {
            ema.update(&[v]);
        }
        // seed = 2.0, alpha = 2/3: 2/3*5 + 1/3*2 = 4.0
        assert!((ema.lines().line(0).last() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn event_and_bulk_agree() {
        let input: Vec<f64> = (0..150)
            .map(|i| 50.0 + (i as f64 * 0.21).cos() * 6.0)
            .collect();
        assert_event_bulk_parity(&Ema::new(12), &input);
    }
}
