//! Indicator computation layer.
//!
//! An indicator is a line series computed from one or more input lines.
//! Two execution modes must agree: the event-driven path consumes one bar
//! of input per `update` call and pushes one value per output line (NaN
//! while warming up); the bulk path (`once`) computes the same buffers in
//! one pass from raw slices, usually through the kernels module. Outputs
//! are aligned 1:1 with the input: slot `i` of every output line belongs
//! to input bar `i`.

mod bollinger;
mod crossover;
mod ema;
mod macd;
mod rsi;
mod sma;
mod stddev;
mod wma;

pub use bollinger::BollingerBands;
pub use crossover::CrossOver;
pub use ema::Ema;
pub use macd::Macd;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stddev::StdDev;
pub use wma::Wma;

use crate::lines::LineSeries;

/// An indicator over one or more input lines.
pub trait Indicator: Send {
    /// Output lines.
    fn lines(&self) -> &LineSeries;

    fn lines_mut(&mut self) -> &mut LineSeries;

    /// Bars of input this indicator needs before its output is defined,
    /// counted in bars of its own input. Chained warm-up is accumulated by
    /// the indicator bank, not here.
    fn min_period(&self) -> usize;

    /// Number of input lines the indicator binds (1 for most).
    fn num_inputs(&self) -> usize {
        1
    }

    /// Event-driven step: one value per bound input, one pushed output row.
    fn update(&mut self, inputs: &[f64]);

    /// Bulk computation for `[start, end)` from raw input slices.
    ///
    /// The warm-up prefix is consumed regardless of `start`; slots below
    /// the minimum period hold NaN either way. The default falls back to
    /// looping `update`.
    fn once(&mut self, inputs: &[&[f64]], start: usize, end: usize) {
        let _ = start;
        self.reset();
        let mut row = vec![f64::NAN; inputs.len()];
        for i in 0..end {
            for (slot, src) in row.iter_mut().zip(inputs) {
                *slot = src.get(i).copied().unwrap_or(f64::NAN);
            }
            self.update(&row);
        }
    }

    /// Clear all computed state and output lines.
    fn reset(&mut self);
}

/// Incremental EMA: seeds with the SMA of the first `period` inputs, then
/// recurses. Shared by EMA, MACD and the Wilder variant used by RSI.
#[derive(Debug, Clone)]
pub(crate) struct EmaState {
    alpha: f64,
    period: usize,
    seen: usize,
    seed_sum: f64,
    value: f64,
}

impl EmaState {
    pub(crate) fn new(period: usize) -> Self {
        Self::with_alpha(period, 2.0 / (period as f64 + 1.0))
    }

    /// Wilder smoothing: alpha = 1/period.
    pub(crate) fn wilder(period: usize) -> Self {
        Self::with_alpha(period, 1.0 / period as f64)
    }

    fn with_alpha(period: usize, alpha: f64) -> Self {
        Self {
            alpha,
            period,
            seen: 0,
            seed_sum: 0.0,
            value: f64::NAN,
        }
    }

    /// Feed one input; returns the smoothed value, NaN until seeded.
    /// NaN inputs (a chained upstream still warming up) are not consumed.
    pub(crate) fn push(&mut self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        if self.seen < self.period {
            self.seen += 1;
            self.seed_sum += x;
            if self.seen == self.period {
                self.value = self.seed_sum / self.period as f64;
            }
            return if self.seen == self.period {
                self.value
            } else {
                f64::NAN
            };
        }
        self.value = self.alpha * x + (1.0 - self.alpha) * self.value;
        self.value
    }

    pub(crate) fn reset(&mut self) {
        self.seen = 0;
        self.seed_sum = 0.0;
        self.value = f64::NAN;
    }
}
