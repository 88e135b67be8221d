//! Slippage: shift fill prices against the trader.

use serde::{Deserialize, Serialize};

/// Slippage configuration. Either a percentage of the fill price or a
/// fixed amount; the shift direction is always adverse (up for buys, down
/// for sells).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageConfig {
    /// Fraction of price (0.01 = 1%).
    pub perc: f64,
    /// Absolute price amount; used when `perc` is zero.
    pub fixed: f64,
    /// Slip fills happening exactly at the bar open.
    pub slip_open: bool,
    /// Slip prices matched against the bar's high/low (stops, market).
    pub slip_match: bool,
    /// Slip limit-derived prices.
    pub slip_limit: bool,
    /// Allow the slipped price to leave the bar's [low, high] range;
    /// otherwise it is clamped back in.
    pub slip_out: bool,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            perc: 0.0,
            fixed: 0.0,
            slip_open: false,
            slip_match: true,
            slip_limit: true,
            slip_out: false,
        }
    }
}

impl SlippageConfig {
    pub fn percent(perc: f64) -> Self {
        Self {
            perc,
            ..Self::default()
        }
    }

    pub fn fixed(fixed: f64) -> Self {
        Self {
            fixed,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.perc > 0.0 || self.fixed > 0.0
    }

    /// Adverse shift of `price`, clamped into `[low, high]` unless
    /// `slip_out` allows escaping the bar range.
    pub fn apply(&self, price: f64, is_buy: bool, low: f64, high: f64) -> f64 {
        let amount = if self.perc > 0.0 {
            price * self.perc
        } else {
            self.fixed
        };
        if amount <= 0.0 {
            return price;
        }
        let shifted = if is_buy { price + amount } else { price - amount };
        if self.slip_out {
            shifted
        } else {
            shifted.clamp(low, high)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_shift_is_adverse() {
        let slip = SlippageConfig::percent(0.01);
        assert!((slip.apply(100.0, true, 0.0, 1000.0) - 101.0).abs() < 1e-12);
        assert!((slip.apply(100.0, false, 0.0, 1000.0) - 99.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_shift() {
        let slip = SlippageConfig::fixed(0.25);
        assert_eq!(slip.apply(50.0, true, 0.0, 100.0), 50.25);
    }

    #[test]
    fn clamped_into_bar_range() {
        let slip = SlippageConfig::fixed(5.0);
        assert_eq!(slip.apply(100.0, true, 95.0, 102.0), 102.0);

        let out = SlippageConfig {
            slip_out: true,
            ..SlippageConfig::fixed(5.0)
        };
        assert_eq!(out.apply(100.0, true, 95.0, 102.0), 105.0);
    }

    #[test]
    fn inactive_passes_through() {
        let slip = SlippageConfig::default();
        assert_eq!(slip.apply(100.0, true, 0.0, 1000.0), 100.0);
    }
}
