//! Position-sizing policies.

use crate::commission::Commission;

/// Everything a sizer may look at when deciding a stake.
pub struct SizingInput<'a> {
    pub comm: &'a dyn Commission,
    pub cash: f64,
    /// Current close of the data being traded.
    pub price: f64,
    /// Signed current position in that data.
    pub position: f64,
    pub is_buy: bool,
}

impl SizingInput<'_> {
    /// The order would flip the sign of the current position.
    fn is_reversal(&self) -> bool {
        (self.is_buy && self.position < 0.0) || (!self.is_buy && self.position > 0.0)
    }
}

/// Maps an order request to a stake. Returning 0 suppresses the order.
pub trait Sizer: Send {
    fn size_for(&self, input: &SizingInput) -> f64;
}

fn clamp(size: f64) -> f64 {
    if size.is_nan() || size < 0.0 {
        0.0
    } else {
        size
    }
}

/// Constant stake.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizer {
    pub stake: f64,
}

impl FixedSizer {
    pub fn new(stake: f64) -> Self {
        Self { stake }
    }
}

impl Sizer for FixedSizer {
    fn size_for(&self, _input: &SizingInput) -> f64 {
        clamp(self.stake)
    }
}

/// Constant stake, doubled when the order reverses the position.
#[derive(Debug, Clone, Copy)]
pub struct FixedReverser {
    pub stake: f64,
}

impl FixedReverser {
    pub fn new(stake: f64) -> Self {
        Self { stake }
    }
}

impl Sizer for FixedReverser {
    fn size_for(&self, input: &SizingInput) -> f64 {
        let stake = if input.is_reversal() {
            self.stake * 2.0
        } else {
            self.stake
        };
        clamp(stake)
    }
}

/// A percentage of available cash. The integer variant floors to whole
/// units; the fractional one does not.
#[derive(Debug, Clone, Copy)]
pub struct PercentSizer {
    pub percent: f64,
    pub whole_units: bool,
}

impl PercentSizer {
    pub fn new(percent: f64) -> Self {
        Self {
            percent,
            whole_units: false,
        }
    }

    pub fn whole(percent: f64) -> Self {
        Self {
            percent,
            whole_units: true,
        }
    }
}

impl Sizer for PercentSizer {
    fn size_for(&self, input: &SizingInput) -> f64 {
        if input.price <= 0.0 {
            return 0.0;
        }
        let size = input.cash * (self.percent / 100.0) / input.price;
        clamp(if self.whole_units { size.floor() } else { size })
    }
}

/// Use (a fraction of) all available cash.
#[derive(Debug, Clone, Copy)]
pub struct AllInSizer {
    pub percent: f64,
    pub whole_units: bool,
}

impl AllInSizer {
    pub fn new() -> Self {
        Self {
            percent: 100.0,
            whole_units: false,
        }
    }

    pub fn whole(percent: f64) -> Self {
        Self {
            percent,
            whole_units: true,
        }
    }
}

impl Default for AllInSizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sizer for AllInSizer {
    fn size_for(&self, input: &SizingInput) -> f64 {
        if input.price <= 0.0 {
            return 0.0;
        }
        let use_cash = input.cash * (self.percent / 100.0);
        let size = use_cash / input.price;
        clamp(if self.whole_units { size.floor() } else { size })
    }
}

/// Percent-based, doubled on reversal.
#[derive(Debug, Clone, Copy)]
pub struct PercentReverser {
    pub percent: f64,
}

impl PercentReverser {
    pub fn new(percent: f64) -> Self {
        Self { percent }
    }
}

impl Sizer for PercentReverser {
    fn size_for(&self, input: &SizingInput) -> f64 {
        if input.price <= 0.0 {
            return 0.0;
        }
        let mut size = (input.cash * (self.percent / 100.0) / input.price).floor();
        if input.is_reversal() {
            size *= 2.0;
        }
        clamp(size)
    }
}

/// Risk-budget sizing: stake such that a stop `stop_percent` away loses at
/// most `risk_percent` of cash.
#[derive(Debug, Clone, Copy)]
pub struct RiskSizer {
    pub risk_percent: f64,
    pub stop_percent: f64,
}

impl RiskSizer {
    pub fn new(risk_percent: f64, stop_percent: f64) -> Self {
        Self {
            risk_percent,
            stop_percent,
        }
    }
}

impl Sizer for RiskSizer {
    fn size_for(&self, input: &SizingInput) -> f64 {
        if input.price <= 0.0 {
            return 0.0;
        }
        let max_risk = input.cash * (self.risk_percent / 100.0);
        let stop_distance = input.price * (self.stop_percent / 100.0);
        if stop_distance <= 0.0 {
            return 0.0;
        }
        clamp((max_risk / stop_distance).floor())
    }
}

/// Kelly-criterion sizing: `K = W − (1−W)/R`, scaled by a fraction and
/// clamped to `[0, max_percent]` of cash.
#[derive(Debug, Clone, Copy)]
pub struct KellySizer {
    pub win_rate: f64,
    pub win_loss_ratio: f64,
    pub fraction: f64,
    pub max_percent: f64,
}

impl Default for KellySizer {
    fn default() -> Self {
        Self {
            win_rate: 0.5,
            win_loss_ratio: 1.0,
            fraction: 0.5,
            max_percent: 25.0,
        }
    }
}

impl Sizer for KellySizer {
    fn size_for(&self, input: &SizingInput) -> f64 {
        if input.price <= 0.0 || self.win_loss_ratio <= 0.0 {
            return 0.0;
        }
        let kelly = self.win_rate - (1.0 - self.win_rate) / self.win_loss_ratio;
        let percent = (kelly * self.fraction * 100.0).clamp(0.0, self.max_percent);
        let use_cash = input.cash * (percent / 100.0);
        clamp((use_cash / input.price).floor())
    }
}
