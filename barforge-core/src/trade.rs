//! Round-trip trade tracking.

use serde::{Deserialize, Serialize};

/// A round-trip in one data feed: opened when the position leaves zero,
/// closed when it returns. Realized P&L is `(exit − entry) · |size|`
/// signed by direction, with `pnl_comm` net of all commissions paid on
/// the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ref_id: u64,
    pub data: String,
    pub bar_open: usize,
    pub bar_close: usize,
    pub dt_open: f64,
    pub dt_close: f64,
    pub price_open: f64,
    pub price_close: f64,
    /// Signed entry size (negative for shorts).
    pub size: f64,
    pub pnl: f64,
    pub pnl_comm: f64,
    pub commission: f64,
    pub is_long: bool,
    pub is_open: bool,
}

impl Trade {
    pub fn open(
        ref_id: u64,
        data: impl Into<String>,
        bar: usize,
        dt: f64,
        price: f64,
        size: f64,
        commission: f64,
    ) -> Self {
        Self {
            ref_id,
            data: data.into(),
            bar_open: bar,
            dt_open: dt,
            price_open: price,
            size,
            commission,
            is_long: size > 0.0,
            is_open: true,
            ..Self::default()
        }
    }

    /// Close the round trip and realize P&L.
    pub fn close(&mut self, bar: usize, dt: f64, price: f64, commission: f64) {
        self.bar_close = bar;
        self.dt_close = dt;
        self.price_close = price;
        self.commission += commission;
        self.is_open = false;

        let gross = (price - self.price_open) * self.size.abs();
        self.pnl = if self.is_long { gross } else { -gross };
        self.pnl_comm = self.pnl - self.commission;
    }
}
