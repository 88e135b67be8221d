//! Observers: line series recording one value per bar.
//!
//! Unlike analyzers (final statistics), observers store a value for every
//! bar, giving downstream tooling plottable series of cash, value,
//! drawdown, execution marks and returns.

use crate::broker::Broker;
use crate::lines::LineSeries;
use crate::order::{Order, Side};
use crate::trade::Trade;

/// A per-bar recorder.
#[allow(unused_variables)]
pub trait Observer: Send {
    fn name(&self) -> &'static str;

    fn start(&mut self, broker: &Broker) {}

    /// Push exactly one value per line for the current bar.
    fn next(&mut self, broker: &Broker);

    fn notify_order(&mut self, order: &Order) {}

    fn notify_trade(&mut self, trade: &Trade) {}

    /// The recorded lines.
    fn lines(&self) -> &LineSeries;
}

/// Broker cash per bar.
pub struct CashObserver {
    lines: LineSeries,
}

impl Default for CashObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl CashObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("cash");
        Self { lines }
    }
}

impl Observer for CashObserver {
    fn name(&self) -> &'static str {
        "cash"
    }

    fn next(&mut self, broker: &Broker) {
        self.lines.line_mut(0).push(broker.cash());
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Mark-to-market portfolio value per bar.
pub struct ValueObserver {
    lines: LineSeries,
}

impl Default for ValueObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("value");
        Self { lines }
    }
}

impl Observer for ValueObserver {
    fn name(&self) -> &'static str {
        "value"
    }

    fn next(&mut self, broker: &Broker) {
        self.lines.line_mut(0).push(broker.value());
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Cash and value on two lines.
pub struct BrokerObserver {
    lines: LineSeries,
}

impl Default for BrokerObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("cash");
        lines.add_line("value");
        Self { lines }
    }
}

impl Observer for BrokerObserver {
    fn name(&self) -> &'static str {
        "broker"
    }

    fn next(&mut self, broker: &Broker) {
        self.lines.line_mut(0).push(broker.cash());
        self.lines.line_mut(1).push(broker.value());
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Current and maximum drawdown percent per bar.
pub struct DrawDownObserver {
    lines: LineSeries,
    peak: f64,
    max_dd: f64,
}

impl Default for DrawDownObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawDownObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("drawdown");
        lines.add_line("maxdrawdown");
        Self {
            lines,
            peak: 0.0,
            max_dd: 0.0,
        }
    }
}

impl Observer for DrawDownObserver {
    fn name(&self) -> &'static str {
        "drawdown"
    }

    fn start(&mut self, broker: &Broker) {
        self.peak = broker.value();
        self.max_dd = 0.0;
    }

    fn next(&mut self, broker: &Broker) {
        let value = broker.value();
        self.peak = self.peak.max(value);
        let dd = if self.peak > 0.0 {
            (self.peak - value) / self.peak * 100.0
        } else {
            0.0
        };
        self.max_dd = self.max_dd.max(dd);
        self.lines.line_mut(0).push(dd);
        self.lines.line_mut(1).push(self.max_dd);
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Execution marks: the buy line holds the executed price on bars where a
/// buy completed and NaN elsewhere; same for sells.
pub struct BuySellObserver {
    lines: LineSeries,
    pending_buy: f64,
    pending_sell: f64,
}

impl Default for BuySellObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl BuySellObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("buy");
        lines.add_line("sell");
        Self {
            lines,
            pending_buy: f64::NAN,
            pending_sell: f64::NAN,
        }
    }
}

impl Observer for BuySellObserver {
    fn name(&self) -> &'static str {
        "buysell"
    }

    fn notify_order(&mut self, order: &Order) {
        if !order.is_completed() {
            return;
        }
        match order.side {
            Side::Buy => self.pending_buy = order.executed.price,
            Side::Sell => self.pending_sell = order.executed.price,
        }
    }

    fn next(&mut self, _broker: &Broker) {
        self.lines.line_mut(0).push(self.pending_buy);
        self.lines.line_mut(1).push(self.pending_sell);
        self.pending_buy = f64::NAN;
        self.pending_sell = f64::NAN;
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Closed-trade P&L marks (gross and net of commission).
pub struct TradesObserver {
    lines: LineSeries,
    pending_pnl: f64,
    pending_pnl_comm: f64,
}

impl Default for TradesObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TradesObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("pnl");
        lines.add_line("pnlcomm");
        Self {
            lines,
            pending_pnl: f64::NAN,
            pending_pnl_comm: f64::NAN,
        }
    }
}

impl Observer for TradesObserver {
    fn name(&self) -> &'static str {
        "trades"
    }

    fn notify_trade(&mut self, trade: &Trade) {
        if !trade.is_open {
            self.pending_pnl = trade.pnl;
            self.pending_pnl_comm = trade.pnl_comm;
        }
    }

    fn next(&mut self, _broker: &Broker) {
        self.lines.line_mut(0).push(self.pending_pnl);
        self.lines.line_mut(1).push(self.pending_pnl_comm);
        self.pending_pnl = f64::NAN;
        self.pending_pnl_comm = f64::NAN;
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Per-bar simple returns of portfolio value.
pub struct ReturnsObserver {
    lines: LineSeries,
    prev: f64,
}

impl Default for ReturnsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReturnsObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("returns");
        Self { lines, prev: 0.0 }
    }
}

impl Observer for ReturnsObserver {
    fn name(&self) -> &'static str {
        "returns"
    }

    fn start(&mut self, broker: &Broker) {
        self.prev = broker.value();
    }

    fn next(&mut self, broker: &Broker) {
        let value = broker.value();
        let r = if self.prev > 0.0 {
            (value - self.prev) / self.prev
        } else {
            0.0
        };
        self.lines.line_mut(0).push(r);
        self.prev = value;
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}

/// Per-bar log returns of portfolio value.
pub struct LogReturnsObserver {
    lines: LineSeries,
    prev: f64,
}

impl Default for LogReturnsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl LogReturnsObserver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("logreturns");
        Self { lines, prev: 0.0 }
    }
}

impl Observer for LogReturnsObserver {
    fn name(&self) -> &'static str {
        "logreturns"
    }

    fn start(&mut self, broker: &Broker) {
        self.prev = broker.value();
    }

    fn next(&mut self, broker: &Broker) {
        let value = broker.value();
        let r = if self.prev > 0.0 && value > 0.0 {
            (value / self.prev).ln()
        } else {
            0.0
        };
        self.lines.line_mut(0).push(r);
        self.prev = value;
    }

    fn lines(&self) -> &LineSeries {
        &self.lines
    }
}
