//! Simulated broker.
//!
//! Matches pending orders against OHLC bars under the selected bar-time
//! policy, applies slippage, volume limits and commission, and keeps cash,
//! positions, trades and (optionally) fund-NAV accounting.

mod filler;
mod slippage;

pub use filler::{BarVolumeFiller, DefaultFiller, FixedVolumeFiller, VolumeFiller};
pub use slippage::SlippageConfig;

use crate::commission::{Commission, CommissionPlan};
use crate::order::{ExecutionBit, Order, OrderKind, OrderStatus, Side};
use crate::position::Position;
use crate::trade::Trade;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Snapshot of one feed's current bar handed to the broker for matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarView {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub datetime: f64,
}

/// When fills may happen relative to the bar being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarPolicy {
    /// Orders submitted on bar N fill against bar N+1.
    #[default]
    Normal,
    /// The strategy acts on bar N's open; those orders fill at that open.
    CheatOnOpen,
    /// The strategy acts on bar N's close; those orders fill at that close.
    CheatOnClose,
}

/// Fund-mode bookkeeping: portfolio value expressed as shares of a NAV.
#[derive(Debug, Clone, Copy)]
struct FundState {
    shares: f64,
    nav: f64,
}

pub struct Broker {
    cash: f64,
    start_cash: f64,
    /// Reject under-funded orders at submit time.
    pub check_submit: bool,
    positions: HashMap<String, Position>,
    orders: Vec<Order>,
    by_ref: HashMap<u64, usize>,
    trades: Vec<Trade>,
    open_trades: HashMap<String, Trade>,
    next_ref: u64,
    next_trade_ref: u64,

    default_comm: Arc<dyn Commission>,
    comm_by_data: HashMap<String, Arc<dyn Commission>>,
    filler: Box<dyn VolumeFiller>,
    pub slippage: SlippageConfig,

    known_data: Vec<String>,
    last_close: HashMap<String, f64>,
    last_dt: HashMap<String, f64>,

    fund: Option<FundState>,
    fund_start_nav: f64,

    order_events: Vec<u64>,
    trade_events: Vec<Trade>,
}

impl Broker {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            start_cash: cash,
            check_submit: true,
            positions: HashMap::new(),
            orders: Vec::new(),
            by_ref: HashMap::new(),
            trades: Vec::new(),
            open_trades: HashMap::new(),
            next_ref: 0,
            next_trade_ref: 0,
            default_comm: Arc::new(CommissionPlan::default()),
            comm_by_data: HashMap::new(),
            filler: Box::new(DefaultFiller),
            slippage: SlippageConfig::default(),
            known_data: Vec::new(),
            last_close: HashMap::new(),
            last_dt: HashMap::new(),
            fund: None,
            fund_start_nav: 100.0,
            order_events: Vec::new(),
            trade_events: Vec::new(),
        }
    }

    // ── configuration ──────────────────────────────────────────────

    pub fn register_data(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.known_data.contains(&name) {
            self.known_data.push(name);
        }
    }

    pub fn set_cash(&mut self, cash: f64) {
        self.cash = cash;
        self.start_cash = cash;
        if let Some(fund) = &mut self.fund {
            fund.shares = cash / self.fund_start_nav;
        }
    }

    pub fn add_cash(&mut self, delta: f64) {
        self.cash += delta;
    }

    pub fn set_commission(&mut self, comm: Arc<dyn Commission>) {
        self.default_comm = comm;
    }

    pub fn set_commission_for(&mut self, data: impl Into<String>, comm: Arc<dyn Commission>) {
        self.comm_by_data.insert(data.into(), comm);
    }

    pub fn commission_for(&self, data: &str) -> &Arc<dyn Commission> {
        self.comm_by_data.get(data).unwrap_or(&self.default_comm)
    }

    pub fn set_filler(&mut self, filler: Box<dyn VolumeFiller>) {
        self.filler = filler;
    }

    pub fn set_slippage(&mut self, slippage: SlippageConfig) {
        self.slippage = slippage;
    }

    pub fn set_fund_mode(&mut self, enabled: bool, start_nav: f64) {
        self.fund_start_nav = start_nav;
        self.fund = enabled.then(|| FundState {
            shares: self.cash / start_nav,
            nav: start_nav,
        });
    }

    pub fn is_fund_mode(&self) -> bool {
        self.fund.is_some()
    }

    pub fn fund_shares(&self) -> f64 {
        self.fund.map(|f| f.shares).unwrap_or(0.0)
    }

    pub fn fund_nav(&self) -> f64 {
        self.fund.map(|f| f.nav).unwrap_or(0.0)
    }

    // ── account state ──────────────────────────────────────────────

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn start_cash(&self) -> f64 {
        self.start_cash
    }

    /// Mark-to-market portfolio value: cash plus every position at its
    /// last seen close.
    pub fn value(&self) -> f64 {
        let mut value = self.cash;
        for (name, pos) in &self.positions {
            if pos.is_open() {
                if let Some(close) = self.last_close.get(name) {
                    value += pos.size * close;
                }
            }
        }
        value
    }

    pub fn position(&self, data: &str) -> Position {
        self.positions.get(data).copied().unwrap_or_default()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, ref_id: u64) -> Option<&Order> {
        self.by_ref.get(&ref_id).map(|&i| &self.orders[i])
    }

    /// Order refs whose status changed since the last drain.
    pub fn take_order_events(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.order_events)
    }

    /// Trade open/close events since the last drain.
    pub fn take_trade_events(&mut self) -> Vec<Trade> {
        std::mem::take(&mut self.trade_events)
    }

    // ── order entry ────────────────────────────────────────────────

    /// Submit an order. Unknown data feeds reject; under-funded orders go
    /// to Margin when `check_submit` is set. Returns the order ref.
    pub fn submit(&mut self, mut order: Order, bar: usize) -> u64 {
        self.next_ref += 1;
        order.ref_id = self.next_ref;
        order.created_bar = bar;
        order.status = OrderStatus::Submitted;

        if !self.known_data.contains(&order.data) {
            debug!(data = %order.data, "rejecting order for unknown data feed");
            order.status = OrderStatus::Rejected;
        } else if self.check_submit && !self.submit_check(&order) {
            debug!(ref_id = order.ref_id, "order failed margin check");
            order.status = OrderStatus::Margin;
        } else {
            order.status = OrderStatus::Accepted;
        }

        let ref_id = order.ref_id;
        self.by_ref.insert(ref_id, self.orders.len());
        self.order_events.push(ref_id);
        self.orders.push(order);
        ref_id
    }

    /// Estimate whether the account can carry the order.
    fn submit_check(&self, order: &Order) -> bool {
        let comm = self.commission_for(&order.data);
        let price_ref = if order.limit_price > 0.0 {
            order.limit_price
        } else if order.stop_price > 0.0 {
            order.stop_price
        } else {
            match self.last_close.get(&order.data) {
                Some(&c) => c,
                None => return true, // no price context yet
            }
        };

        // Orders that reduce exposure never need fresh funds.
        let pos = self.position(&order.data);
        let signed = order.size * order.side.sign();
        if pos.size != 0.0 && (pos.size > 0.0) != (signed > 0.0) && signed.abs() <= pos.size.abs() {
            return true;
        }

        if comm.plan().stock_like {
            if order.is_buy() {
                comm.operation_cost(order.size, price_ref) <= self.cash
            } else {
                true // short sales generate cash
            }
        } else {
            comm.margin(price_ref) * order.size <= self.cash
        }
    }

    /// Cancel an order (and its bracket children). No-op on terminal
    /// orders.
    pub fn cancel(&mut self, ref_id: u64) -> bool {
        let Some(&idx) = self.by_ref.get(&ref_id) else {
            return false;
        };
        if !self.orders[idx].is_alive() {
            return false;
        }
        self.orders[idx].status = OrderStatus::Canceled;
        self.order_events.push(ref_id);
        let children = self.orders[idx].children.clone();
        for child in children {
            self.cancel(child);
        }
        self.apply_oco(ref_id);
        true
    }

    /// Release a bracket group that was submitted with `transmit = false`.
    pub fn transmit_group(&mut self, parent_ref: u64) {
        if let Some(&idx) = self.by_ref.get(&parent_ref) {
            self.orders[idx].transmit = true;
        }
    }

    /// Record bracket children on their parent and OCO-link the stop and
    /// take-profit legs to each other.
    pub fn link_children(&mut self, parent_ref: u64, stop: Option<u64>, limit: Option<u64>) {
        if let Some(&idx) = self.by_ref.get(&parent_ref) {
            for child in [stop, limit].into_iter().flatten() {
                self.orders[idx].children.push(child);
            }
        }
        if let (Some(stop), Some(limit)) = (stop, limit) {
            if let Some(&si) = self.by_ref.get(&stop) {
                self.orders[si].oco = Some(limit);
            }
            if let Some(&li) = self.by_ref.get(&limit) {
                self.orders[li].oco = Some(stop);
            }
        }
    }

    // ── matching ───────────────────────────────────────────────────

    /// Normal per-bar matching: every alive order is tested against the
    /// current bars.
    pub fn next(&mut self, bars: &HashMap<String, BarView>, bar_index: usize) {
        self.charge_interest(bars);
        self.match_orders(bars, bar_index, MatchPhase::Full);
        self.update_marks(bars);
    }

    /// Cheat-on-open: fill market orders at the current bar's open before
    /// the regular matching runs.
    pub fn next_open(&mut self, bars: &HashMap<String, BarView>, bar_index: usize) {
        self.match_orders(bars, bar_index, MatchPhase::OpenOnly);
    }

    /// Cheat-on-close: fill market orders at the current bar's close.
    pub fn next_close(&mut self, bars: &HashMap<String, BarView>, bar_index: usize) {
        self.match_orders(bars, bar_index, MatchPhase::CloseOnly);
        self.update_marks(bars);
    }

    fn update_marks(&mut self, bars: &HashMap<String, BarView>) {
        for (name, bar) in bars {
            self.last_close.insert(name.clone(), bar.close);
            self.last_dt.insert(name.clone(), bar.datetime);
        }
        if let Some(fund) = self.fund {
            let value = self.value();
            if fund.shares > 0.0 {
                self.fund = Some(FundState {
                    shares: fund.shares,
                    nav: value / fund.shares,
                });
            }
        }
    }

    /// Daily interest on held positions, per the data's commission rule.
    fn charge_interest(&mut self, bars: &HashMap<String, BarView>) {
        let mut charges = Vec::new();
        for (name, pos) in &self.positions {
            if !pos.is_open() {
                continue;
            }
            let (Some(bar), Some(&prev_dt)) = (bars.get(name), self.last_dt.get(name)) else {
                continue;
            };
            let days = bar.datetime - prev_dt;
            if days <= 0.0 {
                continue;
            }
            let comm = self.commission_for(name);
            let charge = comm.interest(pos.size, bar.close, days);
            if charge > 0.0 {
                charges.push(charge);
            }
        }
        for charge in charges {
            self.cash -= charge;
        }
    }

    fn match_orders(&mut self, bars: &HashMap<String, BarView>, bar_index: usize, phase: MatchPhase) {
        for idx in 0..self.orders.len() {
            if !self.orders[idx].is_alive() {
                continue;
            }

            // Bracket gating: a group submitted with transmit=false is
            // held; children wait for their parent to fill.
            if !self.group_transmitted(idx) {
                continue;
            }
            if let Some(parent_ref) = self.orders[idx].parent {
                match self.order(parent_ref).map(|o| o.status) {
                    Some(OrderStatus::Completed) => {}
                    Some(s) if s.is_terminal() => {
                        let ref_id = self.orders[idx].ref_id;
                        self.cancel(ref_id);
                        continue;
                    }
                    _ => continue, // parent still working
                }
            }

            let Some(&bar) = bars.get(&self.orders[idx].data) else {
                continue;
            };

            // A fresh trailing stop has no trigger price yet; seed it from
            // the first bar it sees and start matching on the next.
            if self.orders[idx].trail.is_some() && self.orders[idx].stop_price == 0.0 {
                self.orders[idx].trail_adjust(bar.close);
                continue;
            }

            // Validity expiry (non-market orders only).
            if self.orders[idx].check_expiry(bar.datetime) {
                let ref_id = self.orders[idx].ref_id;
                self.order_events.push(ref_id);
                continue;
            }

            if let Some((raw_price, at_open, limit_derived)) =
                self.try_trigger(idx, bar, phase)
            {
                let order = &self.orders[idx];
                let slip_applies = if at_open {
                    self.slippage.slip_open
                } else if limit_derived {
                    self.slippage.slip_limit
                } else {
                    self.slippage.slip_match
                };
                let price = if slip_applies && self.slippage.is_active() {
                    self.slippage.apply(raw_price, order.is_buy(), bar.low, bar.high)
                } else {
                    raw_price
                };

                let fill_size = self.filler.fill(order, price, bar.volume);
                if fill_size <= 0.0 {
                    continue;
                }
                self.execute(idx, price, fill_size, bar_index, bar.datetime);
            }

            // Trailing stops ratchet on every bar they survive.
            if self.orders[idx].is_alive() {
                self.orders[idx].trail_adjust(bar.close);
            }
        }
    }

    fn group_transmitted(&self, idx: usize) -> bool {
        let order = &self.orders[idx];
        let root_ref = order.parent.unwrap_or(order.ref_id);
        self.order(root_ref).map(|o| o.transmit).unwrap_or(true)
    }

    /// Evaluate the §matching table. Returns the chosen raw fill price,
    /// whether it is exactly the bar open, and whether it is
    /// limit-derived.
    fn try_trigger(&mut self, idx: usize, bar: BarView, phase: MatchPhase) -> Option<(f64, bool, bool)> {
        let order = &mut self.orders[idx];
        let is_buy = order.is_buy();

        match phase {
            MatchPhase::OpenOnly => {
                return match order.kind {
                    OrderKind::Market => Some((bar.open, true, false)),
                    _ => None,
                };
            }
            MatchPhase::CloseOnly => {
                return match order.kind {
                    OrderKind::Market | OrderKind::Close => Some((bar.close, false, false)),
                    _ => None,
                };
            }
            MatchPhase::Full => {}
        }

        match order.kind {
            OrderKind::Market => Some((bar.open, true, false)),
            OrderKind::Close => Some((bar.close, false, false)),
            OrderKind::Historical => Some((order.limit_price, false, false)),
            OrderKind::Limit => limit_trigger(is_buy, order.limit_price, bar),
            OrderKind::Stop | OrderKind::StopTrail => {
                stop_trigger(is_buy, order.stop_price, bar)
            }
            OrderKind::StopLimit | OrderKind::StopTrailLimit => {
                if !order.triggered {
                    if stop_trigger(is_buy, order.stop_price, bar).is_some() {
                        order.triggered = true;
                        // From the trigger bar on it rests as a limit.
                        limit_trigger(is_buy, order.limit_price, bar)
                    } else {
                        None
                    }
                } else {
                    limit_trigger(is_buy, order.limit_price, bar)
                }
            }
        }
    }

    /// Execute a fill: commission, cash, position, trade and order state.
    fn execute(&mut self, idx: usize, price: f64, size: f64, bar_index: usize, dt: f64) {
        let (data, side, ref_id) = {
            let o = &self.orders[idx];
            (o.data.clone(), o.side, o.ref_id)
        };
        let comm = Arc::clone(self.commission_for(&data));
        let signed = size * side.sign();

        let pos = self.positions.entry(data.clone()).or_default();
        let entry_price_before = pos.price;
        let (opened, closed) = pos.update(signed, price);
        let (psize, pprice) = (pos.size, pos.price);

        // Commission on the actual fill, split across the opened and
        // closed portions.
        let total_comm = comm.commission(signed, price);
        let (opened_comm, closed_comm) = if opened != 0.0 && closed != 0.0 {
            let w = opened.abs() / (opened.abs() + closed.abs());
            (total_comm * w, total_comm * (1.0 - w))
        } else if opened != 0.0 {
            (total_comm, 0.0)
        } else {
            (0.0, total_comm)
        };

        // Cash: closed portion settles against the old basis, opened
        // portion pays or locks per the asset class.
        let closed_value = comm.value_size(closed, price);
        let opened_value = comm.value_size(opened, price);
        let pnl = if closed != 0.0 {
            comm.profit_and_loss(-closed, entry_price_before, price)
        } else {
            0.0
        };
        self.cash += comm.cash_adjust_close(closed, entry_price_before, price);
        self.cash += comm.cash_adjust_open(opened, price);
        self.cash -= total_comm;

        debug!(
            ref_id,
            data = %data,
            price,
            size,
            side = ?side,
            cash = self.cash,
            "order fill"
        );

        self.orders[idx].apply_execution(ExecutionBit {
            dt,
            size: signed,
            price,
            closed,
            closed_value,
            closed_comm,
            opened,
            opened_value,
            opened_comm,
            pnl,
            psize,
            pprice,
        });
        self.order_events.push(ref_id);

        self.track_trade(
            &data, bar_index, dt, price, opened, closed, opened_comm, closed_comm, psize,
        );

        if self.orders[idx].is_completed() {
            self.apply_oco(ref_id);
        }
    }

    /// Maintain the per-data round-trip trade.
    #[allow(clippy::too_many_arguments)]
    fn track_trade(
        &mut self,
        data: &str,
        bar: usize,
        dt: f64,
        price: f64,
        opened: f64,
        closed: f64,
        opened_comm: f64,
        closed_comm: f64,
        position_after: f64,
    ) {
        if closed != 0.0 {
            if let Some(mut trade) = self.open_trades.remove(data) {
                if position_after == 0.0 || opened != 0.0 {
                    // Flat (or flipped): the round trip ends here.
                    trade.close(bar, dt, price, closed_comm);
                    self.trade_events.push(trade.clone());
                    self.trades.push(trade);
                } else {
                    // Partial close: accumulate costs, stay open.
                    trade.commission += closed_comm;
                    trade.size = position_after;
                    self.open_trades.insert(data.to_string(), trade);
                }
            }
        }

        if opened != 0.0 {
            match self.open_trades.get_mut(data) {
                Some(trade) => {
                    // Same-side extension: track the new average basis.
                    trade.commission += opened_comm;
                    trade.size = position_after;
                    trade.price_open = self.positions.get(data).map(|p| p.price).unwrap_or(price);
                    trade.is_long = position_after > 0.0;
                }
                None => {
                    self.next_trade_ref += 1;
                    let trade = Trade::open(
                        self.next_trade_ref,
                        data,
                        bar,
                        dt,
                        price,
                        opened,
                        opened_comm,
                    );
                    self.trade_events.push(trade.clone());
                    self.open_trades.insert(data.to_string(), trade);
                }
            }
        }
    }

    /// One side of an OCO pair finishing cancels the other.
    fn apply_oco(&mut self, ref_id: u64) {
        let oco_ref = self.order(ref_id).and_then(|o| o.oco);
        if let Some(oco_ref) = oco_ref {
            if self.order(oco_ref).map(|o| o.is_alive()).unwrap_or(false) {
                if let Some(&idx) = self.by_ref.get(&oco_ref) {
                    self.orders[idx].status = OrderStatus::Canceled;
                    self.order_events.push(oco_ref);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.cash = self.start_cash;
        self.positions.clear();
        self.orders.clear();
        self.by_ref.clear();
        self.trades.clear();
        self.open_trades.clear();
        self.next_ref = 0;
        self.next_trade_ref = 0;
        self.last_close.clear();
        self.last_dt.clear();
        self.order_events.clear();
        self.trade_events.clear();
        if self.fund.is_some() {
            self.fund = Some(FundState {
                shares: self.cash / self.fund_start_nav,
                nav: self.fund_start_nav,
            });
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchPhase {
    Full,
    OpenOnly,
    CloseOnly,
}

/// Limit matching: buys need the bar to trade at or below the limit and
/// fill at the better of open and limit; sells mirror.
fn limit_trigger(is_buy: bool, limit: f64, bar: BarView) -> Option<(f64, bool, bool)> {
    if is_buy {
        (bar.low <= limit).then(|| {
            let price = bar.open.min(limit);
            (price, price == bar.open && bar.open < limit, true)
        })
    } else {
        (bar.high >= limit).then(|| {
            let price = bar.open.max(limit);
            (price, price == bar.open && bar.open > limit, true)
        })
    }
}

/// Stop matching: buys trigger when the bar trades at or above the stop
/// and fill at the worse of open and stop; sells mirror.
fn stop_trigger(is_buy: bool, stop: f64, bar: BarView) -> Option<(f64, bool, bool)> {
    if is_buy {
        (bar.high >= stop).then(|| {
            let price = bar.open.max(stop);
            (price, price == bar.open && bar.open > stop, false)
        })
    } else {
        (bar.low <= stop).then(|| {
            let price = bar.open.min(stop);
            (price, price == bar.open && bar.open < stop, false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> BarView {
        BarView {
            open,
            high,
            low,
            close,
            volume: 1_000_000.0,
            datetime: 0.0,
        }
    }

    fn bars(name: &str, view: BarView) -> HashMap<String, BarView> {
        HashMap::from([(name.to_string(), view)])
    }

    fn broker() -> Broker {
        let mut b = Broker::new(100_000.0);
        b.register_data("spy");
        b
    }

    fn market(side: Side, size: f64) -> Order {
        Order::new(0, side, OrderKind::Market, size, "spy")
    }

    #[test]
    fn market_buy_fills_at_open() {
        let mut b = broker();
        let ref_id = b.submit(market(Side::Buy, 10.0), 0);
        b.next(&bars("spy", bar(104.5, 106.0, 103.0, 105.0)), 1);

        let order = b.order(ref_id).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.executed.price, 104.5);
        assert_eq!(b.position("spy").size, 10.0);
        assert!((b.cash() - (100_000.0 - 1045.0)).abs() < 1e-9);
    }

    #[test]
    fn close_order_fills_at_close() {
        let mut b = broker();
        let ref_id = b.submit(
            Order::new(0, Side::Buy, OrderKind::Close, 5.0, "spy"),
            0,
        );
        b.next(&bars("spy", bar(100.0, 102.0, 99.0, 101.5)), 1);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 101.5);
    }

    #[test]
    fn limit_buy_needs_touch() {
        let mut b = broker();
        let mut o = Order::new(0, Side::Buy, OrderKind::Limit, 10.0, "spy");
        o.limit_price = 98.0;
        let ref_id = b.submit(o, 0);

        // Low stays above the limit: no fill.
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.5)), 1);
        assert!(b.order(ref_id).unwrap().is_alive());

        // Touches: fills at min(open, limit).
        b.next(&bars("spy", bar(99.0, 100.0, 97.5, 98.5)), 2);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 98.0);
    }

    #[test]
    fn limit_buy_gap_down_fills_at_open() {
        let mut b = broker();
        let mut o = Order::new(0, Side::Buy, OrderKind::Limit, 10.0, "spy");
        o.limit_price = 98.0;
        let ref_id = b.submit(o, 0);
        b.next(&bars("spy", bar(95.0, 96.0, 94.0, 95.5)), 1);
        // Better than the limit: price improvement at the open.
        assert_eq!(b.order(ref_id).unwrap().executed.price, 95.0);
    }

    #[test]
    fn stop_sell_triggers_on_low() {
        let mut b = broker();
        // Own 10 first.
        b.submit(market(Side::Buy, 10.0), 0);
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);

        let mut stop = Order::new(0, Side::Sell, OrderKind::Stop, 10.0, "spy");
        stop.stop_price = 95.0;
        let ref_id = b.submit(stop, 1);

        b.next(&bars("spy", bar(97.0, 98.0, 96.0, 97.0)), 2);
        assert!(b.order(ref_id).unwrap().is_alive());

        b.next(&bars("spy", bar(96.0, 96.5, 94.0, 94.5)), 3);
        // min(open, stop) = 95.0
        assert_eq!(b.order(ref_id).unwrap().executed.price, 95.0);
        assert_eq!(b.position("spy").size, 0.0);
    }

    #[test]
    fn stop_gap_through_fills_at_open() {
        let mut b = broker();
        b.submit(market(Side::Buy, 10.0), 0);
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);

        let mut stop = Order::new(0, Side::Sell, OrderKind::Stop, 10.0, "spy");
        stop.stop_price = 95.0;
        let ref_id = b.submit(stop, 1);
        b.next(&bars("spy", bar(90.0, 91.0, 89.0, 90.5)), 2);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 90.0);
    }

    #[test]
    fn stop_limit_two_phase() {
        let mut b = broker();
        let mut o = Order::new(0, Side::Buy, OrderKind::StopLimit, 10.0, "spy");
        o.stop_price = 105.0;
        o.limit_price = 104.0;
        let ref_id = b.submit(o, 0);

        // Stop triggers, but the bar never comes back to the limit.
        b.next(&bars("spy", bar(104.5, 106.0, 104.4, 105.8)), 1);
        let order = b.order(ref_id).unwrap();
        assert!(order.triggered);
        assert!(order.is_alive());

        // Next bar trades through the limit.
        b.next(&bars("spy", bar(104.5, 105.0, 103.0, 103.5)), 2);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 104.0);
    }

    #[test]
    fn trailing_stop_ratchets_then_fires() {
        let mut b = broker();
        b.submit(market(Side::Buy, 10.0), 0);
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);

        let mut trail = Order::new(0, Side::Sell, OrderKind::StopTrail, 10.0, "spy");
        trail.trail = Some(crate::order::TrailBy::Amount(5.0));
        let ref_id = b.submit(trail, 1);

        // Rising closes pull the stop up: 100-5=95, then 110-5=105.
        b.next(&bars("spy", bar(100.0, 111.0, 100.0, 110.0)), 2);
        assert_eq!(b.order(ref_id).unwrap().stop_price, 105.0);

        // Pullback through 105 fires the stop.
        b.next(&bars("spy", bar(108.0, 109.0, 104.0, 104.5)), 3);
        let order = b.order(ref_id).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.executed.price, 105.0);
    }

    #[test]
    fn unknown_data_is_rejected() {
        let mut b = broker();
        let ref_id = b.submit(Order::new(0, Side::Buy, OrderKind::Market, 1.0, "ghost"), 0);
        assert_eq!(b.order(ref_id).unwrap().status, OrderStatus::Rejected);
    }

    #[test]
    fn underfunded_buy_goes_margin() {
        let mut b = Broker::new(100.0);
        b.register_data("spy");
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 0);
        let ref_id = b.submit(market(Side::Buy, 1000.0), 0);
        assert_eq!(b.order(ref_id).unwrap().status, OrderStatus::Margin);
    }

    #[test]
    fn oco_cancels_sibling() {
        let mut b = broker();
        b.submit(market(Side::Buy, 1.0), 0);
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);

        let mut stop = Order::new(0, Side::Sell, OrderKind::Stop, 1.0, "spy");
        stop.stop_price = 95.0;
        let stop_ref = b.submit(stop, 1);
        let mut limit = Order::new(0, Side::Sell, OrderKind::Limit, 1.0, "spy");
        limit.limit_price = 110.0;
        let limit_ref = b.submit(limit, 1);

        // Link as OCO pair.
        let stop_idx = *b.by_ref.get(&stop_ref).unwrap();
        b.orders[stop_idx].oco = Some(limit_ref);
        let limit_idx = *b.by_ref.get(&limit_ref).unwrap();
        b.orders[limit_idx].oco = Some(stop_ref);

        // Stop fires; limit must die with it.
        b.next(&bars("spy", bar(96.0, 97.0, 94.0, 94.5)), 2);
        assert_eq!(b.order(stop_ref).unwrap().status, OrderStatus::Completed);
        assert_eq!(b.order(limit_ref).unwrap().status, OrderStatus::Canceled);
    }

    #[test]
    fn bracket_children_wait_for_parent() {
        let mut b = broker();
        let mut parent = Order::new(0, Side::Buy, OrderKind::Limit, 1.0, "spy");
        parent.limit_price = 95.0;
        let parent_ref = b.submit(parent, 0);

        let mut stop = Order::new(0, Side::Sell, OrderKind::Stop, 1.0, "spy");
        stop.stop_price = 90.0;
        stop.parent = Some(parent_ref);
        let stop_ref = b.submit(stop, 0);

        // Bar trades through the child's stop but the parent never fills:
        // the child must not execute.
        b.next(&bars("spy", bar(99.0, 100.0, 96.0, 97.0)), 1);
        assert!(b.order(stop_ref).unwrap().is_alive());
        assert_eq!(b.order(stop_ref).unwrap().executed.size, 0.0);

        // Parent fills; child becomes active and can fire later.
        b.next(&bars("spy", bar(96.0, 97.0, 94.0, 95.5)), 2);
        assert_eq!(b.order(parent_ref).unwrap().status, OrderStatus::Completed);
        b.next(&bars("spy", bar(91.0, 92.0, 89.0, 89.5)), 3);
        assert_eq!(b.order(stop_ref).unwrap().status, OrderStatus::Completed);
    }

    #[test]
    fn parent_cancel_cancels_children() {
        let mut b = broker();
        let mut parent = Order::new(0, Side::Buy, OrderKind::Limit, 1.0, "spy");
        parent.limit_price = 90.0;
        let parent_ref = b.submit(parent, 0);
        let mut child = Order::new(0, Side::Sell, OrderKind::Stop, 1.0, "spy");
        child.stop_price = 85.0;
        child.parent = Some(parent_ref);
        let child_ref = b.submit(child, 0);

        let parent_idx = *b.by_ref.get(&parent_ref).unwrap();
        b.orders[parent_idx].children.push(child_ref);

        b.cancel(parent_ref);
        assert_eq!(b.order(child_ref).unwrap().status, OrderStatus::Canceled);
    }

    #[test]
    fn validity_expires_non_market() {
        let mut b = broker();
        let mut o = Order::new(0, Side::Buy, OrderKind::Limit, 1.0, "spy");
        o.limit_price = 90.0;
        o.valid_until = 5.0;
        let ref_id = b.submit(o, 0);

        let mut view = bar(100.0, 101.0, 99.0, 100.0);
        view.datetime = 6.0;
        b.next(&bars("spy", view), 1);
        assert_eq!(b.order(ref_id).unwrap().status, OrderStatus::Expired);
    }

    #[test]
    fn partial_fill_with_volume_cap() {
        let mut b = broker();
        b.set_filler(Box::new(FixedVolumeFiller::new(30.0)));
        let ref_id = b.submit(market(Side::Buy, 100.0), 0);

        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);
        let order = b.order(ref_id).unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.executed.size, 30.0);
        assert_eq!(order.remaining(), 70.0);

        // Keeps filling on following bars.
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 2);
        assert_eq!(b.order(ref_id).unwrap().executed.size, 60.0);
    }

    #[test]
    fn slippage_worsens_market_fill() {
        let mut b = broker();
        b.set_slippage(SlippageConfig {
            slip_open: true,
            ..SlippageConfig::fixed(0.5)
        });
        let ref_id = b.submit(market(Side::Buy, 10.0), 0);
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 100.5);
    }

    #[test]
    fn cash_value_identity() {
        let mut b = broker();
        b.submit(market(Side::Buy, 10.0), 0);
        let view = bar(100.0, 101.0, 99.0, 100.5);
        b.next(&bars("spy", view), 1);
        let expect = b.cash() + 10.0 * 100.5;
        assert!((b.value() - expect).abs() < 1e-9);
    }

    #[test]
    fn round_trip_creates_closed_trade() {
        let mut b = broker();
        b.set_commission(Arc::new(CommissionPlan::stocks(0.001, true)));
        b.submit(market(Side::Buy, 100.0), 0);
        b.next(&bars("spy", bar(50.0, 51.0, 49.0, 50.0)), 1);
        b.submit(market(Side::Sell, 100.0), 1);
        b.next(&bars("spy", bar(55.0, 56.0, 54.0, 55.0)), 2);

        let closed: Vec<_> = b.trades().iter().filter(|t| !t.is_open).collect();
        assert_eq!(closed.len(), 1);
        let t = closed[0];
        assert!((t.pnl - 500.0).abs() < 1e-9);
        assert!((t.commission - 10.5).abs() < 1e-9);
        assert!((t.pnl_comm - 489.5).abs() < 1e-9);
    }

    #[test]
    fn fund_mode_tracks_nav() {
        let mut b = broker();
        b.set_fund_mode(true, 100.0);
        assert_eq!(b.fund_shares(), 1000.0);

        b.submit(market(Side::Buy, 100.0), 0);
        b.next(&bars("spy", bar(100.0, 101.0, 99.0, 100.0)), 1);
        // Position flat vs cash: NAV still 100.
        assert!((b.fund_nav() - 100.0).abs() < 1e-9);

        b.next(&bars("spy", bar(110.0, 111.0, 109.0, 110.0)), 2);
        // Value rose by 100 shares * 10 = 1000 on 100k: NAV 101.
        assert!((b.fund_nav() - 101.0).abs() < 1e-9);
    }

    #[test]
    fn cheat_on_close_fills_at_current_close() {
        let mut b = broker();
        let ref_id = b.submit(market(Side::Buy, 10.0), 0);
        b.next_close(&bars("spy", bar(100.0, 101.0, 99.0, 100.75)), 0);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 100.75);
    }

    #[test]
    fn cheat_on_open_fills_at_current_open() {
        let mut b = broker();
        let ref_id = b.submit(market(Side::Buy, 10.0), 0);
        b.next_open(&bars("spy", bar(104.5, 106.0, 103.0, 105.0)), 0);
        assert_eq!(b.order(ref_id).unwrap().executed.price, 104.5);
    }
}
