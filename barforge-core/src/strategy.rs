//! Strategy trait and its trading context.
//!
//! Strategies never hold references into the engine. Every lifecycle hook
//! receives a context borrowing the broker, feeds and indicator bank for
//! the duration of the call; indicators are created during `on_start`
//! through the setup context and addressed by id afterwards.

use crate::broker::Broker;
use crate::engine::{IndicatorBank, IndicatorId, SourceRef};
use crate::error::{Error, Result};
use crate::feed::DataFeed;
use crate::indicators::Indicator;
use crate::order::{Order, OrderKind, Side, TrailBy};
use crate::params::ParamValue;
use crate::sizer::{Sizer, SizingInput};
use crate::timer::{Timer, TimerManager};
use crate::trade::Trade;
use chrono::NaiveDateTime;

/// Data feed lifecycle states reported to strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    Live,
    Delayed,
    Loaded,
}

/// Context for `on_start`: declare indicators and timers.
pub struct SetupCtx<'a> {
    pub(crate) bank: &'a mut IndicatorBank,
    pub(crate) timers: &'a mut TimerManager,
    pub(crate) feeds: &'a [Box<dyn DataFeed>],
}

impl SetupCtx<'_> {
    /// Register an indicator fed by the given sources. Sources must
    /// already exist (a data line, or an indicator added earlier).
    pub fn add_indicator(
        &mut self,
        indicator: Box<dyn Indicator>,
        sources: Vec<SourceRef>,
    ) -> IndicatorId {
        self.bank.add(indicator, sources)
    }

    /// Shorthand: indicator over a feed's close line.
    pub fn add_indicator_on_close(
        &mut self,
        indicator: Box<dyn Indicator>,
        feed: usize,
    ) -> IndicatorId {
        self.add_indicator(indicator, vec![SourceRef::close(feed)])
    }

    pub fn add_timer(&mut self, timer: Timer) -> u64 {
        self.timers.add(timer)
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn feed_name(&self, idx: usize) -> &str {
        self.feeds[idx].name()
    }
}

/// Bracket order configuration. Zero prices omit the corresponding child.
#[derive(Debug, Clone, Copy)]
pub struct BracketSpec {
    /// 0 = ask the sizer.
    pub size: f64,
    /// Entry limit price; 0 = market entry.
    pub price: f64,
    /// Stop-loss trigger; 0 = no stop child.
    pub stop_price: f64,
    /// Take-profit limit; 0 = no limit child.
    pub limit_price: f64,
    /// Trailing stop child instead of a fixed stop.
    pub trail: Option<TrailBy>,
    /// Expiry for all three legs (0 = good-till-cancelled).
    pub valid: f64,
    /// Transmit the group immediately; false holds it for
    /// `Broker::transmit_group`.
    pub transmit: bool,
}

impl Default for BracketSpec {
    fn default() -> Self {
        Self {
            size: 0.0,
            price: 0.0,
            stop_price: 0.0,
            limit_price: 0.0,
            trail: None,
            valid: 0.0,
            transmit: true,
        }
    }
}

/// Per-bar context handed to lifecycle hooks.
pub struct Ctx<'a> {
    pub(crate) broker: &'a mut Broker,
    pub(crate) feeds: &'a [Box<dyn DataFeed>],
    pub(crate) bank: &'a IndicatorBank,
    pub(crate) sizer: &'a dyn Sizer,
    pub(crate) bar_index: usize,
    pub(crate) bar_count: usize,
}

impl Ctx<'_> {
    // ── data access ────────────────────────────────────────────────

    pub fn bar_index(&self) -> usize {
        self.bar_index
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn data(&self, feed: usize) -> &crate::lines::FeedSeries {
        self.feeds[feed].series()
    }

    pub fn open(&self, feed: usize, k: i64) -> f64 {
        self.data(feed).open().get(k)
    }

    pub fn high(&self, feed: usize, k: i64) -> f64 {
        self.data(feed).high().get(k)
    }

    pub fn low(&self, feed: usize, k: i64) -> f64 {
        self.data(feed).low().get(k)
    }

    pub fn close(&self, feed: usize, k: i64) -> f64 {
        self.data(feed).close().get(k)
    }

    pub fn volume(&self, feed: usize, k: i64) -> f64 {
        self.data(feed).volume().get(k)
    }

    pub fn datetime(&self, feed: usize, k: i64) -> f64 {
        self.data(feed).datetime().get(k)
    }

    /// Indicator value (first output line) at offset `k`.
    pub fn ind(&self, id: IndicatorId, k: i64) -> f64 {
        self.bank.value(id, 0, k)
    }

    /// Indicator value on a named output position.
    pub fn ind_line(&self, id: IndicatorId, line: usize, k: i64) -> f64 {
        self.bank.value(id, line, k)
    }

    pub fn ind_ready(&self, id: IndicatorId) -> bool {
        self.bank.ready(id)
    }

    // ── account ────────────────────────────────────────────────────

    pub fn cash(&self) -> f64 {
        self.broker.cash()
    }

    pub fn value(&self) -> f64 {
        self.broker.value()
    }

    pub fn position(&self, feed: usize) -> f64 {
        self.broker.position(self.feeds[feed].name()).size
    }

    pub fn position_price(&self, feed: usize) -> f64 {
        self.broker.position(self.feeds[feed].name()).price
    }

    // ── trading ────────────────────────────────────────────────────

    fn sized(&mut self, feed: usize, size: f64, is_buy: bool) -> f64 {
        if size > 0.0 {
            return size;
        }
        let name = self.feeds[feed].name();
        let input = SizingInput {
            comm: self.broker.commission_for(name).as_ref(),
            cash: self.broker.cash(),
            price: self.close(feed, 0),
            position: self.broker.position(name).size,
            is_buy,
        };
        self.sizer.size_for(&input)
    }

    fn submit(&mut self, order: Order) -> u64 {
        self.broker.submit(order, self.bar_index)
    }

    /// Market buy. `size` 0 asks the sizer; returns None when the sizer
    /// yields nothing.
    pub fn buy(&mut self, feed: usize, size: f64) -> Option<u64> {
        let size = self.sized(feed, size, true);
        if size <= 0.0 {
            return None;
        }
        let order = Order::new(0, Side::Buy, OrderKind::Market, size, self.feeds[feed].name());
        Some(self.submit(order))
    }

    pub fn sell(&mut self, feed: usize, size: f64) -> Option<u64> {
        let size = self.sized(feed, size, false);
        if size <= 0.0 {
            return None;
        }
        let order = Order::new(0, Side::Sell, OrderKind::Market, size, self.feeds[feed].name());
        Some(self.submit(order))
    }

    /// Buy resting at a limit price.
    pub fn buy_limit(&mut self, feed: usize, size: f64, limit: f64) -> Option<u64> {
        let size = self.sized(feed, size, true);
        if size <= 0.0 {
            return None;
        }
        let mut order = Order::new(0, Side::Buy, OrderKind::Limit, size, self.feeds[feed].name());
        order.limit_price = limit;
        Some(self.submit(order))
    }

    pub fn sell_limit(&mut self, feed: usize, size: f64, limit: f64) -> Option<u64> {
        let size = self.sized(feed, size, false);
        if size <= 0.0 {
            return None;
        }
        let mut order = Order::new(0, Side::Sell, OrderKind::Limit, size, self.feeds[feed].name());
        order.limit_price = limit;
        Some(self.submit(order))
    }

    /// Submit a fully built order (stops, trails, validity).
    pub fn submit_order(&mut self, order: Order) -> u64 {
        self.submit(order)
    }

    /// Flatten the position with a market order.
    pub fn close_position(&mut self, feed: usize) -> Option<u64> {
        let pos = self.position(feed);
        if pos == 0.0 {
            return None;
        }
        let side = if pos > 0.0 { Side::Sell } else { Side::Buy };
        let order = Order::new(0, side, OrderKind::Market, pos.abs(), self.feeds[feed].name());
        Some(self.submit(order))
    }

    /// Order the delta needed to reach a target signed position size.
    pub fn order_target_size(&mut self, feed: usize, target: f64) -> Option<u64> {
        let delta = target - self.position(feed);
        if delta == 0.0 {
            return None;
        }
        let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
        let order = Order::new(0, side, OrderKind::Market, delta.abs(), self.feeds[feed].name());
        Some(self.submit(order))
    }

    /// Order toward a target position value at the current close.
    pub fn order_target_value(&mut self, feed: usize, target: f64) -> Option<u64> {
        let price = self.close(feed, 0);
        if price <= 0.0 || !price.is_finite() {
            return None;
        }
        let current = self.position(feed) * price;
        let delta_size = (target - current) / price;
        if delta_size == 0.0 {
            return None;
        }
        self.order_target_size(feed, self.position(feed) + delta_size)
    }

    /// Order toward a target percentage of total portfolio value.
    pub fn order_target_percent(&mut self, feed: usize, percent: f64) -> Option<u64> {
        let target = self.value() * percent / 100.0;
        self.order_target_value(feed, target)
    }

    /// Long entry with protective stop and take-profit, OCO-linked.
    /// Returns `(main, stop, limit)` refs; omitted legs are None.
    pub fn buy_bracket(&mut self, feed: usize, spec: BracketSpec) -> Option<(u64, Option<u64>, Option<u64>)> {
        self.bracket(feed, Side::Buy, spec)
    }

    /// Short entry bracket: stop above, take-profit below.
    pub fn sell_bracket(&mut self, feed: usize, spec: BracketSpec) -> Option<(u64, Option<u64>, Option<u64>)> {
        self.bracket(feed, Side::Sell, spec)
    }

    fn bracket(
        &mut self,
        feed: usize,
        side: Side,
        spec: BracketSpec,
    ) -> Option<(u64, Option<u64>, Option<u64>)> {
        let size = self.sized(feed, spec.size, side == Side::Buy);
        if size <= 0.0 {
            return None;
        }
        let name = self.feeds[feed].name().to_string();
        let child_side = match side {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        };

        let mut main = if spec.price > 0.0 {
            let mut o = Order::new(0, side, OrderKind::Limit, size, name.as_str());
            o.limit_price = spec.price;
            o
        } else {
            Order::new(0, side, OrderKind::Market, size, name.as_str())
        };
        main.valid_until = spec.valid;
        main.transmit = spec.transmit;
        let main_ref = self.submit(main);

        let stop_ref = if spec.stop_price > 0.0 || spec.trail.is_some() {
            let kind = if spec.trail.is_some() {
                OrderKind::StopTrail
            } else {
                OrderKind::Stop
            };
            let mut stop = Order::new(0, child_side, kind, size, name.as_str());
            stop.stop_price = spec.stop_price;
            stop.trail = spec.trail;
            stop.parent = Some(main_ref);
            stop.valid_until = spec.valid;
            Some(self.submit(stop))
        } else {
            None
        };

        let limit_ref = if spec.limit_price > 0.0 {
            let mut limit = Order::new(0, child_side, OrderKind::Limit, size, name.as_str());
            limit.limit_price = spec.limit_price;
            limit.parent = Some(main_ref);
            limit.valid_until = spec.valid;
            Some(self.submit(limit))
        } else {
            None
        };

        self.broker.link_children(main_ref, stop_ref, limit_ref);
        Some((main_ref, stop_ref, limit_ref))
    }

    pub fn cancel(&mut self, order_ref: u64) -> bool {
        self.broker.cancel(order_ref)
    }

    /// Release a bracket group submitted with `transmit = false`.
    pub fn transmit(&mut self, parent_ref: u64) {
        self.broker.transmit_group(parent_ref);
    }

    pub fn order(&self, order_ref: u64) -> Option<&Order> {
        self.broker.order(order_ref)
    }
}

/// User-implemented trading logic.
///
/// Hook order per bar: the cheat-open family (under cheat-on-open only),
/// broker matching, then `prenext` while warming up, `nextstart` exactly
/// once when ready, `next` thereafter, followed by the notification
/// callbacks.
#[allow(unused_variables)]
pub trait Strategy: Send {
    /// Create indicators and timers. Called once before the first bar.
    fn on_start(&mut self, ctx: &mut SetupCtx) {}

    /// Called while indicators are still warming up.
    fn prenext(&mut self, ctx: &mut Ctx) {}

    /// First bar on which every indicator is ready; defaults to `next`.
    fn nextstart(&mut self, ctx: &mut Ctx) {
        self.next(ctx);
    }

    /// Called once per bar after warm-up.
    fn next(&mut self, ctx: &mut Ctx) {}

    /// Cheat-on-open variants, invoked before broker matching with only
    /// the open of the current bar to be trusted.
    fn prenext_open(&mut self, ctx: &mut Ctx) {}

    fn nextstart_open(&mut self, ctx: &mut Ctx) {
        self.next_open(ctx);
    }

    fn next_open(&mut self, ctx: &mut Ctx) {}

    /// Called after the last bar.
    fn on_stop(&mut self, ctx: &mut Ctx) {}

    fn notify_order(&mut self, order: &Order) {}

    fn notify_trade(&mut self, trade: &Trade) {}

    fn notify_cash_value(&mut self, cash: f64, value: f64) {}

    fn notify_fund(&mut self, cash: f64, value: f64, nav: f64, shares: f64) {}

    /// Data feed status change; in a closed-world backtest this fires
    /// once per feed when it finishes loading.
    fn notify_data(&mut self, feed: usize, status: DataStatus) {}

    /// Store/connector messages. Reserved for live integrations; the
    /// backtest engine never emits any.
    fn notify_store(&mut self, message: &str) {}

    fn notify_timer(&mut self, timer_id: u64, when: NaiveDateTime) {}

    /// Optimization-time parameter override. Unknown keys are an error so
    /// a sweep over a typo fails loudly rather than silently running the
    /// defaults.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let _ = value;
        Err(Error::ParamNotFound(name.to_string()))
    }

    /// Extra warm-up on top of what the registered indicators require.
    fn min_period_hint(&self) -> usize {
        1
    }
}
