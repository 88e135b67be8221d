//! Cerebro: owns every component and drives the per-bar loop.

use crate::analyzers::Analyzer;
use crate::broker::{BarPolicy, BarView, Broker};
use crate::error::Result;
use crate::feed::{days_to_datetime, DataFeed};
use crate::indicators::Indicator;
use crate::lines::ohlcv;
use crate::observers::{CashObserver, Observer, ValueObserver};
use crate::sizer::{FixedSizer, Sizer};
use crate::strategy::{Ctx, SetupCtx, Strategy};
use crate::timer::TimerManager;
use crate::trade::Trade;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to an indicator registered in the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorId(pub(crate) usize);

/// Where an indicator reads its input.
#[derive(Debug, Clone, Copy)]
pub enum SourceRef {
    /// A line of a data feed, by OHLCV line index.
    DataLine { feed: usize, line: usize },
    /// An output line of a previously registered indicator.
    Indicator { id: IndicatorId, line: usize },
}

impl SourceRef {
    pub fn close(feed: usize) -> Self {
        SourceRef::DataLine {
            feed,
            line: ohlcv::CLOSE,
        }
    }

    pub fn open(feed: usize) -> Self {
        SourceRef::DataLine {
            feed,
            line: ohlcv::OPEN,
        }
    }

    pub fn volume(feed: usize) -> Self {
        SourceRef::DataLine {
            feed,
            line: ohlcv::VOLUME,
        }
    }

    pub fn indicator(id: IndicatorId) -> Self {
        SourceRef::Indicator { id, line: 0 }
    }
}

struct IndicatorSlot {
    ind: Box<dyn Indicator>,
    sources: Vec<SourceRef>,
    /// Warm-up including everything upstream.
    min_period: usize,
}

/// Engine-owned arena of a strategy's indicators.
///
/// Indicators are computed in registration order, which is also
/// dependency order (a source must exist before its dependent), so one
/// forward pass per bar (or one bulk pass in runonce mode) settles the
/// whole graph.
#[derive(Default)]
pub struct IndicatorBank {
    slots: Vec<IndicatorSlot>,
}

impl IndicatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, ind: Box<dyn Indicator>, sources: Vec<SourceRef>) -> IndicatorId {
        assert_eq!(
            sources.len(),
            ind.num_inputs(),
            "indicator expects {} input(s)",
            ind.num_inputs()
        );
        let upstream = sources
            .iter()
            .map(|s| match s {
                SourceRef::DataLine { .. } => 1,
                SourceRef::Indicator { id, .. } => {
                    assert!(id.0 < self.slots.len(), "source indicator must exist");
                    self.slots[id.0].min_period
                }
            })
            .max()
            .unwrap_or(1);
        // Chained warm-up accumulates: the dependent starts counting where
        // its slowest source becomes defined.
        let min_period = ind.min_period() + upstream - 1;
        let id = IndicatorId(self.slots.len());
        self.slots.push(IndicatorSlot {
            ind,
            sources,
            min_period,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Largest warm-up across every registered indicator.
    pub fn max_min_period(&self) -> usize {
        self.slots.iter().map(|s| s.min_period).max().unwrap_or(1)
    }

    pub fn min_period(&self, id: IndicatorId) -> usize {
        self.slots[id.0].min_period
    }

    pub fn value(&self, id: IndicatorId, line: usize, k: i64) -> f64 {
        self.slots[id.0].ind.lines().line(line).get(k)
    }

    pub fn ready(&self, id: IndicatorId) -> bool {
        let slot = &self.slots[id.0];
        slot.ind.lines().line(0).len() >= slot.min_period
    }

    /// Event-driven step: feed every indicator its current source values.
    pub(crate) fn update_all(&mut self, feeds: &[Box<dyn DataFeed>]) {
        for i in 0..self.slots.len() {
            let values: Vec<f64> = self.slots[i]
                .sources
                .iter()
                .map(|s| match s {
                    SourceRef::DataLine { feed, line } => {
                        feeds[*feed].series().inner().line(*line).get(0)
                    }
                    SourceRef::Indicator { id, line } => {
                        self.slots[id.0].ind.lines().line(*line).get(0)
                    }
                })
                .collect();
            let slot = &mut self.slots[i];
            slot.ind.update(&values);
            let lines = slot.ind.lines_mut();
            let last = lines.size().saturating_sub(1);
            lines.seek(last);
        }
    }

    /// Bulk precomputation for runonce mode.
    pub(crate) fn run_once(&mut self, feeds: &[Box<dyn DataFeed>], len: usize) -> Result<()> {
        for i in 0..self.slots.len() {
            let (before, rest) = self.slots.split_at_mut(i);
            let slot = &mut rest[0];
            let mut slices: Vec<&[f64]> = Vec::with_capacity(slot.sources.len());
            for s in &slot.sources {
                let slice = match s {
                    SourceRef::DataLine { feed, line } => {
                        feeds[*feed].series().inner().line(*line).as_slice()?
                    }
                    SourceRef::Indicator { id, line } => {
                        before[id.0].ind.lines().line(*line).as_slice()?
                    }
                };
                slices.push(slice);
            }
            slot.ind.once(&slices, 0, len);
        }
        Ok(())
    }

    /// Position every output cursor on the given bar (runonce replay).
    pub(crate) fn seek_all(&mut self, pos: usize) {
        for slot in &mut self.slots {
            slot.ind.lines_mut().seek(pos);
        }
    }
}

/// Outcome of one strategy's backtest.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub start_cash: f64,
    pub end_cash: f64,
    /// Mark-to-market at the last bar.
    pub end_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub total_bars: usize,
    /// Closed round trips.
    pub trades: Vec<Trade>,
    /// Merged analyzer outputs, lowercase_underscore keys.
    pub analysis: BTreeMap<String, f64>,
}

impl RunResult {
    fn empty(start_cash: f64) -> Self {
        Self {
            start_cash,
            end_cash: start_cash,
            end_value: start_cash,
            pnl: 0.0,
            pnl_pct: 0.0,
            total_bars: 0,
            trades: Vec::new(),
            analysis: BTreeMap::new(),
        }
    }
}

/// Cross-thread stop switch, checked once per bar.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

type StrategyFactory = Box<dyn Fn() -> Box<dyn Strategy> + Send>;
type SizerFactory = Box<dyn Fn() -> Box<dyn Sizer> + Send>;
type AnalyzerFactory = Box<dyn Fn() -> Box<dyn Analyzer> + Send>;
type ObserverFactory = Box<dyn Fn() -> Box<dyn Observer> + Send>;

/// A strategy that does nothing; used when none was registered so a run
/// still produces equity/analyzer output.
struct IdleStrategy;

impl Strategy for IdleStrategy {}

/// The backtest orchestrator.
///
/// Owns the broker, the data feeds, and the factories for strategies,
/// sizers, analyzers and observers. `run` executes one backtest per
/// registered strategy and returns their results. Cerebro cannot be
/// copied; optimization builds a fresh engine per parameter assignment.
pub struct Cerebro {
    broker: Broker,
    feeds: Vec<Box<dyn DataFeed>>,
    strategies: Vec<StrategyFactory>,
    sizer_factory: SizerFactory,
    analyzer_factories: Vec<AnalyzerFactory>,
    observer_factories: Vec<ObserverFactory>,
    /// Load all feeds before running.
    pub preload: bool,
    /// Precompute indicators in bulk, then replay cursors.
    pub run_once: bool,
    /// Automatically attach cash and value observers.
    pub stdstats: bool,
    pub bar_policy: BarPolicy,
    stop: StopHandle,
}

impl Default for Cerebro {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

impl Cerebro {
    pub fn new(cash: f64) -> Self {
        Self {
            broker: Broker::new(cash),
            feeds: Vec::new(),
            strategies: Vec::new(),
            sizer_factory: Box::new(|| Box::new(FixedSizer::new(1.0))),
            analyzer_factories: Vec::new(),
            observer_factories: Vec::new(),
            preload: true,
            run_once: true,
            stdstats: true,
            bar_policy: BarPolicy::Normal,
            stop: StopHandle::default(),
        }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut Broker {
        &mut self.broker
    }

    pub fn add_data(&mut self, feed: Box<dyn DataFeed>) {
        self.broker.register_data(feed.name());
        self.feeds.push(feed);
    }

    pub fn data_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn add_strategy<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Strategy> + Send + 'static,
    {
        self.strategies.push(Box::new(factory));
    }

    pub fn set_sizer<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Sizer> + Send + 'static,
    {
        self.sizer_factory = Box::new(factory);
    }

    pub fn add_analyzer<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Analyzer> + Send + 'static,
    {
        self.analyzer_factories.push(Box::new(factory));
    }

    pub fn add_observer<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Observer> + Send + 'static,
    {
        self.observer_factories.push(Box::new(factory));
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run every registered strategy over the loaded feeds.
    pub fn run(&mut self) -> Result<Vec<RunResult>> {
        if self.feeds.is_empty() {
            return Ok(Vec::new());
        }
        self.stop.clear();

        if self.preload {
            for feed in &mut self.feeds {
                feed.load()?;
            }
        }

        let bar_count = self.feeds.iter().map(|f| f.length()).min().unwrap_or(0);
        info!(bars = bar_count, feeds = self.feeds.len(), "starting run");

        let mut results = Vec::new();
        if self.strategies.is_empty() {
            results.push(self.run_one(Box::new(IdleStrategy), bar_count)?);
        } else {
            let factories = std::mem::take(&mut self.strategies);
            for factory in &factories {
                results.push(self.run_one(factory(), bar_count)?);
                if self.stop.is_stopped() {
                    break;
                }
            }
            self.strategies = factories;
        }
        Ok(results)
    }

    fn run_one(&mut self, mut strategy: Box<dyn Strategy>, bar_count: usize) -> Result<RunResult> {
        self.broker.reset();
        for feed in &self.feeds {
            self.broker.register_data(feed.name());
        }

        let mut bank = IndicatorBank::new();
        let mut timers = TimerManager::new();
        let sizer = (self.sizer_factory)();

        let mut analyzers: Vec<Box<dyn Analyzer>> =
            self.analyzer_factories.iter().map(|f| f()).collect();
        let mut observers: Vec<Box<dyn Observer>> =
            self.observer_factories.iter().map(|f| f()).collect();
        if self.stdstats {
            observers.push(Box::new(CashObserver::new()));
            observers.push(Box::new(ValueObserver::new()));
        }

        strategy.on_start(&mut SetupCtx {
            bank: &mut bank,
            timers: &mut timers,
            feeds: &self.feeds,
        });
        for feed_idx in 0..self.feeds.len() {
            strategy.notify_data(feed_idx, crate::strategy::DataStatus::Loaded);
        }

        let min_period = bank.max_min_period().max(strategy.min_period_hint());

        if bar_count == 0 {
            return Ok(RunResult::empty(self.broker.start_cash()));
        }

        if self.run_once {
            bank.run_once(&self.feeds, bar_count)?;
        }

        for a in &mut analyzers {
            a.start(&self.broker);
        }
        for o in &mut observers {
            o.start(&self.broker);
        }

        let mut nextstart_done = false;
        let mut nextstart_open_done = false;

        for bar in 0..bar_count {
            if self.stop.is_stopped() {
                debug!(bar, "stop requested");
                break;
            }

            for feed in &mut self.feeds {
                feed.series_mut().inner_mut().seek(bar);
            }
            if self.run_once {
                bank.seek_all(bar);
            } else {
                bank.update_all(&self.feeds);
            }

            let views = self.bar_views(bar);
            let dt = views
                .values()
                .map(|v| v.datetime)
                .fold(f64::NEG_INFINITY, f64::max);
            let when = days_to_datetime(dt);

            // Cheat-on-open: the strategy acts on this bar's open before
            // any matching, and those orders fill at that open.
            if self.bar_policy == BarPolicy::CheatOnOpen {
                for id in timers.check(when, true) {
                    strategy.notify_timer(id, when);
                }
                {
                    let mut ctx = Ctx {
                        broker: &mut self.broker,
                        feeds: &self.feeds,
                        bank: &bank,
                        sizer: sizer.as_ref(),
                        bar_index: bar,
                        bar_count,
                    };
                    if bar + 1 < min_period {
                        strategy.prenext_open(&mut ctx);
                    } else if !nextstart_open_done {
                        strategy.nextstart_open(&mut ctx);
                        nextstart_open_done = true;
                    } else {
                        strategy.next_open(&mut ctx);
                    }
                }
                self.broker.next_open(&views, bar);
            }

            self.broker.next(&views, bar);

            {
                let mut ctx = Ctx {
                    broker: &mut self.broker,
                    feeds: &self.feeds,
                    bank: &bank,
                    sizer: sizer.as_ref(),
                    bar_index: bar,
                    bar_count,
                };
                if bar + 1 < min_period {
                    strategy.prenext(&mut ctx);
                } else if !nextstart_done {
                    strategy.nextstart(&mut ctx);
                    nextstart_done = true;
                } else {
                    strategy.next(&mut ctx);
                }
            }

            // Cheat-on-close: orders submitted during `next` fill at this
            // bar's close.
            if self.bar_policy == BarPolicy::CheatOnClose {
                self.broker.next_close(&views, bar);
            }

            for order_ref in self.broker.take_order_events() {
                if let Some(order) = self.broker.order(order_ref).cloned() {
                    strategy.notify_order(&order);
                    for o in &mut observers {
                        o.notify_order(&order);
                    }
                }
            }
            for trade in self.broker.take_trade_events() {
                strategy.notify_trade(&trade);
                for a in &mut analyzers {
                    a.notify_trade(&trade);
                }
                for o in &mut observers {
                    o.notify_trade(&trade);
                }
            }

            let (cash, value) = (self.broker.cash(), self.broker.value());
            strategy.notify_cash_value(cash, value);
            if self.broker.is_fund_mode() {
                strategy.notify_fund(
                    cash,
                    value,
                    self.broker.fund_nav(),
                    self.broker.fund_shares(),
                );
            }

            for a in &mut analyzers {
                a.next(&self.broker, dt);
            }
            for o in &mut observers {
                o.next(&self.broker);
            }

            for id in timers.check(when, false) {
                strategy.notify_timer(id, when);
            }
        }

        {
            let mut ctx = Ctx {
                broker: &mut self.broker,
                feeds: &self.feeds,
                bank: &bank,
                sizer: sizer.as_ref(),
                bar_index: bar_count.saturating_sub(1),
                bar_count,
            };
            strategy.on_stop(&mut ctx);
        }

        let mut analysis = BTreeMap::new();
        for a in &mut analyzers {
            a.stop(&self.broker);
            for (k, v) in a.analysis() {
                analysis.insert(k, v);
            }
        }

        let start_cash = self.broker.start_cash();
        let end_cash = self.broker.cash();
        let end_value = self.broker.value();
        let pnl = end_value - start_cash;
        let trades: Vec<Trade> = self
            .broker
            .trades()
            .iter()
            .filter(|t| !t.is_open)
            .cloned()
            .collect();

        info!(end_value, trades = trades.len(), "run finished");

        Ok(RunResult {
            start_cash,
            end_cash,
            end_value,
            pnl,
            pnl_pct: if start_cash > 0.0 {
                pnl / start_cash * 100.0
            } else {
                0.0
            },
            total_bars: bar_count,
            trades,
            analysis,
        })
    }

    fn bar_views(&self, bar: usize) -> HashMap<String, BarView> {
        self.feeds
            .iter()
            .filter_map(|f| f.view_at(bar).map(|v| (f.name().to_string(), v)))
            .collect()
    }
}
