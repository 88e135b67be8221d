//! End-to-end engine scenarios: warm-up dispatch, fills, brackets,
//! runonce/event parity and boundary behavior.

use barforge_core::broker::BarPolicy;
use barforge_core::commission::CommissionPlan;
use barforge_core::engine::{Cerebro, IndicatorId};
use barforge_core::feed::{BarRecord, MemoryFeed};
use barforge_core::indicators::Sma;
use barforge_core::strategy::{BracketSpec, Ctx, SetupCtx, Strategy};
use std::sync::Arc;

const S1_CLOSES: [f64; 20] = [
    100.0, 101.0, 102.0, 101.0, 103.0, 104.5, 105.0, 104.0, 106.0, 107.5, 108.0, 107.0, 109.0,
    110.5, 111.0, 110.0, 112.0, 113.5, 114.0, 113.0,
];

/// Flat bars: open == close so fill prices are easy to reason about.
fn flat_bars(closes: &[f64]) -> Vec<BarRecord> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| BarRecord::new(19_700.0 + i as f64, c, c + 0.5, c - 0.5, c, 1_000_000.0))
        .collect()
}

fn engine_with(closes: &[f64]) -> Cerebro {
    let mut cerebro = Cerebro::new(100_000.0);
    cerebro.add_data(Box::new(MemoryFeed::new("spy", flat_bars(closes))));
    cerebro
}

/// Records SMA(5) outputs per bar so both execution modes can be compared.
struct SmaProbe {
    id: Option<IndicatorId>,
    seen: Vec<f64>,
    prenext_bars: usize,
}

impl SmaProbe {
    fn new() -> Self {
        Self {
            id: None,
            seen: Vec::new(),
            prenext_bars: 0,
        }
    }
}

impl Strategy for SmaProbe {
    fn on_start(&mut self, ctx: &mut SetupCtx) {
        self.id = Some(ctx.add_indicator_on_close(Box::new(Sma::new(5)), 0));
    }

    fn prenext(&mut self, ctx: &mut Ctx) {
        self.prenext_bars += 1;
        self.seen.push(ctx.ind(self.id.unwrap(), 0));
    }

    fn next(&mut self, ctx: &mut Ctx) {
        self.seen.push(ctx.ind(self.id.unwrap(), 0));
    }
}

#[test]
fn sma_values_via_engine_runonce_and_event_agree() {
    let collect = |run_once: bool| -> Vec<f64> {
        let observed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        let mut cerebro = engine_with(&S1_CLOSES);
        cerebro.run_once = run_once;
        cerebro.add_strategy(move || {
            struct Tap {
                inner: SmaProbe,
                sink: Arc<std::sync::Mutex<Vec<f64>>>,
            }
            impl Strategy for Tap {
                fn on_start(&mut self, ctx: &mut SetupCtx) {
                    self.inner.on_start(ctx);
                }
                fn prenext(&mut self, ctx: &mut Ctx) {
                    self.inner.prenext(ctx);
                }
                fn next(&mut self, ctx: &mut Ctx) {
                    self.inner.next(ctx);
                }
                fn on_stop(&mut self, _ctx: &mut Ctx) {
                    *self.sink.lock().unwrap() = self.inner.seen.clone();
                }
            }
            Box::new(Tap {
                inner: SmaProbe::new(),
                sink: Arc::clone(&sink),
            })
        });
        cerebro.run().unwrap();
        let out = observed.lock().unwrap().clone();
        out
    };

    let bulk = collect(true);
    let event = collect(false);

    assert_eq!(bulk.len(), 20);
    assert_eq!(event.len(), 20);
    for i in 0..4 {
        assert!(bulk[i].is_nan(), "bulk warm-up at {i}");
        assert!(event[i].is_nan(), "event warm-up at {i}");
    }
    assert!((bulk[4] - 101.4).abs() < 1e-9);
    assert!((bulk[19] - 112.5).abs() < 1e-9);
    for i in 4..20 {
        assert!(
            (bulk[i] - event[i]).abs() < 1e-9,
            "bar {i}: {} vs {}",
            bulk[i],
            event[i]
        );
    }
}

#[test]
fn warmup_dispatch_counts() {
    let prenext_count = Arc::new(std::sync::Mutex::new(0usize));
    let sink = Arc::clone(&prenext_count);
    let mut cerebro = engine_with(&S1_CLOSES);
    cerebro.add_strategy(move || {
        struct Probe {
            inner: SmaProbe,
            sink: Arc<std::sync::Mutex<usize>>,
        }
        impl Strategy for Probe {
            fn on_start(&mut self, ctx: &mut SetupCtx) {
                self.inner.on_start(ctx);
            }
            fn prenext(&mut self, ctx: &mut Ctx) {
                self.inner.prenext(ctx);
            }
            fn on_stop(&mut self, _ctx: &mut Ctx) {
                *self.sink.lock().unwrap() = self.inner.prenext_bars;
            }
        }
        Box::new(Probe {
            inner: SmaProbe::new(),
            sink: Arc::clone(&sink),
        })
    });
    cerebro.run().unwrap();
    // SMA(5): bars 0..=3 are warm-up.
    assert_eq!(*prenext_count.lock().unwrap(), 4);
}

/// Buys a fixed size on one chosen bar.
struct BuyOnBar {
    bar: usize,
    size: f64,
}

impl Strategy for BuyOnBar {
    fn next(&mut self, ctx: &mut Ctx) {
        if ctx.bar_index() == self.bar {
            ctx.buy(0, self.size);
        }
    }
}

#[test]
fn market_buy_fills_at_next_open() {
    let mut cerebro = engine_with(&S1_CLOSES);
    cerebro
        .broker_mut()
        .set_commission(Arc::new(CommissionPlan::stocks(0.001, true)));
    cerebro.add_strategy(|| Box::new(BuyOnBar { bar: 4, size: 10.0 }));

    let results = cerebro.run().unwrap();
    let run = &results[0];

    // Submitted on bar 4, filled at bar 5's open (= close 104.5 for flat
    // bars).
    let commission = 0.001 * 10.0 * 104.5;
    let expected_cash = 100_000.0 - 10.0 * 104.5 - commission;
    assert!((run.end_cash - expected_cash).abs() < 1e-9);
    assert!((cerebro.broker().position("spy").size - 10.0).abs() < 1e-12);

    // Equity identity: cash + position * last close = value.
    let expect_value = run.end_cash + 10.0 * 113.0;
    assert!((run.end_value - expect_value).abs() < 1e-9);
}

/// Enters a bracket on the first bar.
struct BracketOnce {
    placed: bool,
    stop: f64,
    limit: f64,
    refs: Option<(u64, Option<u64>, Option<u64>)>,
}

impl Strategy for BracketOnce {
    fn next(&mut self, ctx: &mut Ctx) {
        if !self.placed {
            self.placed = true;
            self.refs = ctx.buy_bracket(
                0,
                BracketSpec {
                    size: 1.0,
                    stop_price: self.stop,
                    limit_price: self.limit,
                    ..BracketSpec::default()
                },
            );
        }
    }
}

#[test]
fn bracket_stop_fires_and_cancels_limit() {
    // Entry at 100; bar 1 trades down to 94, touching the 95 stop.
    let rows = vec![
        BarRecord::new(19_700.0, 100.0, 100.5, 99.5, 100.0, 1e6),
        BarRecord::new(19_701.0, 100.0, 100.0, 94.0, 95.0, 1e6),
        BarRecord::new(19_702.0, 95.0, 106.0, 95.0, 105.0, 1e6),
        BarRecord::new(19_703.0, 105.0, 105.0, 96.0, 97.0, 1e6),
        BarRecord::new(19_704.0, 97.0, 111.0, 97.0, 110.0, 1e6),
    ];
    let mut cerebro = Cerebro::new(100_000.0);
    cerebro.add_data(Box::new(MemoryFeed::new("spy", rows)));

    let refs_out = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&refs_out);
    cerebro.add_strategy(move || {
        struct B {
            inner: BracketOnce,
            sink: Arc<std::sync::Mutex<Option<(u64, Option<u64>, Option<u64>)>>>,
        }
        impl Strategy for B {
            fn next(&mut self, ctx: &mut Ctx) {
                self.inner.next(ctx);
            }
            fn on_stop(&mut self, _ctx: &mut Ctx) {
                *self.sink.lock().unwrap() = self.inner.refs;
            }
        }
        Box::new(B {
            inner: BracketOnce {
                placed: false,
                stop: 95.0,
                limit: 110.0,
                refs: None,
            },
            sink: Arc::clone(&sink),
        })
    });

    let results = cerebro.run().unwrap();
    let run = &results[0];

    // Flat again, one losing round trip of −5.
    assert_eq!(cerebro.broker().position("spy").size, 0.0);
    assert_eq!(run.trades.len(), 1);
    assert!((run.trades[0].pnl - (-5.0)).abs() < 1e-9);

    let (_, stop_ref, limit_ref) = refs_out.lock().unwrap().unwrap();
    let stop = cerebro.broker().order(stop_ref.unwrap()).unwrap();
    let limit = cerebro.broker().order(limit_ref.unwrap()).unwrap();
    assert_eq!(stop.status, barforge_core::order::OrderStatus::Completed);
    assert_eq!(stop.executed.price, 95.0);
    assert_eq!(limit.status, barforge_core::order::OrderStatus::Canceled);
}

#[test]
fn no_feeds_yields_empty_results() {
    let mut cerebro = Cerebro::new(100_000.0);
    cerebro.add_strategy(|| Box::new(BuyOnBar { bar: 0, size: 1.0 }));
    assert!(cerebro.run().unwrap().is_empty());
}

#[test]
fn feed_shorter_than_indicator_period_stays_in_warmup() {
    let mut cerebro = engine_with(&S1_CLOSES[..3]);
    let prenext_count = Arc::new(std::sync::Mutex::new(0usize));
    let sink = Arc::clone(&prenext_count);
    cerebro.add_strategy(move || {
        struct P {
            inner: SmaProbe,
            sink: Arc<std::sync::Mutex<usize>>,
        }
        impl Strategy for P {
            fn on_start(&mut self, ctx: &mut SetupCtx) {
                self.inner.on_start(ctx);
            }
            fn prenext(&mut self, ctx: &mut Ctx) {
                self.inner.prenext(ctx);
            }
            fn on_stop(&mut self, _ctx: &mut Ctx) {
                *self.sink.lock().unwrap() = self.inner.prenext_bars;
            }
        }
        Box::new(P {
            inner: SmaProbe::new(),
            sink: Arc::clone(&sink),
        })
    });

    let results = cerebro.run().unwrap();
    // Run completes, every bar stayed in prenext, nothing traded.
    assert_eq!(results[0].total_bars, 3);
    assert_eq!(*prenext_count.lock().unwrap(), 3);
    assert!(results[0].trades.is_empty());
    assert_eq!(results[0].end_cash, 100_000.0);
}

#[test]
fn run_result_serializes_to_json() {
    let mut cerebro = engine_with(&S1_CLOSES);
    cerebro.add_strategy(|| Box::new(BuyOnBar { bar: 4, size: 10.0 }));
    let results = cerebro.run().unwrap();
    let json = serde_json::to_string(&results[0]).unwrap();
    assert!(json.contains("\"end_value\""));
    assert!(json.contains("\"trades\""));
}

#[test]
fn no_trade_run_preserves_cash_exactly() {
    let mut cerebro = engine_with(&S1_CLOSES);
    let results = cerebro.run().unwrap(); // idle default strategy
    assert_eq!(results[0].end_cash, 100_000.0);
    assert_eq!(results[0].end_value, 100_000.0);
}

#[test]
fn cheat_on_close_fills_same_bar() {
    let mut cerebro = engine_with(&S1_CLOSES);
    cerebro.bar_policy = BarPolicy::CheatOnClose;
    cerebro.add_strategy(|| Box::new(BuyOnBar { bar: 4, size: 10.0 }));
    let results = cerebro.run().unwrap();
    // Filled at bar 4's close (103.0) instead of bar 5's open.
    let expected_cash = 100_000.0 - 10.0 * 103.0;
    assert!((results[0].end_cash - expected_cash).abs() < 1e-9);
}

/// Cheat-on-open: the order placed in `next_open` fills at that same
/// bar's open.
struct BuyOnOpen {
    bar: usize,
}

impl Strategy for BuyOnOpen {
    fn next_open(&mut self, ctx: &mut Ctx) {
        if ctx.bar_index() == self.bar {
            ctx.buy(0, 10.0);
        }
    }
}

#[test]
fn cheat_on_open_fills_same_bar_open() {
    let mut cerebro = engine_with(&S1_CLOSES);
    cerebro.bar_policy = BarPolicy::CheatOnOpen;
    cerebro.add_strategy(|| Box::new(BuyOnOpen { bar: 4 }));
    let results = cerebro.run().unwrap();
    // Bar 4 open == close == 103.0 for flat bars.
    let expected_cash = 100_000.0 - 10.0 * 103.0;
    assert!((results[0].end_cash - expected_cash).abs() < 1e-9);
}

#[test]
fn stop_handle_interrupts_run() {
    let mut cerebro = engine_with(&S1_CLOSES);
    let handle = cerebro.stop_handle();
    let bars_seen = Arc::new(std::sync::Mutex::new(0usize));

    let sink = Arc::clone(&bars_seen);
    cerebro.add_strategy(move || {
        struct Stopper {
            handle: barforge_core::engine::StopHandle,
            sink: Arc<std::sync::Mutex<usize>>,
        }
        impl Strategy for Stopper {
            fn next(&mut self, ctx: &mut Ctx) {
                *self.sink.lock().unwrap() += 1;
                if ctx.bar_index() == 2 {
                    self.handle.stop();
                }
            }
        }
        Box::new(Stopper {
            handle: handle.clone(),
            sink: Arc::clone(&sink),
        })
    });

    cerebro.run().unwrap();

    // Bars 0, 1, 2 ran; the flag is honored at the top of bar 3.
    assert_eq!(*bars_seen.lock().unwrap(), 3);
}
