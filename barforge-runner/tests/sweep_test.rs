//! Sweep integration: grid cardinality, ordering, callbacks and failure
//! isolation.

use barforge_core::analyzers::{DrawDown, SharpeRatio};
use barforge_core::engine::{Cerebro, IndicatorId};
use barforge_core::feed::{BarRecord, MemoryFeed};
use barforge_core::indicators::Sma;
use barforge_core::sizer::PercentSizer;
use barforge_core::strategy::{Ctx, SetupCtx, Strategy};
use barforge_runner::{Optimizer, ParamGrid, SortBy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Long when the close is above its SMA, flat otherwise.
struct AboveSma {
    period: usize,
    id: Option<IndicatorId>,
}

impl Strategy for AboveSma {
    fn on_start(&mut self, ctx: &mut SetupCtx) {
        self.id = Some(ctx.add_indicator_on_close(Box::new(Sma::new(self.period)), 0));
    }

    fn next(&mut self, ctx: &mut Ctx) {
        let sma = ctx.ind(self.id.unwrap(), 0);
        let close = ctx.close(0, 0);
        let pos = ctx.position(0);
        if close > sma && pos == 0.0 {
            ctx.buy(0, 0.0);
        } else if close < sma && pos > 0.0 {
            ctx.close_position(0);
        }
    }

    fn set_param(&mut self, name: &str, value: &barforge_core::ParamValue) -> barforge_core::error::Result<()> {
        match (name, value.as_i64()) {
            ("period", Some(v)) => {
                self.period = v as usize;
                Ok(())
            }
            _ => Err(barforge_core::Error::ParamNotFound(name.to_string())),
        }
    }
}

fn rows() -> Arc<Vec<BarRecord>> {
    Arc::new(
        (0..160)
            .map(|i| {
                let t = i as f64;
                let c = 100.0 + t * 0.1 + (t * 0.25).sin() * 5.0;
                BarRecord::new(19_700.0 + t, c, c + 0.6, c - 0.6, c, 1e6)
            })
            .collect(),
    )
}

fn build(rows: Arc<Vec<BarRecord>>, params: &barforge_core::Params) -> Cerebro {
    let mut cerebro = Cerebro::new(100_000.0);
    cerebro.add_data(Box::new(MemoryFeed::shared("synthetic", rows)));
    cerebro.set_sizer(|| Box::new(PercentSizer::whole(50.0)));
    cerebro.add_analyzer(|| Box::new(SharpeRatio::default()));
    cerebro.add_analyzer(|| Box::new(DrawDown::new()));
    let assignment = params.clone();
    cerebro.add_strategy(move || {
        let mut s = AboveSma {
            period: 20,
            id: None,
        };
        for (name, value) in assignment.iter() {
            s.set_param(name, value).expect("known parameter");
        }
        Box::new(s)
    });
    cerebro
}

#[test]
fn grid_cardinality_is_product_of_axes() {
    let shared = rows();
    let mut grid = ParamGrid::new();
    grid.add_ints("period", &[5, 10, 15]);
    grid.add_floats("ignored", &[1.0, 2.0]);

    let optimizer = Optimizer::new(grid, move |params| {
        // Only "period" reaches the strategy; the second axis still
        // multiplies the run count.
        let mut trimmed = barforge_core::Params::new();
        trimmed.set("period", params.get_i64("period").unwrap());
        build(Arc::clone(&shared), &trimmed)
    })
    .with_max_cpus(2);

    let results = optimizer.run().unwrap();
    assert_eq!(results.len(), 6);

    // Sorted descending by pnl_pct.
    for pair in results.windows(2) {
        assert!(pair[0].pnl_pct >= pair[1].pnl_pct);
    }
}

#[test]
fn result_records_carry_metrics() {
    let shared = rows();
    let mut grid = ParamGrid::new();
    grid.add_ints("period", &[10]);

    let optimizer = Optimizer::new(grid, move |params| build(Arc::clone(&shared), params));
    let results = optimizer.run().unwrap();
    let r = &results[0];

    assert!(r.final_value > 0.0);
    assert!(!r.sharpe_ratio.is_nan());
    assert!(!r.max_drawdown.is_nan());
    assert!(r.total_trades >= r.winning_trades);
    if r.total_trades > 0 {
        let expect = r.winning_trades as f64 / r.total_trades as f64 * 100.0;
        assert!((r.win_rate - expect).abs() < 1e-9);
    }

    // Result rows serialize for export.
    let json = serde_json::to_string(r).unwrap();
    assert!(json.contains("\"pnl_pct\""));
    assert!(json.contains("\"params\""));
}

#[test]
fn callbacks_fire_once_per_run() {
    let shared = rows();
    let mut grid = ParamGrid::new();
    grid.add_ints("period", &[5, 10, 15, 20]);

    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let mut optimizer = Optimizer::new(grid, move |params| build(Arc::clone(&shared), params));
    optimizer.on_result(move |_r| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let results = optimizer.run().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(count.load(Ordering::SeqCst), 4);
}

#[test]
fn panicking_run_is_recorded_with_sentinel() {
    let shared = rows();
    let mut grid = ParamGrid::new();
    grid.add_ints("period", &[0, 10]); // period 0 violates the SMA contract

    let optimizer = Optimizer::new(grid, move |params| build(Arc::clone(&shared), params));
    let results = optimizer.run().unwrap();

    assert_eq!(results.len(), 2);
    // The healthy run sorts first; the failed one carries the sentinel.
    assert!(results[0].pnl_pct > barforge_runner::FAILED_RUN_PNL);
    assert_eq!(results[1].pnl_pct, barforge_runner::FAILED_RUN_PNL);
}

#[test]
fn alternative_sort_orders() {
    let shared = rows();
    let mut grid = ParamGrid::new();
    grid.add_ints("period", &[5, 10, 15]);

    let optimizer = Optimizer::new(grid, move |params| build(Arc::clone(&shared), params));
    let mut results = optimizer.run().unwrap();

    barforge_runner::sort_results(&mut results, SortBy::Drawdown);
    for pair in results.windows(2) {
        assert!(pair[0].max_drawdown <= pair[1].max_drawdown);
    }

    barforge_runner::sort_results(&mut results, SortBy::Sharpe);
    for pair in results.windows(2) {
        assert!(pair[0].sharpe_ratio >= pair[1].sharpe_ratio || pair[1].sharpe_ratio.is_nan());
    }
}
