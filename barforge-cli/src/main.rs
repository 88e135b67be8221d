//! Barforge demo binary.
//!
//! Runs an SMA-crossover backtest over synthetic daily bars, prints the
//! result and the analyzer output, then sweeps the crossover periods on
//! all cores. The CLI is demonstrative; the engine's contract lives in
//! `barforge-core` and `barforge-runner`.

use anyhow::Result;
use barforge_core::analyzers::{DrawDown, SharpeRatio, Sqn, TradeAnalyzer};
use barforge_core::commission::CommissionPlan;
use barforge_core::engine::{Cerebro, IndicatorId, SourceRef};
use barforge_core::error::Error;
use barforge_core::feed::{BarRecord, MemoryFeed};
use barforge_core::indicators::{CrossOver, Sma};
use barforge_core::sizer::PercentSizer;
use barforge_core::strategy::{Ctx, SetupCtx, Strategy};
use barforge_core::ParamValue;
use barforge_runner::{Optimizer, ParamGrid};
use std::sync::Arc;

/// Classic fast/slow moving-average crossover.
struct SmaCross {
    fast: usize,
    slow: usize,
    cross: Option<IndicatorId>,
}

impl SmaCross {
    fn new(fast: usize, slow: usize) -> Self {
        Self {
            fast,
            slow,
            cross: None,
        }
    }
}

impl Strategy for SmaCross {
    fn on_start(&mut self, ctx: &mut SetupCtx) {
        let fast = ctx.add_indicator_on_close(Box::new(Sma::new(self.fast)), 0);
        let slow = ctx.add_indicator_on_close(Box::new(Sma::new(self.slow)), 0);
        self.cross = Some(ctx.add_indicator(
            Box::new(CrossOver::new()),
            vec![SourceRef::indicator(fast), SourceRef::indicator(slow)],
        ));
    }

    fn next(&mut self, ctx: &mut Ctx) {
        let Some(cross) = self.cross else { return };
        let signal = ctx.ind(cross, 0);
        let pos = ctx.position(0);

        if signal > 0.0 && pos <= 0.0 {
            if pos < 0.0 {
                ctx.close_position(0);
            }
            ctx.buy(0, 0.0);
        } else if signal < 0.0 && pos > 0.0 {
            ctx.close_position(0);
        }
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> barforge_core::error::Result<()> {
        let v = value
            .as_i64()
            .ok_or_else(|| Error::ParamNotFound(name.to_string()))?;
        match name {
            "fast" => self.fast = v as usize,
            "slow" => self.slow = v as usize,
            _ => return Err(Error::ParamNotFound(name.to_string())),
        }
        Ok(())
    }
}

/// Deterministic trending series with a seasonal swing, one bar per day.
fn synthetic_rows(bars: usize) -> Vec<BarRecord> {
    (0..bars)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + t * 0.05 + (t * 0.12).sin() * 8.0;
            let open = if i == 0 {
                close
            } else {
                let p = t - 1.0;
                100.0 + p * 0.05 + (p * 0.12).sin() * 8.0
            };
            BarRecord::new(
                19_700.0 + t,
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                2_000_000.0,
            )
        })
        .collect()
}

fn build_engine(rows: Arc<Vec<BarRecord>>) -> Cerebro {
    let mut cerebro = Cerebro::new(100_000.0);
    cerebro.add_data(Box::new(MemoryFeed::shared("synthetic", rows)));
    cerebro
        .broker_mut()
        .set_commission(Arc::new(CommissionPlan::stocks(0.001, true)));
    cerebro.set_sizer(|| Box::new(PercentSizer::whole(90.0)));
    cerebro.add_analyzer(|| Box::new(SharpeRatio::default()));
    cerebro.add_analyzer(|| Box::new(DrawDown::new()));
    cerebro.add_analyzer(|| Box::new(TradeAnalyzer::new()));
    cerebro.add_analyzer(|| Box::new(Sqn::new()));
    cerebro
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let rows = Arc::new(synthetic_rows(504));

    println!("barforge {}", barforge_core::version());
    println!("── single run: SmaCross(10, 30) over 504 bars ──");
    let mut cerebro = build_engine(Arc::clone(&rows));
    cerebro.add_strategy(|| Box::new(SmaCross::new(10, 30)));
    let results = cerebro.run()?;
    for run in &results {
        println!(
            "start {:>12.2}  end value {:>12.2}  pnl {:>10.2} ({:+.2}%)  trades {}",
            run.start_cash,
            run.end_value,
            run.pnl,
            run.pnl_pct,
            run.trades.len(),
        );
        for (key, value) in &run.analysis {
            println!("  {key:<24} {value:>12.4}");
        }
    }

    println!("── sweep: fast x slow ──");
    let mut grid = ParamGrid::new();
    grid.add_ints("fast", &[5, 10, 15, 20]);
    grid.add_ints("slow", &[30, 40, 60]);

    let optimizer = Optimizer::new(grid, move |params| {
        let mut cerebro = build_engine(Arc::clone(&rows));
        let assignment = params.clone();
        cerebro.add_strategy(move || {
            let mut strategy = SmaCross::new(10, 30);
            for (name, value) in assignment.iter() {
                strategy
                    .set_param(name, value)
                    .expect("grid names a parameter the strategy does not have");
            }
            Box::new(strategy)
        });
        cerebro
    });

    let ranked = optimizer.run()?;
    for result in ranked.iter().take(5) {
        println!(
            "fast {:>2} slow {:>2}  pnl {:>+8.2}%  sharpe {:>6.2}  maxdd {:>5.2}%  trades {:>2}  win {:>5.1}%",
            result.params.get_or_i64("fast", 0),
            result.params.get_or_i64("slow", 0),
            result.pnl_pct,
            result.sharpe_ratio,
            result.max_drawdown,
            result.total_trades,
            result.win_rate,
        );
    }

    Ok(())
}
