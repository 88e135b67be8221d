//! The parallel optimization sweep.

use crate::grid::ParamGrid;
use anyhow::Result;
use barforge_core::engine::Cerebro;
use barforge_core::Params;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Sentinel P&L recorded for failed runs so sorting deprioritizes them.
pub const FAILED_RUN_PNL: f64 = -1e10;

/// One parameter assignment's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct OptResult {
    pub params: Params,
    pub final_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    /// NaN when no Sharpe analyzer was attached.
    pub sharpe_ratio: f64,
    /// NaN when no drawdown analyzer was attached.
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Percent of closed trades that won.
    pub win_rate: f64,
}

impl OptResult {
    fn failed(params: Params) -> Self {
        Self {
            params,
            final_value: 0.0,
            pnl: FAILED_RUN_PNL,
            pnl_pct: FAILED_RUN_PNL,
            sharpe_ratio: f64::NAN,
            max_drawdown: f64::NAN,
            total_trades: 0,
            winning_trades: 0,
            win_rate: 0.0,
        }
    }
}

/// Sort criteria for result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    PnlPct,
    Pnl,
    Sharpe,
    /// Smaller drawdown ranks higher.
    Drawdown,
    WinRate,
    TradeCount,
}

type EngineBuilder = Box<dyn Fn(&Params) -> Cerebro + Send + Sync>;
type ResultCallback = Box<dyn Fn(&OptResult) + Send + Sync>;

/// Runs one engine per grid assignment on a rayon pool.
///
/// The builder receives the assignment and returns a fully configured
/// engine, typically sharing feed source rows across runs and pushing
/// the assignment into the strategy via `set_param`. A worker that panics
/// or errors records the failure sentinel and the sweep continues.
pub struct Optimizer {
    grid: ParamGrid,
    build: EngineBuilder,
    /// 0 uses the machine's available parallelism.
    pub max_cpus: usize,
    callbacks: Vec<ResultCallback>,
}

impl Optimizer {
    pub fn new<F>(grid: ParamGrid, build: F) -> Self
    where
        F: Fn(&Params) -> Cerebro + Send + Sync + 'static,
    {
        Self {
            grid,
            build: Box::new(build),
            max_cpus: 0,
            callbacks: Vec::new(),
        }
    }

    pub fn with_max_cpus(mut self, max_cpus: usize) -> Self {
        self.max_cpus = max_cpus;
        self
    }

    /// Called after each run completes, serialized under one mutex.
    pub fn on_result<F>(&mut self, callback: F)
    where
        F: Fn(&OptResult) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn total_runs(&self) -> usize {
        self.grid.size()
    }

    /// Execute the sweep. Results come back sorted descending by
    /// `pnl_pct`.
    pub fn run(&self) -> Result<Vec<OptResult>> {
        let assignments = self.grid.assignments();
        if assignments.is_empty() {
            return Ok(Vec::new());
        }
        debug!(runs = assignments.len(), cpus = self.max_cpus, "starting sweep");

        let callback_gate = Mutex::new(());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_cpus)
            .build()?;

        let mut results: Vec<OptResult> = pool.install(|| {
            assignments
                .into_par_iter()
                .map(|params| {
                    let result = self.run_single(params);
                    if !self.callbacks.is_empty() {
                        let _guard = callback_gate.lock().expect("callback mutex poisoned");
                        for cb in &self.callbacks {
                            cb(&result);
                        }
                    }
                    result
                })
                .collect()
        });

        sort_results(&mut results, SortBy::PnlPct);
        Ok(results)
    }

    fn run_single(&self, params: Params) -> OptResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut engine = (self.build)(&params);
            engine.run()
        }));

        let runs = match outcome {
            Ok(Ok(runs)) => runs,
            Ok(Err(err)) => {
                warn!(%err, "optimization run failed");
                return OptResult::failed(params);
            }
            Err(_) => {
                warn!("optimization run panicked");
                return OptResult::failed(params);
            }
        };

        let Some(run) = runs.first() else {
            return OptResult::failed(params);
        };

        let winning = run.trades.iter().filter(|t| t.pnl_comm > 0.0).count();
        let total = run.trades.len();
        OptResult {
            params,
            final_value: run.end_value,
            pnl: run.pnl,
            pnl_pct: run.pnl_pct,
            sharpe_ratio: run.analysis.get("sharpe_ratio").copied().unwrap_or(f64::NAN),
            max_drawdown: run.analysis.get("max_drawdown").copied().unwrap_or(f64::NAN),
            total_trades: total,
            winning_trades: winning,
            win_rate: if total > 0 {
                winning as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Sort a result set in place. Everything sorts descending except
/// drawdown, where smaller is better; NaN metrics sink to the bottom.
pub fn sort_results(results: &mut [OptResult], by: SortBy) {
    let key = |r: &OptResult| -> f64 {
        match by {
            SortBy::PnlPct => r.pnl_pct,
            SortBy::Pnl => r.pnl,
            SortBy::Sharpe => {
                if r.sharpe_ratio.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    r.sharpe_ratio
                }
            }
            SortBy::Drawdown => {
                if r.max_drawdown.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    -r.max_drawdown
                }
            }
            SortBy::WinRate => r.win_rate,
            SortBy::TradeCount => r.total_trades as f64,
        }
    };
    results.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(pnl_pct: f64, sharpe: f64, dd: f64) -> OptResult {
        OptResult {
            params: Params::new(),
            final_value: 0.0,
            pnl: pnl_pct,
            pnl_pct,
            sharpe_ratio: sharpe,
            max_drawdown: dd,
            total_trades: 0,
            winning_trades: 0,
            win_rate: 0.0,
        }
    }

    #[test]
    fn sort_by_pnl_pct_descending() {
        let mut rs = vec![result(1.0, 0.0, 0.0), result(5.0, 0.0, 0.0), result(-2.0, 0.0, 0.0)];
        sort_results(&mut rs, SortBy::PnlPct);
        let order: Vec<f64> = rs.iter().map(|r| r.pnl_pct).collect();
        assert_eq!(order, vec![5.0, 1.0, -2.0]);
    }

    #[test]
    fn sort_by_drawdown_ascending() {
        let mut rs = vec![result(0.0, 0.0, 20.0), result(0.0, 0.0, 5.0), result(0.0, 0.0, 12.0)];
        sort_results(&mut rs, SortBy::Drawdown);
        let order: Vec<f64> = rs.iter().map(|r| r.max_drawdown).collect();
        assert_eq!(order, vec![5.0, 12.0, 20.0]);
    }

    #[test]
    fn nan_metrics_sink() {
        let mut rs = vec![result(0.0, f64::NAN, 0.0), result(0.0, 1.2, 0.0)];
        sort_results(&mut rs, SortBy::Sharpe);
        assert!((rs[0].sharpe_ratio - 1.2).abs() < 1e-12);
        assert!(rs[1].sharpe_ratio.is_nan());
    }

    #[test]
    fn failed_run_sentinel_sorts_last() {
        let mut rs = vec![OptResult::failed(Params::new()), result(-50.0, 0.0, 0.0)];
        sort_results(&mut rs, SortBy::PnlPct);
        assert_eq!(rs[1].pnl_pct, FAILED_RUN_PNL);
    }
}
