//! Closed-trade statistics.

use crate::analyzers::Analyzer;
use crate::broker::Broker;
use crate::trade::Trade;
use std::collections::BTreeMap;

/// Win/loss counts, gross profit and loss, streaks and profit factor over
/// closed trades (P&L after commission).
#[derive(Debug, Default)]
pub struct TradeAnalyzer {
    total: usize,
    won: usize,
    lost: usize,
    gross_profit: f64,
    gross_loss: f64,
    streak: usize,
    max_win_streak: usize,
    max_loss_streak: usize,
    last_was_win: Option<bool>,
    analysis: BTreeMap<String, f64>,
}

impl TradeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for TradeAnalyzer {
    fn name(&self) -> &'static str {
        "trades"
    }

    fn start(&mut self, _broker: &Broker) {
        *self = Self::default();
    }

    fn notify_trade(&mut self, trade: &Trade) {
        if trade.is_open {
            return;
        }
        self.total += 1;

        if trade.pnl_comm > 0.0 {
            self.won += 1;
            self.gross_profit += trade.pnl_comm;
            self.streak = if self.last_was_win == Some(true) {
                self.streak + 1
            } else {
                1
            };
            self.last_was_win = Some(true);
            self.max_win_streak = self.max_win_streak.max(self.streak);
        } else if trade.pnl_comm < 0.0 {
            self.lost += 1;
            self.gross_loss += trade.pnl_comm.abs();
            self.streak = if self.last_was_win == Some(false) {
                self.streak + 1
            } else {
                1
            };
            self.last_was_win = Some(false);
            self.max_loss_streak = self.max_loss_streak.max(self.streak);
        }
    }

    fn stop(&mut self, _broker: &Broker) {
        let a = &mut self.analysis;
        a.insert("total_trades".into(), self.total as f64);
        a.insert("won_trades".into(), self.won as f64);
        a.insert("lost_trades".into(), self.lost as f64);
        a.insert("gross_profit".into(), self.gross_profit);
        a.insert("gross_loss".into(), self.gross_loss);
        a.insert("net_profit".into(), self.gross_profit - self.gross_loss);

        let (win_rate, avg_trade) = if self.total > 0 {
            (
                self.won as f64 / self.total as f64 * 100.0,
                (self.gross_profit - self.gross_loss) / self.total as f64,
            )
        } else {
            (0.0, 0.0)
        };
        a.insert("win_rate".into(), win_rate);
        a.insert("avg_trade".into(), avg_trade);
        a.insert(
            "avg_win".into(),
            if self.won > 0 {
                self.gross_profit / self.won as f64
            } else {
                0.0
            },
        );
        a.insert(
            "avg_loss".into(),
            if self.lost > 0 {
                self.gross_loss / self.lost as f64
            } else {
                0.0
            },
        );
        // All-winner runs get the conventional sentinel instead of a
        // division by zero.
        a.insert(
            "profit_factor".into(),
            if self.gross_loss > 0.0 {
                self.gross_profit / self.gross_loss
            } else if self.gross_profit > 0.0 {
                999.99
            } else {
                0.0
            },
        );
        a.insert("max_win_streak".into(), self.max_win_streak as f64);
        a.insert("max_loss_streak".into(), self.max_loss_streak as f64);
    }

    fn analysis(&self) -> BTreeMap<String, f64> {
        self.analysis.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(pnl_comm: f64) -> Trade {
        Trade {
            pnl_comm,
            pnl: pnl_comm,
            is_open: false,
            ..Trade::default()
        }
    }

    fn run(trades: &[f64]) -> BTreeMap<String, f64> {
        let broker = Broker::new(0.0);
        let mut a = TradeAnalyzer::new();
        a.start(&broker);
        for &p in trades {
            a.notify_trade(&closed(p));
        }
        a.stop(&broker);
        a.analysis()
    }

    #[test]
    fn counts_and_rates() {
        let a = run(&[100.0, -50.0, 200.0, -25.0]);
        assert_eq!(a["total_trades"], 4.0);
        assert_eq!(a["won_trades"], 2.0);
        assert_eq!(a["lost_trades"], 2.0);
        assert_eq!(a["win_rate"], 50.0);
        assert_eq!(a["gross_profit"], 300.0);
        assert_eq!(a["gross_loss"], 75.0);
        assert!((a["profit_factor"] - 4.0).abs() < 1e-12);
        assert_eq!(a["avg_win"], 150.0);
        assert_eq!(a["avg_loss"], 37.5);
    }

    #[test]
    fn streaks() {
        let a = run(&[10.0, 10.0, 10.0, -5.0, -5.0, 10.0]);
        assert_eq!(a["max_win_streak"], 3.0);
        assert_eq!(a["max_loss_streak"], 2.0);
    }

    #[test]
    fn all_winners_sentinel() {
        let a = run(&[10.0, 20.0]);
        assert_eq!(a["profit_factor"], 999.99);
    }

    #[test]
    fn no_trades() {
        let a = run(&[]);
        assert_eq!(a["total_trades"], 0.0);
        assert_eq!(a["win_rate"], 0.0);
        assert_eq!(a["profit_factor"], 0.0);
    }

    #[test]
    fn open_trades_ignored() {
        let broker = Broker::new(0.0);
        let mut a = TradeAnalyzer::new();
        a.start(&broker);
        a.notify_trade(&Trade {
            is_open: true,
            pnl_comm: 100.0,
            ..Trade::default()
        });
        a.stop(&broker);
        assert_eq!(a.analysis()["total_trades"], 0.0);
    }
}
