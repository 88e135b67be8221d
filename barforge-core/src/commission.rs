//! Commission, margin, leverage and interest rules.

use serde::{Deserialize, Serialize};

/// How the commission figure is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommKind {
    /// Percentage of traded value.
    Percent,
    /// Fixed amount per share/contract.
    Fixed,
    /// Flat amount per trade.
    PerTrade,
}

/// Parameterized commission plan covering stock-like and futures-like
/// assets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionPlan {
    pub commission: f64,
    /// Contract multiplier.
    pub mult: f64,
    /// Stored margin requirement per contract, if any.
    pub margin: Option<f64>,
    /// Derive margin from `price · mult / leverage` instead.
    pub auto_margin: bool,
    pub kind: CommKind,
    /// Stock-like assets move full value through cash; futures-like lock
    /// margin and settle P&L only.
    pub stock_like: bool,
    /// Percentage rates given as absolute decimals (0.01 = 1%) rather
    /// than value/100.
    pub perc_abs: bool,
    /// Annual interest rate charged on held positions.
    pub interest: f64,
    /// Charge interest on longs too (shorts always pay).
    pub interest_long: bool,
    pub leverage: f64,
}

impl Default for CommissionPlan {
    fn default() -> Self {
        Self {
            commission: 0.0,
            mult: 1.0,
            margin: None,
            auto_margin: false,
            kind: CommKind::Percent,
            stock_like: true,
            perc_abs: false,
            interest: 0.0,
            interest_long: false,
            leverage: 1.0,
        }
    }
}

impl CommissionPlan {
    /// Typical stock trading: percentage commission, no leverage.
    pub fn stocks(commission: f64, perc_abs: bool) -> Self {
        Self {
            commission,
            perc_abs,
            kind: CommKind::Percent,
            stock_like: true,
            ..Self::default()
        }
    }

    /// Typical futures: fixed per-contract commission, margin, multiplier.
    pub fn futures(commission: f64, margin: f64, mult: f64) -> Self {
        Self {
            commission,
            kind: CommKind::Fixed,
            stock_like: false,
            margin: Some(margin),
            mult,
            ..Self::default()
        }
    }

    /// Forex: spread-priced (no explicit commission), auto-margin from
    /// leverage, swap interest on both sides.
    pub fn forex(leverage: f64, interest: f64) -> Self {
        Self {
            kind: CommKind::Fixed,
            stock_like: false,
            leverage,
            auto_margin: true,
            interest,
            interest_long: true,
            ..Self::default()
        }
    }

    /// Equity options: fixed per-contract commission, multiplier 100.
    pub fn options(commission: f64) -> Self {
        Self {
            commission,
            kind: CommKind::Fixed,
            stock_like: true,
            mult: 100.0,
            ..Self::default()
        }
    }

    /// Retail flat fee per trade.
    pub fn flat(fee_per_trade: f64) -> Self {
        Self {
            commission: fee_per_trade,
            kind: CommKind::PerTrade,
            stock_like: true,
            ..Self::default()
        }
    }
}

/// The five questions a commission rule answers for a `(size, price)`
/// pair, plus the size inverse. Implemented with default methods over a
/// [`CommissionPlan`]; schemes with bespoke fee curves override
/// [`Commission::commission`] and inherit the rest.
pub trait Commission: Send + Sync {
    fn plan(&self) -> &CommissionPlan;

    /// Effective percentage rate, zero for non-percentage schemes.
    fn rate(&self) -> f64 {
        let p = self.plan();
        if p.kind != CommKind::Percent {
            return 0.0;
        }
        if p.perc_abs {
            p.commission
        } else {
            p.commission / 100.0
        }
    }

    /// Commission for executing `size` units at `price`.
    fn commission(&self, size: f64, price: f64) -> f64 {
        let p = self.plan();
        let size = size.abs();
        match p.kind {
            CommKind::Percent => size * price * p.mult * self.rate(),
            CommKind::Fixed => size * p.commission,
            CommKind::PerTrade => p.commission,
        }
    }

    /// Margin requirement per contract at `price`.
    fn margin(&self, price: f64) -> f64 {
        let p = self.plan();
        if p.auto_margin {
            return price * p.mult / p.leverage;
        }
        p.margin.unwrap_or(price * p.mult)
    }

    /// Monetary value of `size` units at `price`.
    fn value_size(&self, size: f64, price: f64) -> f64 {
        size * price * self.plan().mult
    }

    /// Full cost of an operation: absolute value plus commission.
    fn operation_cost(&self, size: f64, price: f64) -> f64 {
        self.value_size(size, price).abs() + self.commission(size, price)
    }

    /// Largest whole size purchasable with `cash` at `price`, commission
    /// included. Iterative for fixed commission schemes.
    fn get_size(&self, price: f64, cash: f64) -> i64 {
        if price <= 0.0 || cash <= 0.0 {
            return 0;
        }
        let p = self.plan();
        if p.stock_like {
            let mut effective = price * p.mult;
            if p.kind == CommKind::Percent {
                effective *= 1.0 + self.rate();
            }
            let mut size = (cash / effective).floor();
            if p.kind == CommKind::Fixed {
                while size > 0.0 && size * price * p.mult + self.commission(size, price) > cash {
                    size -= 1.0;
                }
            }
            size.max(0.0) as i64
        } else {
            let per_unit = self.margin(price);
            if per_unit <= 0.0 {
                return 0;
            }
            (cash / per_unit).floor().max(0.0) as i64
        }
    }

    /// P&L of holding `size` from `price` to `new_price`.
    fn profit_and_loss(&self, size: f64, price: f64, new_price: f64) -> f64 {
        size * self.plan().mult * (new_price - price)
    }

    /// Cash delta when opening: stocks pay full value, futures lock margin
    /// only.
    fn cash_adjust_open(&self, size: f64, price: f64) -> f64 {
        if self.plan().stock_like {
            -size * price * self.plan().mult
        } else {
            0.0
        }
    }

    /// Cash delta when closing: stocks receive full value, futures settle
    /// realized P&L.
    fn cash_adjust_close(&self, size: f64, price: f64, new_price: f64) -> f64 {
        if self.plan().stock_like {
            -size * new_price * self.plan().mult
        } else {
            self.profit_and_loss(size, price, new_price)
        }
    }

    /// Interest charge over `days`. Shorts always pay; longs only when
    /// the plan says so.
    fn interest(&self, size: f64, price: f64, days: f64) -> f64 {
        let p = self.plan();
        if p.interest == 0.0 || days <= 0.0 {
            return 0.0;
        }
        if size > 0.0 && !p.interest_long {
            return 0.0;
        }
        (size * price * p.mult).abs() * (p.interest / 365.0) * days
    }
}

impl Commission for CommissionPlan {
    fn plan(&self) -> &CommissionPlan {
        self
    }
}

/// Asymmetric percentage rates for buys and sells.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuySellCommission {
    plan: CommissionPlan,
    pub buy_rate: f64,
    pub sell_rate: f64,
}

impl BuySellCommission {
    pub fn new(buy_rate: f64, sell_rate: f64, perc_abs: bool) -> Self {
        Self {
            plan: CommissionPlan {
                kind: CommKind::Percent,
                perc_abs,
                stock_like: true,
                ..CommissionPlan::default()
            },
            buy_rate,
            sell_rate,
        }
    }
}

impl Commission for BuySellCommission {
    fn plan(&self) -> &CommissionPlan {
        &self.plan
    }

    /// The sign of `size` selects the rate: buys positive, sells negative.
    fn commission(&self, size: f64, price: f64) -> f64 {
        let mut rate = if size >= 0.0 { self.buy_rate } else { self.sell_rate };
        if !self.plan.perc_abs {
            rate /= 100.0;
        }
        size.abs() * price * self.plan.mult * rate
    }
}

/// Tiered per-share commission: a per-share fee floored by a per-order
/// minimum and capped at a percentage of trade value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TieredCommission {
    plan: CommissionPlan,
    pub per_share: f64,
    pub min_per_order: f64,
    /// Cap as percent of trade value (0.5 = 0.5%).
    pub max_percent: f64,
}

impl Default for TieredCommission {
    fn default() -> Self {
        Self {
            plan: CommissionPlan {
                kind: CommKind::Fixed,
                stock_like: true,
                ..CommissionPlan::default()
            },
            per_share: 0.005,
            min_per_order: 1.0,
            max_percent: 0.5,
        }
    }
}

impl Commission for TieredCommission {
    fn plan(&self) -> &CommissionPlan {
        &self.plan
    }

    fn commission(&self, size: f64, price: f64) -> f64 {
        let size = size.abs();
        let comm = (size * self.per_share).max(self.min_per_order);
        let cap = size * price * self.plan.mult * (self.max_percent / 100.0);
        comm.min(cap)
    }
}
