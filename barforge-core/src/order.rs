//! Order state machine and execution accumulation.

use serde::{Deserialize, Serialize};

/// Order direction. Size is always stored positive; the side carries the
/// sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

/// Execution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fill at the next tradable price (next bar's open, or the current
    /// bar under a cheat policy).
    Market,
    /// Fill at the close of the bar being processed.
    Close,
    /// Fill at the limit price or better.
    Limit,
    /// Trigger at the stop price, then fill as market.
    Stop,
    /// Trigger at the stop price, then rest as a limit order.
    StopLimit,
    /// Stop whose trigger price trails the close.
    StopTrail,
    /// Trailing stop that converts to a limit order on trigger.
    StopTrailLimit,
    /// Replayed historical execution; fills unconditionally at its price.
    Historical,
}

/// Order lifecycle states. Completed, Canceled, Expired, Margin and
/// Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Submitted,
    Accepted,
    Partial,
    Completed,
    Canceled,
    Expired,
    Margin,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Margin
                | OrderStatus::Rejected
        )
    }
}

/// One (possibly partial) execution event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionBit {
    pub dt: f64,
    pub size: f64,
    pub price: f64,
    pub closed: f64,
    pub closed_value: f64,
    pub closed_comm: f64,
    pub opened: f64,
    pub opened_value: f64,
    pub opened_comm: f64,
    pub pnl: f64,
    /// Position size after this execution.
    pub psize: f64,
    /// Position average price after this execution.
    pub pprice: f64,
}

/// Accumulated execution data for an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    pub dt: f64,
    /// Cumulative executed size.
    pub size: f64,
    /// Size still to execute.
    pub remaining: f64,
    /// Volume-weighted average execution price.
    pub price: f64,
    pub value: f64,
    pub closed: f64,
    pub closed_value: f64,
    pub closed_comm: f64,
    pub opened: f64,
    pub opened_value: f64,
    pub opened_comm: f64,
    pub commission: f64,
    pub pnl: f64,
    pub psize: f64,
    pub pprice: f64,
    pub bits: Vec<ExecutionBit>,
}

impl ExecutionData {
    pub fn add(&mut self, bit: ExecutionBit) {
        if bit.size != 0.0 && !bit.size.is_nan() {
            if self.size == 0.0 {
                self.price = bit.price;
            } else {
                self.price =
                    (self.size * self.price + bit.size * bit.price) / (self.size + bit.size);
            }
            self.size += bit.size;
        }
        self.remaining = (self.remaining - bit.size).abs();
        self.dt = bit.dt;

        self.closed += bit.closed;
        self.closed_value += bit.closed_value;
        self.closed_comm += bit.closed_comm;
        self.opened += bit.opened;
        self.opened_value += bit.opened_value;
        self.opened_comm += bit.opened_comm;
        self.commission = self.closed_comm + self.opened_comm;

        self.pnl += bit.pnl;
        self.psize = bit.psize;
        self.pprice = bit.pprice;
        self.value = self.size * self.price;
        self.bits.push(bit);
    }
}

/// How a trailing stop follows the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrailBy {
    Amount(f64),
    Percent(f64),
}

impl TrailBy {
    pub fn distance(self, price: f64) -> f64 {
        match self {
            TrailBy::Amount(a) => a,
            TrailBy::Percent(p) => price * p,
        }
    }
}

/// A broker order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub ref_id: u64,
    pub side: Side,
    pub kind: OrderKind,
    /// Absolute order size; always positive.
    pub size: f64,
    /// Limit price for Limit / StopLimit / StopTrailLimit orders.
    pub limit_price: f64,
    /// Trigger price for Stop / StopLimit; current effective stop for
    /// trailing variants (adjusted every bar).
    pub stop_price: f64,
    /// Trailing distance for StopTrail / StopTrailLimit.
    pub trail: Option<TrailBy>,
    /// Expiry datetime in days-since-epoch; 0 means good-till-cancelled.
    pub valid_until: f64,
    /// Data feed this order trades.
    pub data: String,
    pub status: OrderStatus,
    /// Whether this order should be transmitted immediately (bracket
    /// parents hold children back until the group is complete).
    pub transmit: bool,
    pub parent: Option<u64>,
    pub oco: Option<u64>,
    pub children: Vec<u64>,
    pub created_bar: usize,
    /// A StopLimit/StopTrailLimit whose stop has fired rests as a plain
    /// limit order from the trigger bar onward.
    #[serde(default)]
    pub triggered: bool,
    pub executed: ExecutionData,
}

impl Order {
    pub fn new(ref_id: u64, side: Side, kind: OrderKind, size: f64, data: impl Into<String>) -> Self {
        let size = size.abs();
        Self {
            ref_id,
            side,
            kind,
            size,
            limit_price: 0.0,
            stop_price: 0.0,
            trail: None,
            valid_until: 0.0,
            data: data.into(),
            status: OrderStatus::Created,
            transmit: true,
            parent: None,
            oco: None,
            children: Vec::new(),
            created_bar: 0,
            triggered: false,
            executed: ExecutionData {
                remaining: size,
                ..ExecutionData::default()
            },
        }
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    /// Still eligible for execution.
    pub fn is_alive(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Created | OrderStatus::Submitted | OrderStatus::Accepted | OrderStatus::Partial
        )
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// Signed executed size (sell executions count negative).
    pub fn signed_executed(&self) -> f64 {
        self.executed.size * self.side.sign()
    }

    pub fn remaining(&self) -> f64 {
        self.executed.remaining
    }

    /// Expire the order if the bar datetime has passed its validity.
    /// Market orders never expire.
    pub fn check_expiry(&mut self, current_dt: f64) -> bool {
        if self.kind == OrderKind::Market || self.valid_until <= 0.0 {
            return false;
        }
        if current_dt > self.valid_until && self.is_alive() {
            self.status = OrderStatus::Expired;
            self.executed.dt = current_dt;
            return true;
        }
        false
    }

    /// Ratchet the stop of a trailing order toward the close. Sell stops
    /// ride up under rising prices, buy stops ride down.
    pub fn trail_adjust(&mut self, close: f64) {
        let Some(trail) = self.trail else { return };
        let distance = trail.distance(close);
        if distance <= 0.0 {
            return;
        }
        match self.side {
            Side::Sell => {
                let candidate = close - distance;
                if self.stop_price == 0.0 || candidate > self.stop_price {
                    self.stop_price = candidate;
                }
            }
            Side::Buy => {
                let candidate = close + distance;
                if self.stop_price == 0.0 || candidate < self.stop_price {
                    self.stop_price = candidate;
                }
            }
        }
    }

    /// Record an execution and transition to Partial or Completed.
    pub fn apply_execution(&mut self, bit: ExecutionBit) {
        if bit.size == 0.0 {
            return;
        }
        self.executed.add(bit);
        self.status = if self.executed.remaining > 1e-9 {
            OrderStatus::Partial
        } else {
            OrderStatus::Completed
        };
    }
}
