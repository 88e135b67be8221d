//! Position accounting.

use serde::{Deserialize, Serialize};

/// A holding in one data feed: signed size and volume-weighted average
/// entry price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub size: f64,
    pub price: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_open(&self) -> bool {
        self.size != 0.0
    }

    pub fn value(&self) -> f64 {
        self.size * self.price
    }

    /// Apply a signed execution.
    ///
    /// Same-side additions recompute the volume-weighted average price;
    /// opposite-side executions reduce (and may flip) the position, with a
    /// zero-crossing resetting the average to the execution price.
    ///
    /// Returns `(opened, closed)`: the signed portions of `delta` that
    /// extended the position and that closed existing exposure.
    pub fn update(&mut self, delta: f64, exec_price: f64) -> (f64, f64) {
        if delta == 0.0 {
            return (0.0, 0.0);
        }

        if self.size == 0.0 {
            self.size = delta;
            self.price = exec_price;
            return (delta, 0.0);
        }

        let same_side = (self.size > 0.0) == (delta > 0.0);
        if same_side {
            let total = self.size * self.price + delta * exec_price;
            self.size += delta;
            self.price = total / self.size;
            return (delta, 0.0);
        }

        // Opposite side: close up to the current size, then flip.
        if delta.abs() < self.size.abs() {
            self.size += delta;
            (0.0, delta)
        } else if delta.abs() == self.size.abs() {
            self.size = 0.0;
            self.price = 0.0;
            (0.0, delta)
        } else {
            let closed = -self.size;
            let opened = delta + self.size;
            self.size = opened;
            self.price = exec_price; // crossed zero: fresh basis
            (opened, closed)
        }
    }

    pub fn close(&mut self) {
        self.size = 0.0;
        self.price = 0.0;
    }
}
