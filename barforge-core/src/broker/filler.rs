//! Volume fillers: how much of an order a single bar can absorb.

use crate::order::Order;

/// Limits the fillable size of an order given the bar's traded volume.
pub trait VolumeFiller: Send + Sync {
    /// Size that can be filled at `price` given `volume` traded this bar.
    fn fill(&self, order: &Order, price: f64, volume: f64) -> f64;

    fn name(&self) -> &'static str;
}

/// Fills the entire order regardless of volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFiller;

impl VolumeFiller for DefaultFiller {
    fn fill(&self, order: &Order, _price: f64, _volume: f64) -> f64 {
        order.remaining()
    }

    fn name(&self) -> &'static str {
        "DefaultFiller"
    }
}

/// Caps the fill at a percentage of the bar's volume.
#[derive(Debug, Clone, Copy)]
pub struct BarVolumeFiller {
    max_fraction: f64,
}

impl BarVolumeFiller {
    /// `max_percent` is expressed as a percentage (100 = whole bar).
    pub fn new(max_percent: f64) -> Self {
        Self {
            max_fraction: max_percent / 100.0,
        }
    }
}

impl VolumeFiller for BarVolumeFiller {
    fn fill(&self, order: &Order, _price: f64, volume: f64) -> f64 {
        let cap = (volume * self.max_fraction).floor();
        order.remaining().min(cap)
    }

    fn name(&self) -> &'static str {
        "BarVolumeFiller"
    }
}

/// Caps the fill at a fixed size per bar.
#[derive(Debug, Clone, Copy)]
pub struct FixedVolumeFiller {
    cap: f64,
}

impl FixedVolumeFiller {
    pub fn new(cap: f64) -> Self {
        Self { cap }
    }
}

impl VolumeFiller for FixedVolumeFiller {
    fn fill(&self, order: &Order, _price: f64, _volume: f64) -> f64 {
        order.remaining().min(self.cap)
    }

    fn name(&self) -> &'static str {
        "FixedVolumeFiller"
    }
}
