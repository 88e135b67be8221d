//! Named collections of line buffers sharing a cursor.

use crate::error::{Error, Result};
use crate::lines::LineBuffer;
use std::collections::HashMap;

/// A fixed set of named lines advanced in lockstep.
#[derive(Debug, Clone, Default)]
pub struct LineSeries {
    lines: Vec<LineBuffer>,
    names: Vec<String>,
    by_name: HashMap<String, usize>,
    bounded: Option<usize>,
}

impl LineSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series whose lines are bounded rings of the given capacity.
    pub fn bounded(cap: usize) -> Self {
        Self {
            bounded: Some(cap),
            ..Self::default()
        }
    }

    /// Add a line; returns its index.
    pub fn add_line(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        let idx = self.lines.len();
        self.lines.push(match self.bounded {
            Some(cap) => LineBuffer::bounded(cap),
            None => LineBuffer::new(),
        });
        self.by_name.insert(name.clone(), idx);
        self.names.push(name);
        idx
    }

    pub fn line(&self, idx: usize) -> &LineBuffer {
        &self.lines[idx]
    }

    pub fn line_mut(&mut self, idx: usize) -> &mut LineBuffer {
        &mut self.lines[idx]
    }

    pub fn by_name(&self, name: &str) -> Result<&LineBuffer> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::LineNotFound(name.to_string()))?;
        Ok(&self.lines[idx])
    }

    pub fn by_name_mut(&mut self, name: &str) -> Result<&mut LineBuffer> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::LineNotFound(name.to_string()))?;
        Ok(&mut self.lines[idx])
    }

    pub fn has_line(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn line_names(&self) -> &[String] {
        &self.names
    }

    /// Read the first line at a cursor offset (the conventional default
    /// output of an indicator).
    pub fn get(&self, k: i64) -> f64 {
        self.lines.first().map(|l| l.get(k)).unwrap_or(f64::NAN)
    }

    pub fn advance(&mut self) {
        for line in &mut self.lines {
            line.advance();
        }
    }

    pub fn rewind(&mut self) {
        for line in &mut self.lines {
            line.rewind();
        }
    }

    pub fn home(&mut self) {
        for line in &mut self.lines {
            line.home();
        }
    }

    pub fn seek(&mut self, pos: usize) {
        for line in &mut self.lines {
            line.seek(pos);
        }
    }

    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.reset();
        }
    }

    /// Bars held (the shortest line governs).
    pub fn size(&self) -> usize {
        self.lines.iter().map(LineBuffer::size).min().unwrap_or(0)
    }

    /// Total bars pushed.
    pub fn len(&self) -> usize {
        self.lines.iter().map(LineBuffer::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Series-level minimum period: the largest of any line.
    pub fn min_period(&self) -> usize {
        self.lines
            .iter()
            .map(LineBuffer::min_period)
            .max()
            .unwrap_or(1)
    }

    pub fn set_min_period(&mut self, mp: usize) {
        for line in &mut self.lines {
            line.set_min_period(mp);
        }
    }

    pub fn update_min_period(&mut self, mp: usize) {
        for line in &mut self.lines {
            line.update_min_period(mp);
        }
    }

    pub fn ready(&self) -> bool {
        self.lines.iter().all(LineBuffer::ready)
    }
}

/// Standard OHLCV line indices.
pub mod ohlcv {
    pub const OPEN: usize = 0;
    pub const HIGH: usize = 1;
    pub const LOW: usize = 2;
    pub const CLOSE: usize = 3;
    pub const VOLUME: usize = 4;
    pub const OPEN_INTEREST: usize = 5;
    pub const DATETIME: usize = 6;
}

/// The six standard market-data lines.
#[derive(Debug, Clone)]
pub struct OhlcvSeries {
    series: LineSeries,
}

impl Default for OhlcvSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl OhlcvSeries {
    pub fn new() -> Self {
        let mut series = LineSeries::new();
        for name in ["open", "high", "low", "close", "volume", "openinterest"] {
            series.add_line(name);
        }
        Self { series }
    }

    /// Append one bar to all six lines atomically.
    pub fn push_bar(&mut self, o: f64, h: f64, l: f64, c: f64, v: f64, oi: f64) {
        for (idx, value) in [o, h, l, c, v, oi].into_iter().enumerate() {
            self.series.line_mut(idx).push(value);
        }
    }

    pub fn open(&self) -> &LineBuffer {
        self.series.line(ohlcv::OPEN)
    }

    pub fn high(&self) -> &LineBuffer {
        self.series.line(ohlcv::HIGH)
    }

    pub fn low(&self) -> &LineBuffer {
        self.series.line(ohlcv::LOW)
    }

    pub fn close(&self) -> &LineBuffer {
        self.series.line(ohlcv::CLOSE)
    }

    pub fn volume(&self) -> &LineBuffer {
        self.series.line(ohlcv::VOLUME)
    }

    pub fn open_interest(&self) -> &LineBuffer {
        self.series.line(ohlcv::OPEN_INTEREST)
    }

    pub fn inner(&self) -> &LineSeries {
        &self.series
    }

    pub fn inner_mut(&mut self) -> &mut LineSeries {
        &mut self.series
    }
}

/// OHLCV plus the `datetime` line a data feed must expose.
///
/// Datetime values are days-since-epoch; the sub-day fraction encodes the
/// time of day. `push_bar` takes the datetime so the seventh line can
/// never fall out of lockstep with the other six.
#[derive(Debug, Clone)]
pub struct FeedSeries {
    series: LineSeries,
}

impl Default for FeedSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedSeries {
    pub fn new() -> Self {
        let mut series = LineSeries::new();
        for name in [
            "open",
            "high",
            "low",
            "close",
            "volume",
            "openinterest",
            "datetime",
        ] {
            series.add_line(name);
        }
        Self { series }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_bar(&mut self, dt: f64, o: f64, h: f64, l: f64, c: f64, v: f64, oi: f64) {
        for (idx, value) in [o, h, l, c, v, oi, dt].into_iter().enumerate() {
            self.series.line_mut(idx).push(value);
        }
    }

    pub fn open(&self) -> &LineBuffer {
        self.series.line(ohlcv::OPEN)
    }

    pub fn high(&self) -> &LineBuffer {
        self.series.line(ohlcv::HIGH)
    }

    pub fn low(&self) -> &LineBuffer {
        self.series.line(ohlcv::LOW)
    }

    pub fn close(&self) -> &LineBuffer {
        self.series.line(ohlcv::CLOSE)
    }

    pub fn volume(&self) -> &LineBuffer {
        self.series.line(ohlcv::VOLUME)
    }

    pub fn open_interest(&self) -> &LineBuffer {
        self.series.line(ohlcv::OPEN_INTEREST)
    }

    pub fn datetime(&self) -> &LineBuffer {
        self.series.line(ohlcv::DATETIME)
    }

    pub fn inner(&self) -> &LineSeries {
        &self.series
    }

    pub fn inner_mut(&mut self) -> &mut LineSeries {
        &mut self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_cursor_fans_out() {
        let mut s = LineSeries::new();
        s.add_line("a");
        s.add_line("b");
        s.line_mut(0).extend_from_slice(&[1.0, 2.0, 3.0]);
        s.line_mut(1).extend_from_slice(&[10.0, 20.0, 30.0]);

        s.advance();
        assert_eq!(s.line(0).current(), 2.0);
        assert_eq!(s.line(1).current(), 20.0);
        s.home();
        assert_eq!(s.line(0).current(), 1.0);
        assert_eq!(s.line(1).current(), 10.0);
    }

    #[test]
    fn lookup_by_name() {
        let mut s = LineSeries::new();
        s.add_line("signal");
        s.by_name_mut("signal").unwrap().push(1.0);
        assert_eq!(s.by_name("signal").unwrap().current(), 1.0);
        assert!(s.by_name("missing").is_err());
    }

    #[test]
    fn series_min_period_is_max_of_lines() {
        let mut s = LineSeries::new();
        s.add_line("fast");
        s.add_line("slow");
        s.line_mut(0).set_min_period(10);
        s.line_mut(1).set_min_period(30);
        assert_eq!(s.min_period(), 30);
    }

    #[test]
    fn push_bar_appends_all_lines() {
        let mut d = OhlcvSeries::new();
        d.push_bar(1.0, 2.0, 0.5, 1.5, 100.0, 0.0);
        d.push_bar(1.5, 2.5, 1.0, 2.0, 200.0, 0.0);
        assert_eq!(d.inner().size(), 2);
        d.inner_mut().advance();
        assert_eq!(d.open().current(), 1.5);
        assert_eq!(d.close().current(), 2.0);
        assert_eq!(d.volume().current(), 200.0);
    }

    #[test]
    fn feed_series_keeps_datetime_in_lockstep() {
        let mut f = FeedSeries::new();
        f.push_bar(19000.0, 1.0, 2.0, 0.5, 1.5, 10.0, 0.0);
        f.push_bar(19001.0, 1.5, 2.5, 1.0, 2.0, 20.0, 0.0);
        assert_eq!(f.datetime().size(), f.close().size());
        f.inner_mut().seek(1);
        assert_eq!(f.datetime().current(), 19001.0);
    }
}
