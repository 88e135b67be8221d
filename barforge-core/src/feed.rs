//! Data feed contract and the in-memory feed.
//!
//! A feed exposes an OHLCV line series plus a `datetime` line holding
//! days-since-epoch (time-zone naive; the sub-day fraction encodes the
//! time of day). `load` populates the lines in strictly increasing
//! datetime order; the feed's name is the broker's position and
//! commission key. File loaders live outside the core and only need to
//! satisfy this trait.

use crate::broker::BarView;
use crate::error::Result;
use crate::lines::FeedSeries;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::warn;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Encode a naive datetime as fractional days since the Unix epoch.
pub fn datetime_to_days(dt: NaiveDateTime) -> f64 {
    dt.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

/// Decode fractional days since the Unix epoch.
pub fn days_to_datetime(days: f64) -> NaiveDateTime {
    let secs = (days * SECONDS_PER_DAY).round() as i64;
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

/// One source row for an in-memory feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarRecord {
    pub datetime: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_interest: f64,
}

impl BarRecord {
    pub fn new(datetime: f64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
            open_interest: 0.0,
        }
    }

    fn is_sane(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.datetime.is_finite()
            && self.low <= self.high
    }
}

/// The boundary between the engine and whatever produces bars.
pub trait DataFeed: Send {
    /// Populate the line series. Bad rows are skipped, not fatal.
    fn load(&mut self) -> Result<()>;

    /// Synonym for `load` on feeds whose source is already materialized.
    fn preload(&mut self) -> Result<()> {
        self.load()
    }

    /// Unique identifier; the broker keys positions and commission by it.
    fn name(&self) -> &str;

    /// Total number of bars loaded.
    fn length(&self) -> usize;

    fn series(&self) -> &FeedSeries;

    fn series_mut(&mut self) -> &mut FeedSeries;

    /// Snapshot of the bar at an absolute index.
    fn view_at(&self, idx: usize) -> Option<BarView> {
        let s = self.series();
        if idx >= s.inner().size() {
            return None;
        }
        let read = |line: &crate::lines::LineBuffer| {
            line.try_get(line.pos() as i64 - idx as i64).unwrap_or(f64::NAN)
        };
        Some(BarView {
            open: read(s.open()),
            high: read(s.high()),
            low: read(s.low()),
            close: read(s.close()),
            volume: read(s.volume()),
            datetime: read(s.datetime()),
        })
    }
}

/// A feed over pre-built rows. The rows are shared through an `Arc` so an
/// optimization sweep can hand the same source data to every worker's
/// engine clone without copying it per run.
pub struct MemoryFeed {
    name: String,
    rows: Arc<Vec<BarRecord>>,
    series: FeedSeries,
    loaded: bool,
}

impl MemoryFeed {
    pub fn new(name: impl Into<String>, rows: Vec<BarRecord>) -> Self {
        Self::shared(name, Arc::new(rows))
    }

    pub fn shared(name: impl Into<String>, rows: Arc<Vec<BarRecord>>) -> Self {
        Self {
            name: name.into(),
            rows,
            series: FeedSeries::new(),
            loaded: false,
        }
    }

    /// Cheap handle to the same source rows for another engine instance.
    pub fn clone_source(&self) -> Self {
        Self::shared(self.name.clone(), Arc::clone(&self.rows))
    }

    /// Convenience for tests and demos: bars one day apart starting at
    /// `start_day`, with high/low straddling open/close.
    pub fn from_closes(name: impl Into<String>, start_day: f64, closes: &[f64]) -> Self {
        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = if i == 0 { c } else { closes[i - 1] };
                BarRecord::new(
                    start_day + i as f64,
                    open,
                    open.max(c) * 1.001,
                    open.min(c) * 0.999,
                    c,
                    1_000_000.0,
                )
            })
            .collect();
        Self::new(name, rows)
    }
}

impl DataFeed for MemoryFeed {
    fn load(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        let mut last_dt = f64::NEG_INFINITY;
        for (i, row) in self.rows.iter().enumerate() {
            if !row.is_sane() {
                warn!(feed = %self.name, row = i, "skipping malformed bar");
                continue;
            }
            if row.datetime <= last_dt {
                warn!(feed = %self.name, row = i, "skipping out-of-order bar");
                continue;
            }
            last_dt = row.datetime;
            self.series.push_bar(
                row.datetime,
                row.open,
                row.high,
                row.low,
                row.close,
                row.volume,
                row.open_interest,
            );
        }
        self.loaded = true;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> usize {
        self.series.inner().size()
    }

    fn series(&self) -> &FeedSeries {
        &self.series
    }

    fn series_mut(&mut self) -> &mut FeedSeries {
        &mut self.series
    }
}
