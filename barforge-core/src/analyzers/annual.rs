//! Per-calendar-year returns.

use crate::analyzers::Analyzer;
use crate::broker::Broker;
use crate::feed::days_to_datetime;
use chrono::Datelike;
use std::collections::BTreeMap;

/// Buckets portfolio returns by the calendar year of each bar's datetime
/// line. Keys are `annual_return_<year>` in percent, plus `total_return`.
#[derive(Debug, Default)]
pub struct AnnualReturn {
    start_value: f64,
    year_start_value: f64,
    current_year: Option<i32>,
    last_value: f64,
    yearly: BTreeMap<i32, f64>,
    analysis: BTreeMap<String, f64>,
}

impl AnnualReturn {
    pub fn new() -> Self {
        Self::default()
    }

    fn close_year(&mut self) {
        if let Some(year) = self.current_year {
            if self.year_start_value > 0.0 {
                let ret = (self.last_value - self.year_start_value) / self.year_start_value;
                self.yearly.insert(year, ret * 100.0);
            }
        }
    }
}

impl Analyzer for AnnualReturn {
    fn name(&self) -> &'static str {
        "annual_return"
    }

    fn start(&mut self, broker: &Broker) {
        *self = Self::default();
        self.start_value = broker.value();
        self.year_start_value = self.start_value;
        self.last_value = self.start_value;
    }

    fn next(&mut self, broker: &Broker, dt: f64) {
        let year = days_to_datetime(dt).year();
        match self.current_year {
            None => self.current_year = Some(year),
            Some(current) if current != year => {
                self.close_year();
                self.current_year = Some(year);
                self.year_start_value = self.last_value;
            }
            _ => {}
        }
        self.last_value = broker.value();
    }

    fn stop(&mut self, broker: &Broker) {
        self.last_value = broker.value();
        self.close_year();
        for (year, ret) in &self.yearly {
            self.analysis.insert(format!("annual_return_{year}"), *ret);
        }
        self.analysis.insert(
            "total_return".into(),
            if self.start_value > 0.0 {
                (self.last_value - self.start_value) / self.start_value * 100.0
            } else {
                0.0
            },
        );
    }

    fn analysis(&self) -> BTreeMap<String, f64> {
        self.analysis.clone()
    }
}
