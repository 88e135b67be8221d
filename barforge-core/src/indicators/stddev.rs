//! Rolling standard deviation.

use crate::indicators::Indicator;
use crate::kernels;
use crate::lines::LineSeries;
use std::collections::VecDeque;

/// Population standard deviation over a fixed window. A constant window
/// yields exactly 0, never NaN.
#[derive(Debug, Clone)]
pub struct StdDev {
    period: usize,
    window: VecDeque<f64>,
    lines: LineSeries,
}

impl StdDev {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "stddev needs a window of at least 2");
        let mut lines = LineSeries::new();
        lines.add_line("stddev");
        lines.set_min_period(period);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            lines,
        }
    }

    fn window_stddev(&self) -> f64 {
        let n = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / n;
        let var = self
            .window
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        var.sqrt()
    }
}

impl Indicator for StdDev {
    fn lines(&self) -> &LineSeries {
        &self.lines
    }

    fn lines_mut(&mut self) -> &mut LineSeries {
        &mut self.lines
    }

    fn min_period(&self) -> usize {
        self.period
    }

    fn update(&mut self, inputs: &[f64]) {
        if inputs[0].is_nan() {
            self.lines.line_mut(0).push(f64::NAN);
            return;
        }
        self.window.push_back(inputs[0]);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        let out = if self.window.len() == self.period {
            self.window_stddev()
        } else {
            f64::NAN
        };
        self.lines.line_mut(0).push(out);
    }

    fn once(&mut self, inputs: &[&[f64]], _start: usize, end: usize) {
        self.reset();
        let src = &inputs[0][..end.min(inputs[0].len())];
        let mut out = vec![f64::NAN; src.len()];
        if src.len() >= self.period {
            for i in (self.period - 1)..src.len() {
                let window = &src[i + 1 - self.period..=i];
                let m = kernels::mean(window);
                out[i] = kernels::stddev(window, m);
            }
        }
        self.lines.line_mut(0).extend_from_slice(&out);
    }

    fn reset(&mut self) {
        self.window.clear();
        self.lines.reset();
    }
}
