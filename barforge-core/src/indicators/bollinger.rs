//! Bollinger bands.

use crate::indicators::Indicator;
use crate::kernels;
use crate::lines::LineSeries;
use std::collections::VecDeque;

/// Middle = SMA, top/bottom = middle ± k·σ (population σ over the same
/// window), plus %B = (x − bottom)/(top − bottom). When the band collapses
/// (top == bottom) %B is defined as 0.5.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    dev_factor: f64,
    window: VecDeque<f64>,
    lines: LineSeries,
}

impl BollingerBands {
    pub fn new(period: usize, dev_factor: f64) -> Self {
        assert!(period >= 2, "Bollinger window must be at least 2");
        let mut lines = LineSeries::new();
        lines.add_line("mid");
        lines.add_line("top");
        lines.add_line("bot");
        lines.add_line("pctb");
        lines.set_min_period(period);
        Self {
            period,
            dev_factor,
            window: VecDeque::with_capacity(period),
            lines,
        }
    }

    fn percent_b(x: f64, top: f64, bot: f64) -> f64 {
        if top == bot {
            0.5
        } else {
            (x - bot) / (top - bot)
        }
    }
}

impl Indicator for BollingerBands {
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
        let x = inputs[0];
        if x.is_nan() {
            for idx in 0..4 {
                self.lines.line_mut(idx).push(f64::NAN);
            }
            return;
        }
        self.window.push_back(x);
        if self.window.len() > self.period {
            self.window.pop_front();
        }

        let (mid, top, bot, pctb) = if self.window.len() == self.period {
            let n = self.period as f64;
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
            let sd = var.sqrt();
            let top = mean + self.dev_factor * sd;
            let bot = mean - self.dev_factor * sd;
            (mean, top, bot, Self::percent_b(x, top, bot))
        } else {
            (f64::NAN, f64::NAN, f64::NAN, f64::NAN)
        };

        self.lines.line_mut(0).push(mid);
        self.lines.line_mut(1).push(top);
        self.lines.line_mut(2).push(bot);
        self.lines.line_mut(3).push(pctb);
    }

    fn once(&mut self, inputs: &[&[f64]], _start: usize, end: usize) {
        self.reset();
        let src = &inputs[0][..end.min(inputs[0].len())];
        let (mut mid, mut top, mut bot) = (Vec::new(), Vec::new(), Vec::new());
        kernels::bollinger(src, self.period, self.dev_factor, &mut mid, &mut top, &mut bot);
        let pctb: Vec<f64> = src
            .iter()
            .zip(top.iter().zip(&bot))
            .map(|(&x, (&t, &b))| {
                if t.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    Self::percent_b(x, t, b)
                }
            })
            .collect();
        self.lines.line_mut(0).extend_from_slice(&mid);
        self.lines.line_mut(1).extend_from_slice(&top);
        self.lines.line_mut(2).extend_from_slice(&bot);
        self.lines.line_mut(3).extend_from_slice(&pctb);
    }

    fn reset(&mut self) {
        self.window.clear();
        self.lines.reset();
    }
}
