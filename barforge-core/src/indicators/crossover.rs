//! Two-line crossover detector.

use crate::indicators::Indicator;
use crate::lines::LineSeries;

/// Emits +1 on the bar where the first input crosses above the second,
/// −1 where it crosses below, 0 otherwise. Binds two input lines; needs
/// one bar of history to compare against, so the minimum period is 2.
///
/// The output feeds the signal layer directly: +1/−1/0 is exactly the
/// long/short/none convention of a `LongShort` signal.
#[derive(Debug, Clone)]
pub struct CrossOver {
    prev: Option<(f64, f64)>,
    lines: LineSeries,
}

impl Default for CrossOver {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossOver {
    pub fn new() -> Self {
        let mut lines = LineSeries::new();
        lines.add_line("crossover");
        lines.set_min_period(2);
        Self { prev: None, lines }
    }
}

impl Indicator for CrossOver {
    fn lines(&self) -> &LineSeries {
        &self.lines
    }

    fn lines_mut(&mut self) -> &mut LineSeries {
        &mut self.lines
    }

    fn min_period(&self) -> usize {
        2
    }

    fn num_inputs(&self) -> usize {
        2
    }

    fn update(&mut self, inputs: &[f64]) {
        let (a, b) = (inputs[0], inputs[1]);
        let out = match self.prev {
            Some((pa, pb)) if a.is_finite() && b.is_finite() && pa.is_finite() && pb.is_finite() => {
                if pa <= pb && a > b {
                    1.0
                } else if pa >= pb && a < b {
                    -1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        };
        self.prev = Some((a, b));
        self.lines.line_mut(0).push(out);
    }

    fn reset(&mut self) {
        self.prev = None;
        self.lines.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(a: &[f64], b: &[f64]) -> Vec<f64> {
        let mut x = CrossOver::new();
        for (&va, &vb) in a.iter().zip(b) {
            x.update(&[va, vb]);
        }
        let line = x.lines().line(0);
        (0..a.len())
            .map(|i| line.try_get(line.pos() as i64 - i as i64).unwrap())
            .collect()
    }

    #[test]
    fn detects_up_and_down_crosses() {
        let fast = [1.0, 2.0, 4.0, 3.0, 1.0];
        let slow = [3.0, 3.0, 3.0, 3.0, 3.0];
        let out = run(&fast, &slow);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 1.0); // crossed above
        assert_eq!(out[3], 0.0); // still above at 3.0 == 3.0? no: 3.0 !> 3.0, no cross
        assert_eq!(out[4], -1.0); // crossed below
    }

    #[test]
    fn touching_then_crossing_counts_once() {
        let fast = [1.0, 3.0, 5.0];
        let slow = [3.0, 3.0, 3.0];
        let out = run(&fast, &slow);
        assert_eq!(out[1], 0.0); // touch, no cross
        assert_eq!(out[2], 1.0); // cross confirmed
    }
}
