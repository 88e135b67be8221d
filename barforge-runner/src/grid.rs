//! Parameter grids: named value axes and their Cartesian product.

use barforge_core::{ParamValue, Params};

/// A set of named axes, each holding the values to sweep for one
/// parameter. The grid expands to every combination.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis with explicit values.
    pub fn add(&mut self, name: impl Into<String>, values: Vec<ParamValue>) -> &mut Self {
        self.axes.push((name.into(), values));
        self
    }

    /// Integer range axis, inclusive of both ends.
    pub fn add_int_range(&mut self, name: impl Into<String>, start: i64, end: i64, step: i64) -> &mut Self {
        assert!(step > 0, "step must be positive");
        let values = (start..=end)
            .step_by(step as usize)
            .map(ParamValue::Int)
            .collect();
        self.add(name, values)
    }

    /// Float range axis: `start, start+step, …` while `<= end` (with a
    /// half-step tolerance against accumulation error).
    pub fn add_float_range(&mut self, name: impl Into<String>, start: f64, end: f64, step: f64) -> &mut Self {
        assert!(step > 0.0, "step must be positive");
        let mut values = Vec::new();
        let mut v = start;
        while v <= end + step * 0.5 {
            values.push(ParamValue::Float(v));
            v += step;
        }
        self.add(name, values)
    }

    pub fn add_ints(&mut self, name: impl Into<String>, values: &[i64]) -> &mut Self {
        self.add(name, values.iter().copied().map(ParamValue::Int).collect())
    }

    pub fn add_floats(&mut self, name: impl Into<String>, values: &[f64]) -> &mut Self {
        self.add(name, values.iter().copied().map(ParamValue::Float).collect())
    }

    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    /// Total number of assignments: the product of axis sizes.
    pub fn size(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Expand the full Cartesian product.
    pub fn assignments(&self) -> Vec<Params> {
        if self.axes.is_empty() {
            return Vec::new();
        }
        let mut out = vec![Params::new()];
        for (name, values) in &self.axes {
            if values.is_empty() {
                return Vec::new();
            }
            let mut expanded = Vec::with_capacity(out.len() * values.len());
            for base in &out {
                for value in values {
                    let mut params = base.clone();
                    params.set(name.clone(), value.clone());
                    expanded.push(params);
                }
            }
            out = expanded;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_product_size() {
        let mut grid = ParamGrid::new();
        grid.add_ints("fast", &[5, 10, 15]);
        grid.add_ints("slow", &[20, 30]);
        assert_eq!(grid.size(), 6);
        assert_eq!(grid.assignments().len(), 6);
    }

    #[test]
    fn assignments_cover_all_combinations() {
        let mut grid = ParamGrid::new();
        grid.add_ints("a", &[1, 2]);
        grid.add_ints("b", &[10, 20]);
        let combos: Vec<(i64, i64)> = grid
            .assignments()
            .iter()
            .map(|p| (p.get_i64("a").unwrap(), p.get_i64("b").unwrap()))
            .collect();
        for expect in [(1, 10), (1, 20), (2, 10), (2, 20)] {
            assert!(combos.contains(&expect));
        }
    }

    #[test]
    fn int_range_inclusive() {
        let mut grid = ParamGrid::new();
        grid.add_int_range("period", 10, 30, 10);
        let values: Vec<i64> = grid.assignments().iter().map(|p| p.get_i64("period").unwrap()).collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn float_range_tolerates_accumulation() {
        let mut grid = ParamGrid::new();
        grid.add_float_range("dev", 1.0, 3.0, 0.5);
        assert_eq!(grid.size(), 5);
    }

    #[test]
    fn empty_grid_and_empty_axis() {
        assert_eq!(ParamGrid::new().size(), 0);
        let mut grid = ParamGrid::new();
        grid.add("dead", vec![]);
        assert!(grid.assignments().is_empty());
    }

    #[test]
    fn mixed_types() {
        let mut grid = ParamGrid::new();
        grid.add_ints("period", &[5, 10]);
        grid.add("trailing", vec![ParamValue::Bool(true), ParamValue::Bool(false)]);
        assert_eq!(grid.size(), 4);
    }
}
