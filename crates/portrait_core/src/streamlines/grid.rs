//! Axis scaling and the occupancy mask behind streamline seeding.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Axis scale for grid node placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    Linear,
    /// Decade-spaced nodes; requires strictly positive bounds.
    Log,
    /// Symmetric log (asinh-spaced), valid across zero.
    SymLog,
}

impl AxisScale {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "linear" => Ok(AxisScale::Linear),
            "log" => Ok(AxisScale::Log),
            "symlog" => Ok(AxisScale::SymLog),
            other => Err(ConfigError::InvalidScale(format!(
                "unknown scale {other:?}"
            ))),
        }
    }

    fn forward(&self, x: f64) -> f64 {
        match self {
            AxisScale::Linear => x,
            AxisScale::Log => x.log10(),
            AxisScale::SymLog => x.asinh(),
        }
    }

    fn inverse(&self, u: f64) -> f64 {
        match self {
            AxisScale::Linear => u,
            AxisScale::Log => 10f64.powf(u),
            AxisScale::SymLog => u.sinh(),
        }
    }
}

/// One axis of the fine occupancy mesh: node coordinates spaced
/// uniformly in the scale's transform space, so cells shrink and grow
/// with the scale (non-uniform local spacing under log/symlog).
///
/// A scale that would produce non-finite node coordinates (log of a
/// non-positive bound) is rejected here, before any occupancy state
/// exists. It is a configuration error, not an integration failure.
#[derive(Debug, Clone)]
pub struct GridAxis {
    scale: AxisScale,
    nodes: Vec<f64>,
    u0: f64,
    du: f64,
}

impl GridAxis {
    pub fn new(
        interval: [f64; 2],
        cells: usize,
        density: usize,
        scale: AxisScale,
    ) -> Result<Self, ConfigError> {
        let [min, max] = interval;
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ConfigError::InvalidGrid(format!(
                "axis interval [{min}, {max}] is not a proper range"
            )));
        }
        let n = cells * density.max(1);
        if n < 3 {
            return Err(ConfigError::InvalidGrid(format!(
                "axis needs at least 3 mask cells, got {n}"
            )));
        }
        if scale == AxisScale::Log && min <= 0.0 {
            return Err(ConfigError::InvalidScale(format!(
                "log scale requires positive bounds, got [{min}, {max}]"
            )));
        }

        let u0 = scale.forward(min);
        let u1 = scale.forward(max);
        let du = (u1 - u0) / (n - 1) as f64;
        let nodes: Vec<f64> = (0..n).map(|i| scale.inverse(u0 + du * i as f64)).collect();
        if nodes.iter().any(|v| !v.is_finite()) || !du.is_finite() || du == 0.0 {
            return Err(ConfigError::InvalidScale(format!(
                "scale {scale:?} produces non-finite grid coordinates on [{min}, {max}]"
            )));
        }
        Ok(Self {
            scale,
            nodes,
            u0,
            du,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, i: usize) -> f64 {
        self.nodes[i]
    }

    pub fn min(&self) -> f64 {
        self.nodes[0]
    }

    pub fn max(&self) -> f64 {
        *self.nodes.last().unwrap()
    }

    /// Strict interior test; positions on the boundary count as outside,
    /// terminating the branch that reached them.
    pub fn contains(&self, x: f64) -> bool {
        self.min() < x && x < self.max()
    }

    /// Nearest node index for an in-domain position.
    pub fn index_of(&self, x: f64) -> Option<usize> {
        if !x.is_finite() {
            return None;
        }
        let i = ((self.scale.forward(x) - self.u0) / self.du).round();
        if i >= 0.0 && i < self.nodes.len() as f64 {
            Some(i as usize)
        } else {
            None
        }
    }

    /// Distance to the next node, used for the adaptive step bound.
    pub fn spacing_at(&self, i: usize) -> f64 {
        let i = i.min(self.nodes.len() - 2);
        self.nodes[i + 1] - self.nodes[i]
    }
}

/// Row-major boolean mask over the fine mesh. Boundary cells start out
/// visited; a single field instance owns and mutates the grid for its
/// whole lifetime.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    shape: Vec<usize>,
    strides: Vec<usize>,
    visited: Vec<bool>,
    remaining: usize,
    cursor: usize,
}

impl OccupancyGrid {
    pub fn new(shape: &[usize]) -> Self {
        let total: usize = shape.iter().product();
        let mut strides = vec![1; shape.len()];
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        let mut grid = Self {
            shape: shape.to_vec(),
            strides,
            visited: vec![false; total],
            remaining: total,
            cursor: 0,
        };
        for flat in 0..total {
            if grid.on_boundary(flat) {
                grid.visited[flat] = true;
                grid.remaining -= 1;
            }
        }
        grid
    }

    fn on_boundary(&self, flat: usize) -> bool {
        let mut rest = flat;
        for (stride, &extent) in self.strides.iter().zip(&self.shape) {
            let coord = rest / stride;
            rest %= stride;
            if coord == 0 || coord + 1 == extent {
                return true;
            }
        }
        false
    }

    fn flatten(&self, cell: &[usize]) -> usize {
        debug_assert_eq!(cell.len(), self.shape.len());
        cell.iter().zip(&self.strides).map(|(c, s)| c * s).sum()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn is_visited(&self, cell: &[usize]) -> bool {
        self.visited[self.flatten(cell)]
    }

    /// Marks a cell visited; returns whether it was newly marked.
    pub fn mark(&mut self, cell: &[usize]) -> bool {
        let flat = self.flatten(cell);
        if self.visited[flat] {
            return false;
        }
        self.visited[flat] = true;
        self.remaining -= 1;
        true
    }

    pub fn all_visited(&self) -> bool {
        self.remaining == 0
    }

    /// First unvisited cell in row-major order. The cursor only moves
    /// forward: cells are never unmarked, so anything behind it stays
    /// visited.
    pub fn first_unvisited(&mut self) -> Option<Vec<usize>> {
        while self.cursor < self.visited.len() && self.visited[self.cursor] {
            self.cursor += 1;
        }
        if self.cursor >= self.visited.len() {
            return None;
        }
        let mut rest = self.cursor;
        let cell = self
            .strides
            .iter()
            .map(|stride| {
                let coord = rest / stride;
                rest %= stride;
                coord
            })
            .collect();
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_names_form_a_closed_set() {
        assert_eq!(AxisScale::from_name("linear").unwrap(), AxisScale::Linear);
        assert_eq!(AxisScale::from_name("log").unwrap(), AxisScale::Log);
        assert_eq!(AxisScale::from_name("symlog").unwrap(), AxisScale::SymLog);
        assert!(AxisScale::from_name("logit").is_err());
    }

    #[test]
    fn linear_axis_nodes_are_evenly_spaced() {
        let axis = GridAxis::new([0.0, 1.0], 5, 2, AxisScale::Linear).expect("valid axis");
        assert_eq!(axis.len(), 10);
        assert!((axis.min() - 0.0).abs() < 1e-12);
        assert!((axis.max() - 1.0).abs() < 1e-12);
        let spacing = axis.spacing_at(0);
        for i in 0..axis.len() - 1 {
            assert!((axis.spacing_at(i) - spacing).abs() < 1e-12);
        }
    }

    #[test]
    fn log_axis_rejects_non_positive_bounds() {
        let err = GridAxis::new([-1.0, 10.0], 5, 1, AxisScale::Log)
            .expect_err("negative log bound must fail");
        assert!(matches!(err, ConfigError::InvalidScale(_)));

        let err =
            GridAxis::new([0.0, 10.0], 5, 1, AxisScale::Log).expect_err("zero log bound must fail");
        assert!(matches!(err, ConfigError::InvalidScale(_)));
    }

    #[test]
    fn log_axis_spacing_grows_with_position() {
        let axis = GridAxis::new([1.0, 100.0], 10, 1, AxisScale::Log).expect("valid axis");
        assert!(axis.spacing_at(8) > axis.spacing_at(0));
    }

    #[test]
    fn symlog_axis_crosses_zero() {
        let axis = GridAxis::new([-10.0, 10.0], 11, 1, AxisScale::SymLog).expect("valid axis");
        assert!(axis.contains(0.0));
        assert!(axis.index_of(0.0).is_some());
    }

    #[test]
    fn index_round_trips_node_coordinates() {
        let axis = GridAxis::new([-2.0, 2.0], 8, 2, AxisScale::Linear).expect("valid axis");
        for i in 0..axis.len() {
            assert_eq!(axis.index_of(axis.node(i)), Some(i), "node {i}");
        }
        assert_eq!(axis.index_of(f64::NAN), None);
        assert_eq!(axis.index_of(100.0), None);
    }

    #[test]
    fn degenerate_interval_is_rejected() {
        let err = GridAxis::new([1.0, 1.0], 5, 1, AxisScale::Linear)
            .expect_err("empty interval must fail");
        assert!(matches!(err, ConfigError::InvalidGrid(_)));
    }

    #[test]
    fn boundary_cells_start_visited() {
        let grid = OccupancyGrid::new(&[4, 5]);
        for i in 0..4 {
            for j in 0..5 {
                let boundary = i == 0 || i == 3 || j == 0 || j == 4;
                assert_eq!(grid.is_visited(&[i, j]), boundary, "cell ({i}, {j})");
            }
        }
    }

    #[test]
    fn marking_interior_cells_reaches_full_coverage() {
        let mut grid = OccupancyGrid::new(&[4, 4]);
        assert!(!grid.all_visited());
        assert!(grid.mark(&[1, 1]));
        assert!(!grid.mark(&[1, 1]), "second mark is not new");
        grid.mark(&[1, 2]);
        grid.mark(&[2, 1]);
        grid.mark(&[2, 2]);
        assert!(grid.all_visited());
        assert_eq!(grid.first_unvisited(), None);
    }

    #[test]
    fn first_unvisited_scans_row_major() {
        let mut grid = OccupancyGrid::new(&[4, 4]);
        assert_eq!(grid.first_unvisited(), Some(vec![1, 1]));
        grid.mark(&[1, 1]);
        assert_eq!(grid.first_unvisited(), Some(vec![1, 2]));
    }

    #[test]
    fn boundary_premark_in_three_dimensions() {
        let grid = OccupancyGrid::new(&[3, 3, 3]);
        assert!(!grid.is_visited(&[1, 1, 1]));
        assert!(grid.is_visited(&[0, 1, 1]));
        assert!(grid.is_visited(&[1, 1, 2]));
    }
}
