//! Space-filling streamline sets over a rectangular 2D or 3D grid.
//!
//! A [`StreamlineField`] owns a fine occupancy mask over the domain and
//! grows bidirectional flow curves from unvisited cells until the whole
//! mask is covered. Each curve is integrated with an adaptive local step
//! bounded to a fraction of the cell it is crossing, and terminates on
//! domain exit, length cap, degenerate speed, or exhaustion of a
//! persistence budget inside already-covered territory.

pub mod grid;
pub mod integrate;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::field::{FieldAdapter, Params};
use crate::interval::Interval;
use crate::series::StateSeries;

use grid::{AxisScale, GridAxis, OccupancyGrid};
use integrate::{Integrator, StepStages};

/// Treated as the smallest meaningful speed when bounding the local
/// step; anything below it is effectively a velocity node.
const SPEED_FLOOR: f64 = 1e-12;

/// Loop detection is only attempted every this many raw steps.
const LOOP_CHECK_STRIDE: usize = 10;

/// One axis of the streamline domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub interval: Interval,
    pub scale: AxisScale,
}

impl AxisSpec {
    pub fn linear(interval: Interval) -> Self {
        Self {
            interval,
            scale: AxisScale::Linear,
        }
    }
}

/// Tunables for streamline construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreamlineConfig {
    /// Maximum number of points in one full streamline; each half gets
    /// half of this budget.
    pub max_len: usize,
    /// A single step never crosses more than `1 / step_factor` of the
    /// local cell.
    pub step_factor: f64,
    pub integrator: Integrator,
    /// Steps a branch may spend re-entering already-visited cells
    /// before it is cut off.
    pub persistence: u32,
    /// Occupancy mask refinement relative to the visualization grid.
    pub density: usize,
    pub detect_loops: bool,
    /// Loop-closure radius, in % of the local cell diagonal.
    pub loop_radius: f64,
    /// Streamlines with fewer total points are discarded as degenerate.
    pub min_points: usize,
    /// Relative tolerance between the seed speed and the speed at the
    /// first integrated sample; a larger disagreement marks the seed as
    /// numerically degenerate.
    pub seed_speed_rtol: f64,
}

impl Default for StreamlineConfig {
    fn default() -> Self {
        Self {
            max_len: 2500,
            step_factor: 10.0,
            integrator: Integrator::Euler,
            persistence: 20,
            density: 1,
            detect_loops: false,
            loop_radius: 1.0,
            min_points: 4,
            seed_speed_rtol: 0.5,
        }
    }
}

/// One assembled streamline: backward half reversed, seed, forward
/// half, with the instantaneous speed recorded alongside each point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Streamline {
    pub points: StateSeries,
    pub speeds: Vec<f64>,
    /// Index of the seed point within `points`.
    pub seed_index: usize,
}

impl Streamline {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Covers a 2D or 3D grid with non-overlapping flow curves.
///
/// Seeds are chosen deterministically: the first unvisited mask cell in
/// row-major scan order. Runs are therefore reproducible for a given
/// field, domain and configuration.
pub struct StreamlineField {
    adapter: Arc<FieldAdapter>,
    params: Params,
    axes: Vec<GridAxis>,
    grid: OccupancyGrid,
    config: StreamlineConfig,
    stages: StepStages,
    streamlines: Vec<Streamline>,
}

impl StreamlineField {
    /// Builds the domain grid and occupancy mask. `cells` is the
    /// visualization mesh resolution per axis; the mask is finer by
    /// `config.density`. All grid/scale validation happens here;
    /// nothing is integrated yet.
    pub fn new(
        adapter: Arc<FieldAdapter>,
        params: Params,
        axes: &[AxisSpec],
        cells: usize,
        config: StreamlineConfig,
    ) -> Result<Self, ConfigError> {
        let dim = axes.len();
        if dim < 2 || dim > 3 {
            return Err(ConfigError::InvalidGrid(format!(
                "streamlines cover 2 or 3 dimensions, got {dim}"
            )));
        }
        if adapter.dimension() != dim {
            return Err(ConfigError::DimensionMismatch {
                expected: adapter.dimension(),
                got: dim,
            });
        }
        if !config.step_factor.is_finite() || config.step_factor <= 0.0 {
            return Err(ConfigError::InvalidGrid(format!(
                "step factor must be positive, got {}",
                config.step_factor
            )));
        }
        let grid_axes: Vec<GridAxis> = axes
            .iter()
            .map(|spec| GridAxis::new(spec.interval, cells, config.density, spec.scale))
            .collect::<Result<_, _>>()?;
        let shape: Vec<usize> = grid_axes.iter().map(GridAxis::len).collect();
        Ok(Self {
            adapter,
            params,
            grid: OccupancyGrid::new(&shape),
            stages: StepStages::new(dim),
            axes: grid_axes,
            config,
            streamlines: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    pub fn streamlines(&self) -> &[Streamline] {
        &self.streamlines
    }

    pub fn occupancy(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Seeds and integrates streamlines until the occupancy mask is
    /// fully visited. Degenerate streamlines are dropped silently; their
    /// seed cells still count as covered, so the loop always terminates.
    pub fn compute_all(&mut self) -> &[Streamline] {
        while let Some(cell) = self.grid.first_unvisited() {
            let seed: Vec<f64> = cell
                .iter()
                .zip(&self.axes)
                .map(|(&c, axis)| axis.node(c))
                .collect();
            // The seed cell is marked during the first half-step of the
            // trace; an immediate break still covers it.
            if let Some(streamline) = self.trace(&seed) {
                self.streamlines.push(streamline);
            }
        }
        &self.streamlines
    }

    /// Minimum and maximum speed across every computed streamline, for
    /// the rendering layer's colour normalization.
    pub fn speed_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for streamline in &self.streamlines {
            for &speed in &streamline.speeds {
                range = Some(match range {
                    None => (speed, speed),
                    Some((lo, hi)) => (lo.min(speed), hi.max(speed)),
                });
            }
        }
        range
    }

    /// Grows both halves from `seed`, validates, and assembles them.
    fn trace(&mut self, seed: &[f64]) -> Option<Streamline> {
        let dim = self.dimension();
        let mut v = vec![0.0; dim];
        self.adapter.eval(seed, &self.params, &mut v);
        let seed_speed = norm(&v);

        let (fwd_points, fwd_speeds) = self.half_streamline(seed, 1.0);
        let (bwd_points, bwd_speeds) = self.half_streamline(seed, -1.0);

        if !seed_speed.is_finite() || seed_speed == 0.0 {
            return None;
        }
        let total = fwd_points.len() + bwd_points.len() + 1;
        if total < self.config.min_points {
            return None;
        }
        if !self.half_agrees_with_seed(&fwd_points, &fwd_speeds)
            || !self.half_agrees_with_seed(&bwd_points, &bwd_speeds)
        {
            return None;
        }

        let mut points = StateSeries::new(dim, total);
        let mut speeds = Vec::with_capacity(total);
        for i in (0..bwd_points.len()).rev() {
            points.push(bwd_points.sample(i));
            speeds.push(bwd_speeds[i]);
        }
        let seed_index = points.len();
        points.push(seed);
        speeds.push(seed_speed);
        for (sample, &speed) in fwd_points.iter().zip(&fwd_speeds) {
            points.push(sample);
            speeds.push(speed);
        }
        Some(Streamline {
            points,
            speeds,
            seed_index,
        })
    }

    /// A half whose first sample's speed disagrees badly with the speed
    /// measured at the seed signals a numerically degenerate seed (for
    /// example a fixed point inside the seed cell).
    fn half_agrees_with_seed(&self, points: &StateSeries, speeds: &[f64]) -> bool {
        let (Some(first), Some(&at_seed)) = (points.iter().next(), speeds.first()) else {
            // Empty half: judged by the min-points rule alone.
            return true;
        };
        let mut v = vec![0.0; self.dimension()];
        self.adapter.eval(first, &self.params, &mut v);
        let at_first = norm(&v);
        if !at_first.is_finite() {
            // The branch died right away; branch-local degeneracy was
            // already handled by termination.
            return true;
        }
        (at_first - at_seed).abs() <= self.config.seed_speed_rtol * at_seed.max(SPEED_FLOOR)
    }

    /// Integrates one half-branch. Returns the recorded positions and
    /// the speed measured before each step.
    fn half_streamline(&mut self, seed: &[f64], sign: f64) -> (StateSeries, Vec<f64>) {
        let dim = self.axes.len();
        let adapter = &self.adapter;
        let params = &self.params;
        let speed = |x: &[f64], out: &mut [f64]| adapter.eval(x, params, out);

        let mut points = StateSeries::new(dim, 64);
        let mut speeds = Vec::new();
        let mut x = seed.to_vec();
        let mut v = vec![0.0; dim];
        let mut cell = vec![0usize; dim];
        let mut prev_cell: Option<Vec<usize>> = None;
        let mut persistence = self.config.persistence;
        let mut step_count = 0usize;

        loop {
            if !self
                .axes
                .iter()
                .zip(&x)
                .all(|(axis, &coord)| axis.contains(coord))
            {
                break;
            }
            let located = self
                .axes
                .iter()
                .zip(&x)
                .enumerate()
                .all(|(a, (axis, &coord))| match axis.index_of(coord) {
                    Some(c) => {
                        cell[a] = c;
                        true
                    }
                    None => false,
                });
            if !located {
                break;
            }

            if self.config.detect_loops
                && step_count % LOOP_CHECK_STRIDE == 0
                && closes_loop(&points, &x, self.loop_radius_at(&cell))
            {
                break;
            }

            if self.grid.mark(&cell) {
                prev_cell = Some(cell.clone());
            } else if prev_cell.as_deref() != Some(cell.as_slice()) {
                persistence = persistence.saturating_sub(1);
                if persistence == 0 {
                    break;
                }
            }

            if points.len() >= self.config.max_len / 2 {
                break;
            }

            speed(&x, &mut v);
            let mag = norm(&v);
            if !mag.is_finite() {
                break;
            }

            let dt = self.local_dt(&cell, &v);
            self.stages
                .step(self.config.integrator, &speed, &mut x, sign * dt);
            points.push(&x);
            speeds.push(mag);
            if mag == 0.0 {
                break;
            }
            step_count += 1;
        }

        (points, speeds)
    }

    /// `dt = min over axes of spacing / (step_factor * |v_axis|)`, so one
    /// step never crosses more than a fraction of the local cell along
    /// any axis.
    fn local_dt(&self, cell: &[usize], v: &[f64]) -> f64 {
        self.axes
            .iter()
            .zip(cell)
            .zip(v)
            .map(|((axis, &c), &vi)| {
                axis.spacing_at(c) / (self.config.step_factor * vi.abs().max(SPEED_FLOOR))
            })
            .fold(f64::INFINITY, f64::min)
    }

    fn loop_radius_at(&self, cell: &[usize]) -> f64 {
        let diag: f64 = self
            .axes
            .iter()
            .zip(cell)
            .map(|(axis, &c)| axis.spacing_at(c).powi(2))
            .sum::<f64>()
            .sqrt();
        self.config.loop_radius / 100.0 * diag
    }
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// True when the branch head has returned near any earlier point of the
/// same branch (the most recent point is excluded).
fn closes_loop(points: &StateSeries, x: &[f64], radius: f64) -> bool {
    let earlier = points.len().saturating_sub(1);
    (0..earlier).any(|i| points.distance_to(i, x) < radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Coordinates;

    fn uniform_2d() -> Arc<FieldAdapter> {
        Arc::new(FieldAdapter::new_2d(|_x, _y, _p| (1.0, 1.0)))
    }

    fn unit_square() -> Vec<AxisSpec> {
        vec![
            AxisSpec::linear([0.0, 1.0]),
            AxisSpec::linear([0.0, 1.0]),
        ]
    }

    #[test]
    fn uniform_field_covers_the_grid() {
        let mut field = StreamlineField::new(
            uniform_2d(),
            Params::new(),
            &unit_square(),
            8,
            StreamlineConfig::default(),
        )
        .expect("valid field");
        let streamlines = field.compute_all();
        assert!(!streamlines.is_empty(), "uniform field must yield curves");
        assert!(field.occupancy().all_visited(), "mask must be covered");
    }

    #[test]
    fn uniform_field_speed_is_constant() {
        let mut field = StreamlineField::new(
            uniform_2d(),
            Params::new(),
            &unit_square(),
            8,
            StreamlineConfig::default(),
        )
        .expect("valid field");
        field.compute_all();
        let sqrt2 = 2f64.sqrt();
        for streamline in field.streamlines() {
            assert!(streamline.len() >= StreamlineConfig::default().min_points);
            for &speed in &streamline.speeds {
                assert!(
                    (speed - sqrt2).abs() < 1e-9,
                    "constant field speed drifted to {speed}"
                );
            }
        }
        let (lo, hi) = field.speed_range().expect("speeds exist");
        assert!((lo - sqrt2).abs() < 1e-9 && (hi - sqrt2).abs() < 1e-9);
    }

    #[test]
    fn zero_field_discards_everything_but_terminates() {
        let adapter = Arc::new(FieldAdapter::new_2d(|_x, _y, _p| (0.0, 0.0)));
        let mut field = StreamlineField::new(
            adapter,
            Params::new(),
            &unit_square(),
            6,
            StreamlineConfig::default(),
        )
        .expect("valid field");
        let streamlines = field.compute_all();
        assert!(
            streamlines.is_empty(),
            "fixed-point seeds must be dropped, not emitted"
        );
        assert!(field.occupancy().all_visited(), "seeding must still cover");
    }

    #[test]
    fn saddle_field_terminates_every_streamline() {
        let adapter = Arc::new(FieldAdapter::new_2d(|x, y, _p| (x, -y)));
        let config = StreamlineConfig::default();
        let mut field = StreamlineField::new(
            adapter,
            Params::new(),
            &[
                AxisSpec::linear([-1.0, 1.0]),
                AxisSpec::linear([-1.0, 1.0]),
            ],
            10,
            config,
        )
        .expect("valid field");
        field.compute_all();
        assert!(field.occupancy().all_visited());
        for streamline in field.streamlines() {
            assert!(
                streamline.len() <= config.max_len + 2,
                "length cap must bound every curve, got {}",
                streamline.len()
            );
        }
    }

    #[test]
    fn rotation_field_with_loop_detection_completes() {
        let adapter = Arc::new(FieldAdapter::new_2d(|x, y, _p| (-y, x)));
        let config = StreamlineConfig {
            detect_loops: true,
            ..StreamlineConfig::default()
        };
        let mut field = StreamlineField::new(
            adapter,
            Params::new(),
            &[
                AxisSpec::linear([-1.0, 1.0]),
                AxisSpec::linear([-1.0, 1.0]),
            ],
            8,
            config,
        )
        .expect("valid field");
        field.compute_all();
        assert!(field.occupancy().all_visited());
    }

    #[test]
    fn polar_rotation_matches_cartesian_rotation() {
        let adapter = Arc::new(
            FieldAdapter::new_2d(|_r, _t, _p| (0.0, 1.0))
                .with_coordinates(Coordinates::Polar)
                .expect("polar 2d"),
        );
        let mut field = StreamlineField::new(
            adapter,
            Params::new(),
            &[
                AxisSpec::linear([-1.0, 1.0]),
                AxisSpec::linear([-1.0, 1.0]),
            ],
            8,
            StreamlineConfig::default(),
        )
        .expect("valid field");
        field.compute_all();
        assert!(field.occupancy().all_visited());
        // Rigid rotation: speed equals the radius at each point.
        for streamline in field.streamlines() {
            for (point, &speed) in streamline.points.iter().zip(&streamline.speeds) {
                let r = point[0].hypot(point[1]);
                assert!(
                    (speed - r).abs() < 0.05,
                    "speed {speed} should track radius {r}"
                );
            }
        }
    }

    #[test]
    fn three_dimensional_coverage() {
        let adapter = Arc::new(FieldAdapter::new_3d(|_x, _y, _z, _p| (1.0, 1.0, 1.0)));
        let mut field = StreamlineField::new(
            adapter,
            Params::new(),
            &[
                AxisSpec::linear([0.0, 1.0]),
                AxisSpec::linear([0.0, 1.0]),
                AxisSpec::linear([0.0, 1.0]),
            ],
            4,
            StreamlineConfig::default(),
        )
        .expect("valid field");
        field.compute_all();
        assert!(field.occupancy().all_visited());
        assert!(!field.streamlines().is_empty());
    }

    #[test]
    fn higher_order_integrators_also_cover() {
        for integrator in [Integrator::RungeKutta3, Integrator::MultiStage] {
            let config = StreamlineConfig {
                integrator,
                ..StreamlineConfig::default()
            };
            let mut field = StreamlineField::new(
                uniform_2d(),
                Params::new(),
                &unit_square(),
                6,
                config,
            )
            .expect("valid field");
            field.compute_all();
            assert!(
                field.occupancy().all_visited(),
                "{integrator:?} must cover the grid"
            );
        }
    }

    #[test]
    fn log_scale_with_invalid_bounds_fails_construction() {
        let err = StreamlineField::new(
            uniform_2d(),
            Params::new(),
            &[
                AxisSpec {
                    interval: [-1.0, 1.0],
                    scale: AxisScale::Log,
                },
                AxisSpec::linear([0.0, 1.0]),
            ],
            8,
            StreamlineConfig::default(),
        )
        .err()
        .expect("log of a negative bound must fail before gridding");
        assert!(matches!(err, ConfigError::InvalidScale(_)));
    }

    #[test]
    fn dimension_mismatch_fails_construction() {
        let adapter = Arc::new(FieldAdapter::new_3d(|_x, _y, _z, _p| (0.0, 0.0, 0.0)));
        let err = StreamlineField::new(
            adapter,
            Params::new(),
            &unit_square(),
            8,
            StreamlineConfig::default(),
        )
        .err()
        .expect("3d field over a 2d grid must fail");
        assert!(matches!(err, ConfigError::DimensionMismatch { .. }));
    }

    #[test]
    fn one_dimensional_grid_is_rejected() {
        let adapter = Arc::new(FieldAdapter::new_1d(|x, _p| -x));
        let err = StreamlineField::new(
            adapter,
            Params::new(),
            &[AxisSpec::linear([0.0, 1.0])],
            8,
            StreamlineConfig::default(),
        )
        .err()
        .expect("1d streamline grid is unsupported");
        assert!(matches!(err, ConfigError::InvalidGrid(_)));
    }

    #[test]
    fn seed_sits_between_the_halves() {
        let mut field = StreamlineField::new(
            uniform_2d(),
            Params::new(),
            &unit_square(),
            8,
            StreamlineConfig::default(),
        )
        .expect("valid field");
        field.compute_all();
        for streamline in field.streamlines() {
            assert!(streamline.seed_index < streamline.len());
            assert_eq!(streamline.speeds.len(), streamline.len());
        }
    }
}
