//! The `portrait_core` crate is the computational engine behind phase
//! portrait rendering: it turns a vector field (or discrete map) plus a
//! domain description into dense arrays of positions and velocities.
//!
//! Key components:
//! - **Field adapters**: explicit-arity field closures, with optional
//!   polar/spherical-to-Cartesian derivative transforms.
//! - **Generators**: `MapIterator` (discrete iteration with limit-cycle
//!   detection) and `Rk4Trajectory` (fixed-step RK4), both driven
//!   through the `StateGenerator` contract.
//! - **Streamlines**: occupancy-grid seeding that covers a 2D/3D domain
//!   with non-overlapping flow curves.
//! - **Sweeps**: per-parameter map runs for bifurcation diagrams,
//!   sharded over a worker pool.
//! - **Intervals**: normalization of range shorthands into canonical
//!   per-axis `[min, max]` intervals.
//!
//! Rendering, figure management and interactive configuration live in
//! consumer crates; this crate only computes.

pub mod error;
pub mod field;
pub mod generator;
pub mod interval;
pub mod map;
pub mod series;
pub mod streamlines;
pub mod sweep;
pub mod trajectory;

pub use error::ConfigError;
pub use field::{Coordinates, FieldAdapter, Params};
pub use generator::{RunOptions, RunOutcome, StateGenerator};
pub use interval::{construct_interval, Interval, RangeSpec};
pub use map::MapIterator;
pub use series::StateSeries;
pub use streamlines::{AxisSpec, Streamline, StreamlineConfig, StreamlineField};
pub use sweep::{ParameterSweep, SweepSeries};
pub use trajectory::Rk4Trajectory;
