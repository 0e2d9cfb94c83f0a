//! Discrete map iteration: `x ← f(x)`.

use std::sync::Arc;

use crate::error::ConfigError;
use crate::field::{FieldAdapter, Params};
use crate::generator::StateGenerator;
use crate::series::StateSeries;

/// Iterates a discrete map, recording positions. The adapter's output
/// is interpreted as the next state, with no derivative scaling.
pub struct MapIterator {
    adapter: Arc<FieldAdapter>,
    params: Params,
    position: Vec<f64>,
    scratch: Vec<f64>,
    initial: Vec<f64>,
    positions: StateSeries,
}

impl MapIterator {
    pub fn new(
        adapter: Arc<FieldAdapter>,
        params: Params,
        initial: &[f64],
        capacity: usize,
    ) -> Result<Self, ConfigError> {
        adapter.check_state(initial)?;
        let dim = adapter.dimension();
        Ok(Self {
            adapter,
            params,
            position: initial.to_vec(),
            scratch: vec![0.0; dim],
            initial: initial.to_vec(),
            positions: StateSeries::new(dim, capacity),
        })
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn positions(&self) -> &StateSeries {
        &self.positions
    }

    pub fn into_positions(self) -> StateSeries {
        self.positions
    }

    /// Resets the live state to the initial condition and forgets all
    /// recorded samples.
    pub fn reset(&mut self) {
        self.position.copy_from_slice(&self.initial);
        self.positions.truncate(0);
    }

    /// Keeps only the first `len` recorded samples (cycle cut-off).
    pub fn truncate(&mut self, len: usize) {
        self.positions.truncate(len);
    }
}

impl StateGenerator for MapIterator {
    fn dimension(&self) -> usize {
        self.position.len()
    }

    fn advance_one_step(&mut self) {
        self.adapter
            .eval(&self.position, &self.params, &mut self.scratch);
        std::mem::swap(&mut self.position, &mut self.scratch);
    }

    fn save(&mut self, index: usize) {
        self.positions.set(index, &self.position);
    }

    /// Compares the live state against the stored samples of the last
    /// window, excluding the one just recorded (which is the live state
    /// itself).
    fn check_limit_cycle(&self, upto: usize, window: usize, tolerance: f64) -> bool {
        let start = (upto + 1).saturating_sub(window);
        (start..upto).any(|i| self.positions.distance_to(i, &self.position) < tolerance)
    }
}
