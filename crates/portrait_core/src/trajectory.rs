//! Fixed-step 4th-order Runge-Kutta trajectories.

use std::sync::Arc;

use crate::error::ConfigError;
use crate::field::{FieldAdapter, Params};
use crate::generator::StateGenerator;
use crate::series::StateSeries;

/// Integrates a continuous vector field with the classical RK4 scheme,
/// recording paired position/velocity samples. No adaptive step control:
/// accuracy is governed by the caller's `dt` and save frequency.
pub struct Rk4Trajectory {
    adapter: Arc<FieldAdapter>,
    params: Params,
    dt: f64,
    position: Vec<f64>,
    velocity: Vec<f64>,
    initial: Vec<f64>,
    positions: StateSeries,
    velocities: StateSeries,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk4Trajectory {
    pub fn new(
        adapter: Arc<FieldAdapter>,
        params: Params,
        initial: &[f64],
        dt: f64,
        capacity: usize,
    ) -> Result<Self, ConfigError> {
        adapter.check_state(initial)?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConfigError::InvalidStep(dt));
        }
        let dim = adapter.dimension();
        Ok(Self {
            adapter,
            params,
            dt,
            position: initial.to_vec(),
            velocity: vec![0.0; dim],
            initial: initial.to_vec(),
            positions: StateSeries::new(dim, capacity),
            velocities: StateSeries::new(dim, capacity),
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        })
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    /// Weighted stage combination of the most recent step.
    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    pub fn positions(&self) -> &StateSeries {
        &self.positions
    }

    pub fn velocities(&self) -> &StateSeries {
        &self.velocities
    }

    pub fn reset(&mut self) {
        self.position.copy_from_slice(&self.initial);
        self.velocity.fill(0.0);
        self.positions.truncate(0);
        self.velocities.truncate(0);
    }
}

impl StateGenerator for Rk4Trajectory {
    fn dimension(&self) -> usize {
        self.position.len()
    }

    fn advance_one_step(&mut self) {
        let dt = self.dt;
        let dim = self.position.len();

        self.adapter.eval(&self.position, &self.params, &mut self.k1);

        for i in 0..dim {
            self.tmp[i] = self.position[i] + 0.5 * dt * self.k1[i];
        }
        self.adapter.eval(&self.tmp, &self.params, &mut self.k2);

        for i in 0..dim {
            self.tmp[i] = self.position[i] + 0.5 * dt * self.k2[i];
        }
        self.adapter.eval(&self.tmp, &self.params, &mut self.k3);

        for i in 0..dim {
            self.tmp[i] = self.position[i] + dt * self.k3[i];
        }
        self.adapter.eval(&self.tmp, &self.params, &mut self.k4);

        for i in 0..dim {
            self.velocity[i] =
                (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]) / 6.0;
            self.position[i] += dt * self.velocity[i];
        }
    }

    fn save(&mut self, index: usize) {
        self.positions.set(index, &self.position);
        self.velocities.set(index, &self.velocity);
    }
}
