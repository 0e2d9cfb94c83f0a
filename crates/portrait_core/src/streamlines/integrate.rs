//! Local single-step integrators used while growing a streamline.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Integrator used for each streamline step. Selected at construction
/// from explicit configuration; unknown names abort construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrator {
    /// Explicit Euler: `x += dt * f(x)`.
    Euler,
    /// Kutta's 3rd-order scheme, weights `(k1 + 4*k2 + k3) / 6`.
    RungeKutta3,
    /// 4-stage quadrature (classical RK4 step).
    MultiStage,
}

impl Integrator {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "euler" => Ok(Integrator::Euler),
            "rungekutta3" => Ok(Integrator::RungeKutta3),
            "multistage" => Ok(Integrator::MultiStage),
            other => Err(ConfigError::UnsupportedIntegrator(other.to_string())),
        }
    }
}

/// Stage buffers for the local integrators, allocated once per field.
pub(crate) struct StepStages {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl StepStages {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// Advances `x` by one signed step of size `dt` (negative `dt`
    /// integrates backward in time).
    pub fn step(
        &mut self,
        integrator: Integrator,
        speed: impl Fn(&[f64], &mut [f64]),
        x: &mut [f64],
        dt: f64,
    ) {
        let dim = x.len();
        match integrator {
            Integrator::Euler => {
                speed(x, &mut self.k1);
                for i in 0..dim {
                    x[i] += dt * self.k1[i];
                }
            }
            Integrator::RungeKutta3 => {
                speed(x, &mut self.k1);
                for i in 0..dim {
                    self.tmp[i] = x[i] + 0.5 * dt * self.k1[i];
                }
                speed(&self.tmp, &mut self.k2);
                for i in 0..dim {
                    self.tmp[i] = x[i] - dt * self.k1[i] + 2.0 * dt * self.k2[i];
                }
                speed(&self.tmp, &mut self.k3);
                for i in 0..dim {
                    x[i] += dt * (self.k1[i] + 4.0 * self.k2[i] + self.k3[i]) / 6.0;
                }
            }
            Integrator::MultiStage => {
                speed(x, &mut self.k1);
                for i in 0..dim {
                    self.tmp[i] = x[i] + 0.5 * dt * self.k1[i];
                }
                speed(&self.tmp, &mut self.k2);
                for i in 0..dim {
                    self.tmp[i] = x[i] + 0.5 * dt * self.k2[i];
                }
                speed(&self.tmp, &mut self.k3);
                for i in 0..dim {
                    self.tmp[i] = x[i] + dt * self.k3[i];
                }
                speed(&self.tmp, &mut self.k4);
                for i in 0..dim {
                    x[i] += dt
                        * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i])
                        / 6.0;
                }
            }
        }
    }
}
