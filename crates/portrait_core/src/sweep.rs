//! Bifurcation-style parameter sweeps over a discrete map.
//!
//! One [`MapIterator`] is run per sample of the scanned parameter, each
//! from its own copy of the parameter map. Samples are independent, so
//! they are sharded round-robin across a fixed pool of worker threads;
//! nothing is shared beyond the read-only field adapter, and results
//! are keyed by parameter value rather than completion order.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::field::{FieldAdapter, Params};
use crate::generator::{RunOptions, RunOutcome, StateGenerator};
use crate::map::MapIterator;
use crate::series::StateSeries;

const DEFAULT_WORKERS: usize = 8;

/// The recorded series for one value of the scanned parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSeries {
    pub value: f64,
    pub positions: StateSeries,
    pub outcome: RunOutcome,
}

/// Repeats a map run over a dense range of one parameter.
pub struct ParameterSweep {
    adapter: Arc<FieldAdapter>,
    base_params: Params,
    initial: Vec<f64>,
    options: RunOptions,
    param: String,
    interval: [f64; 2],
    step: f64,
    workers: usize,
}

impl ParameterSweep {
    pub fn new(
        adapter: Arc<FieldAdapter>,
        base_params: Params,
        initial: &[f64],
        options: RunOptions,
        param: &str,
        interval: [f64; 2],
        step: f64,
    ) -> Result<Self, ConfigError> {
        adapter.check_state(initial)?;
        if param.is_empty() {
            return Err(ConfigError::InvalidSweep(
                "scanned parameter name is empty".into(),
            ));
        }
        let [min, max] = interval;
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConfigError::InvalidSweep(format!(
                "interval [{min}, {max}] is not a proper range"
            )));
        }
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigError::InvalidSweep(format!(
                "step must be positive, got {step}"
            )));
        }
        Ok(Self {
            adapter,
            base_params,
            initial: initial.to_vec(),
            options,
            param: param.to_string(),
            interval,
            step,
            workers: DEFAULT_WORKERS,
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// The scanned values, `min + i * step` up to and including `max`.
    pub fn values(&self) -> Vec<f64> {
        let [min, max] = self.interval;
        let count = ((max - min) / self.step).floor() as usize + 1;
        (0..count).map(|i| min + i as f64 * self.step).collect()
    }

    /// Runs every sample, sharded round-robin over the worker pool, and
    /// reassembles the results in scan order.
    pub fn run(&self) -> Vec<SweepSeries> {
        let values = self.values();
        let workers = self.workers.min(values.len()).max(1);
        let (tx, rx) = crossbeam_channel::unbounded::<(usize, SweepSeries)>();

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let values = &values;
                scope.spawn(move || {
                    for (index, &value) in values
                        .iter()
                        .enumerate()
                        .skip(worker)
                        .step_by(workers)
                    {
                        tx.send((index, self.run_one(value)))
                            .expect("collector outlives the workers");
                    }
                });
            }
            drop(tx);

            let mut results: Vec<Option<SweepSeries>> = (0..values.len()).map(|_| None).collect();
            for (index, series) in rx {
                results[index] = Some(series);
            }
            results
                .into_iter()
                .map(|slot| slot.expect("every sample index is produced exactly once"))
                .collect()
        })
    }

    /// One sample: an independent parameter copy with the scanned entry
    /// overwritten, its own map iterator, one full run.
    fn run_one(&self, value: f64) -> SweepSeries {
        let mut params = self.base_params.clone();
        params.insert(self.param.clone(), value);
        let mut map = MapIterator::new(
            Arc::clone(&self.adapter),
            params,
            &self.initial,
            self.options.max_values,
        )
        .expect("template was validated at construction");
        let outcome = map.compute_all(&self.options);
        map.truncate(outcome.samples());
        SweepSeries {
            value,
            positions: map.into_positions(),
            outcome,
        }
    }
}
