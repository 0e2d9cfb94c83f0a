//! The stepping contract shared by discrete maps and continuous
//! integrators, and the `compute_all` driver built on top of it.

use serde::{Deserialize, Serialize};

/// Options for one `compute_all` run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunOptions {
    /// Number of samples recorded.
    pub max_values: usize,
    /// Raw advances per recorded sample (decimation; minimum 1).
    pub save_freq: usize,
    /// Raw advances discarded before recording begins.
    pub thermalization: usize,
    /// If set, check for a limit cycle / fixed point after every window
    /// of this many recorded samples.
    pub limit_cycle_window: Option<usize>,
    /// Two states closer than this (Euclidean) are considered equal.
    pub cycle_tolerance: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_values: 1000,
            save_freq: 1,
            thermalization: 0,
            limit_cycle_window: None,
            cycle_tolerance: 0.01,
        }
    }
}

/// How a run ended. Cycle detection is an ordinary outcome, not an
/// error; the payload is the index of the last recorded sample, at
/// which callers truncate their series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed(usize),
    CycleDetected(usize),
}

impl RunOutcome {
    /// Number of valid samples after the run.
    pub fn samples(&self) -> usize {
        match *self {
            RunOutcome::Completed(n) => n,
            RunOutcome::CycleDetected(i) => i + 1,
        }
    }
}

/// A generator owns its current state and advances it one raw step at a
/// time; `save` commits the state into the generator's own storage.
///
/// Instances are single-threaded: parallel callers use disjoint
/// instances, never a shared one. There is no cancellation primitive;
/// callers wanting early abort drive [`StateGenerator::next`] in their
/// own loop instead of calling `compute_all`.
pub trait StateGenerator {
    fn dimension(&self) -> usize;

    /// Mutates the current state by one raw step.
    fn advance_one_step(&mut self);

    /// Commits the current state as sample `index`.
    fn save(&mut self, index: usize);

    /// Checks the current state against samples recorded in
    /// `(upto - window, upto]`, excluding the live one. Returns `true`
    /// on a match within `tolerance`. Default: no detection.
    fn check_limit_cycle(&self, _upto: usize, _window: usize, _tolerance: f64) -> bool {
        false
    }

    /// Advances `save_freq` raw steps and records one sample.
    fn next(&mut self, index: usize, save_freq: usize) {
        for _ in 0..save_freq.max(1) {
            self.advance_one_step();
        }
        self.save(index);
    }

    /// Thermalizes, then records `opts.max_values` samples, checking for
    /// cycles after every configured window.
    fn compute_all(&mut self, opts: &RunOptions) -> RunOutcome {
        for _ in 0..opts.thermalization {
            self.advance_one_step();
        }
        for i in 0..opts.max_values {
            self.next(i, opts.save_freq);
            if let Some(window) = opts.limit_cycle_window {
                let window = window.max(1);
                if (i + 1) % window == 0
                    && self.check_limit_cycle(i, window, opts.cycle_tolerance)
                {
                    return RunOutcome::CycleDetected(i);
                }
            }
        }
        RunOutcome::Completed(opts.max_values)
    }
}
