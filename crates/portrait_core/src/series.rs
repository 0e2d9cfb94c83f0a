//! Dense `[D, N]` sample storage shared by generators and streamlines.

use serde::{Deserialize, Serialize};

/// A growable sequence of D-dimensional samples.
///
/// Samples are stored contiguously, one column per sample. Writing past
/// the current capacity grows the backing vector by at least doubling,
/// so `set` never fails regardless of index; capacity overflow is
/// recovered, not reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSeries {
    dim: usize,
    len: usize,
    data: Vec<f64>,
}

impl StateSeries {
    pub fn new(dim: usize, capacity: usize) -> Self {
        assert!(dim > 0, "a sample must have at least one coordinate");
        Self {
            dim,
            len: 0,
            data: vec![0.0; dim * capacity],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of samples recorded so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `state` as sample `index`, growing the storage if needed.
    pub fn set(&mut self, index: usize, state: &[f64]) {
        debug_assert_eq!(state.len(), self.dim);
        let needed = (index + 1) * self.dim;
        if needed > self.data.len() {
            let grown = needed.max(self.data.len() * 2).max(self.dim);
            self.data.resize(grown, 0.0);
        }
        self.data[index * self.dim..needed].copy_from_slice(state);
        self.len = self.len.max(index + 1);
    }

    pub fn push(&mut self, state: &[f64]) {
        self.set(self.len, state);
    }

    pub fn sample(&self, index: usize) -> &[f64] {
        assert!(index < self.len, "sample {index} out of {}", self.len);
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    pub fn last(&self) -> Option<&[f64]> {
        self.len.checked_sub(1).map(|i| self.sample(i))
    }

    /// Drops every sample at or past `len` (cycle-detection cut-off).
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.data[..self.len * self.dim].chunks_exact(self.dim)
    }

    /// Values of one axis across all samples, in recording order.
    pub fn axis(&self, axis: usize) -> impl Iterator<Item = f64> + '_ {
        assert!(axis < self.dim, "axis {axis} out of {}", self.dim);
        self.iter().map(move |s| s[axis])
    }

    /// Euclidean distance between sample `index` and `state`.
    pub fn distance_to(&self, index: usize, state: &[f64]) -> f64 {
        self.sample(index)
            .iter()
            .zip(state)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}
