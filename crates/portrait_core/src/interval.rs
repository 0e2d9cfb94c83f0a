//! Normalization of heterogeneous range shorthands into canonical
//! per-axis `[min, max]` intervals.
//!
//! Configuration layers hand ranges over in several shapes: a bare
//! scalar, a `[a, b]` pair, or a nested per-axis list mixing both. Every
//! consumer in this crate works with the canonical form produced here.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A range shorthand, prior to normalization.
///
/// The untagged representation lets configuration layers write `5`,
/// `[2, 8]` or `[[0, 1], 3]` directly in JSON; nesting deeper than one
/// per-axis level is rejected during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeSpec {
    Scalar(f64),
    Pair(f64, f64),
    PerAxis(Vec<RangeSpec>),
}

/// Canonical interval, `min <= max` always.
pub type Interval = [f64; 2];

/// Builds `dim` canonical intervals from a range shorthand.
///
/// * dim 1: `Scalar(v)` means the symmetric range `[-v, v]` (`v == 0` is
///   invalid); `Pair(a, b)` is sorted into `[a, b]`.
/// * dim 2: `Scalar(v)` means `[0, v]` on both axes; `Pair(a, b)` is the
///   same sorted interval on both axes; `PerAxis` entries resolve by the
///   dim-1 rules.
/// * dim 3: `Scalar(v)` means `[0, v]` on all axes; list entries resolve
///   by the dim-1 rules and the last axis is repeated until three exist.
///
/// Feeding an already-canonical per-axis list back through returns it
/// unchanged (modulo sorting of each pair).
pub fn construct_interval(spec: &RangeSpec, dim: usize) -> Result<Vec<Interval>, ConfigError> {
    let mut axes = match (dim, spec) {
        (1, _) => vec![interval_1d(spec)?],
        (2, RangeSpec::Scalar(v)) => {
            let iv = zero_anchored(*v)?;
            vec![iv, iv]
        }
        (2, RangeSpec::Pair(a, b)) => {
            let iv = sorted(*a, *b)?;
            vec![iv, iv]
        }
        (2, RangeSpec::PerAxis(entries)) => per_axis(entries)?,
        (3, RangeSpec::Scalar(v)) => {
            let iv = zero_anchored_unchecked(*v)?;
            vec![iv, iv, iv]
        }
        (3, RangeSpec::Pair(a, b)) => {
            // A bare pair in 3D is two symmetric per-axis scalars, padded
            // below (the historical shorthand `[x, y]`).
            vec![symmetric(*a)?, symmetric(*b)?]
        }
        (3, RangeSpec::PerAxis(entries)) => per_axis(entries)?,
        (d, _) => {
            return Err(ConfigError::InvalidRange(format!(
                "unsupported dimension {d}, expected 1 to 3"
            )))
        }
    };

    if axes.is_empty() {
        return Err(ConfigError::InvalidRange("empty per-axis range".into()));
    }
    if axes.len() > dim {
        return Err(ConfigError::InvalidRange(format!(
            "{} axes given for a {dim}-dimensional range",
            axes.len()
        )));
    }
    while axes.len() < dim {
        let last = *axes.last().unwrap();
        axes.push(last);
    }
    Ok(axes)
}

fn interval_1d(spec: &RangeSpec) -> Result<Interval, ConfigError> {
    match spec {
        RangeSpec::Scalar(v) => symmetric(*v),
        RangeSpec::Pair(a, b) => sorted(*a, *b),
        RangeSpec::PerAxis(entries) if entries.len() == 1 => interval_1d(&entries[0]),
        RangeSpec::PerAxis(_) => Err(ConfigError::InvalidRange(
            "nested list is not a valid 1D range".into(),
        )),
    }
}

fn per_axis(entries: &[RangeSpec]) -> Result<Vec<Interval>, ConfigError> {
    entries.iter().map(interval_1d).collect()
}

fn symmetric(v: f64) -> Result<Interval, ConfigError> {
    if v == 0.0 {
        return Err(ConfigError::InvalidRange(
            "0 is not a valid symmetric range".into(),
        ));
    }
    sorted(-v, v)
}

fn zero_anchored(v: f64) -> Result<Interval, ConfigError> {
    if v == 0.0 {
        return Err(ConfigError::InvalidRange(
            "0 is not a valid scalar range".into(),
        ));
    }
    zero_anchored_unchecked(v)
}

fn zero_anchored_unchecked(v: f64) -> Result<Interval, ConfigError> {
    sorted(0.0, v)
}

fn sorted(a: f64, b: f64) -> Result<Interval, ConfigError> {
    if !a.is_finite() || !b.is_finite() {
        return Err(ConfigError::InvalidRange(format!(
            "non-finite endpoint in [{a}, {b}]"
        )));
    }
    Ok(if a <= b { [a, b] } else { [b, a] })
}
