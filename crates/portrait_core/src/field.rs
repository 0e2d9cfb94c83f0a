//! Vector field adapters.
//!
//! A field is supplied as a closure of explicit arity (one coordinate
//! argument per dimension, plus the parameter map) and wrapped in a
//! [`FieldAdapter`]. The adapter owns the closed set of supported
//! arities and, when asked, re-expresses a polar or spherical field as a
//! Cartesian derivative via the corresponding Jacobian. Interpretation
//! of the output is up to the consumer: "next state" for maps,
//! "derivative" for continuous integration.

use indexmap::IndexMap;
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named parameters of a field, read on every evaluation.
///
/// Insertion-ordered so that runs iterate parameters deterministically.
/// Independent runs clone their own copy; nothing in this crate keeps a
/// shared mutable parameter map.
pub type Params = IndexMap<String, f64>;

/// Coordinate system the caller's field is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinates {
    Cartesian,
    /// 2D: field takes `(R, Theta)` and returns `(dR, dTheta)`.
    Polar,
    /// 3D: field takes `(R, Theta, Phi)` with `Theta` the azimuth and
    /// `Phi` the inclination from the +z axis.
    Spherical,
}

type Field1 = Box<dyn Fn(f64, &Params) -> f64 + Send + Sync>;
type Field2 = Box<dyn Fn(f64, f64, &Params) -> (f64, f64) + Send + Sync>;
type Field3 = Box<dyn Fn(f64, f64, f64, &Params) -> (f64, f64, f64) + Send + Sync>;

/// The closed set of supported field arities. The variant *is* the
/// declared dimension; there is no runtime signature inspection.
enum FieldFn {
    D1(Field1),
    D2(Field2),
    D3(Field3),
}

impl FieldFn {
    fn dimension(&self) -> usize {
        match self {
            FieldFn::D1(_) => 1,
            FieldFn::D2(_) => 2,
            FieldFn::D3(_) => 3,
        }
    }
}

/// Wraps a caller-supplied field, optionally converting a polar or
/// spherical derivative into Cartesian form.
pub struct FieldAdapter {
    field: FieldFn,
    coords: Coordinates,
}

impl FieldAdapter {
    pub fn new_1d<F>(f: F) -> Self
    where
        F: Fn(f64, &Params) -> f64 + Send + Sync + 'static,
    {
        Self {
            field: FieldFn::D1(Box::new(f)),
            coords: Coordinates::Cartesian,
        }
    }

    pub fn new_2d<F>(f: F) -> Self
    where
        F: Fn(f64, f64, &Params) -> (f64, f64) + Send + Sync + 'static,
    {
        Self {
            field: FieldFn::D2(Box::new(f)),
            coords: Coordinates::Cartesian,
        }
    }

    pub fn new_3d<F>(f: F) -> Self
    where
        F: Fn(f64, f64, f64, &Params) -> (f64, f64, f64) + Send + Sync + 'static,
    {
        Self {
            field: FieldFn::D3(Box::new(f)),
            coords: Coordinates::Cartesian,
        }
    }

    /// Declares the coordinate system the field is expressed in.
    /// Polar fields must be 2-dimensional, spherical fields
    /// 3-dimensional.
    pub fn with_coordinates(mut self, coords: Coordinates) -> Result<Self, ConfigError> {
        let required = match coords {
            Coordinates::Cartesian => {
                self.coords = coords;
                return Ok(self);
            }
            Coordinates::Polar => 2,
            Coordinates::Spherical => 3,
        };
        if self.field.dimension() != required {
            return Err(ConfigError::CoordinateMismatch {
                coords: match coords {
                    Coordinates::Polar => "polar",
                    _ => "spherical",
                },
                required,
                got: self.field.dimension(),
            });
        }
        self.coords = coords;
        Ok(self)
    }

    pub fn dimension(&self) -> usize {
        self.field.dimension()
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coords
    }

    /// Checks that a caller-supplied state matches the declared arity.
    pub fn check_state(&self, state: &[f64]) -> Result<(), ConfigError> {
        if state.len() != self.dimension() {
            return Err(ConfigError::DimensionMismatch {
                expected: self.dimension(),
                got: state.len(),
            });
        }
        Ok(())
    }

    /// Evaluates the field at Cartesian `x`, writing a Cartesian result
    /// into `out`. Both slices must have length `dimension()`.
    ///
    /// For polar/spherical fields the input point is converted to the
    /// field's coordinate system, the field evaluated there, and the
    /// returned derivative mapped back through the Jacobian of the
    /// coordinate change. At the origin the spherical angles are
    /// undefined; the resulting NaN is left to propagate and consumers
    /// treat it as a locally degenerate evaluation.
    pub fn eval(&self, x: &[f64], params: &Params, out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dimension());
        debug_assert_eq!(out.len(), self.dimension());
        match (&self.field, self.coords) {
            (FieldFn::D1(f), _) => out[0] = f(x[0], params),
            (FieldFn::D2(f), Coordinates::Cartesian) => {
                let (u, v) = f(x[0], x[1], params);
                out[0] = u;
                out[1] = v;
            }
            (FieldFn::D2(f), _) => {
                let (u, v) = polar_to_cartesian(f, x[0], x[1], params);
                out[0] = u;
                out[1] = v;
            }
            (FieldFn::D3(f), Coordinates::Cartesian) => {
                let (u, v, w) = f(x[0], x[1], x[2], params);
                out[0] = u;
                out[1] = v;
                out[2] = w;
            }
            (FieldFn::D3(f), _) => {
                let (u, v, w) = spherical_to_cartesian(f, x[0], x[1], x[2], params);
                out[0] = u;
                out[1] = v;
                out[2] = w;
            }
        }
    }
}

/// Chain rule for `x = R cos(T)`, `y = R sin(T)`:
///
/// ```text
/// [dx]   [cos T   -R sin T] [dR]
/// [dy] = [sin T    R cos T] [dT]
/// ```
fn polar_to_cartesian(f: &Field2, x: f64, y: f64, params: &Params) -> (f64, f64) {
    let r = x.hypot(y);
    let theta = y.atan2(x);
    let (dr, dtheta) = f(r, theta, params);
    let jac = Matrix2::new(
        theta.cos(),
        -r * theta.sin(),
        theta.sin(),
        r * theta.cos(),
    );
    let d = jac * Vector2::new(dr, dtheta);
    (d.x, d.y)
}

/// Chain rule for `x = R sin(P) cos(T)`, `y = R sin(P) sin(T)`,
/// `z = R cos(P)` (T azimuth, P inclination):
///
/// ```text
/// [dx]   [sin P cos T   -R sin P sin T    R cos P cos T] [dR]
/// [dy] = [sin P sin T    R sin P cos T    R cos P sin T] [dT]
/// [dz]   [cos P          0               -R sin P      ] [dP]
/// ```
fn spherical_to_cartesian(
    f: &Field3,
    x: f64,
    y: f64,
    z: f64,
    params: &Params,
) -> (f64, f64, f64) {
    let r = (x * x + y * y + z * z).sqrt();
    let theta = y.atan2(x);
    let phi = (z / r).acos();
    let (dr, dtheta, dphi) = f(r, theta, phi, params);
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let jac = Matrix3::new(
        sp * ct, -r * sp * st, r * cp * ct, //
        sp * st, r * sp * ct, r * cp * st, //
        cp, 0.0, -r * sp,
    );
    let d = jac * Vector3::new(dr, dtheta, dphi);
    (d.x, d.y, d.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> Params {
        Params::new()
    }

    #[test]
    fn cartesian_passes_through() {
        let adapter = FieldAdapter::new_2d(|x, y, _p| (y, -x));
        let mut out = [0.0; 2];
        adapter.eval(&[1.0, 2.0], &no_params(), &mut out);
        assert_eq!(out, [2.0, -1.0]);
    }

    #[test]
    fn params_are_read_on_each_evaluation() {
        let adapter = FieldAdapter::new_1d(|x, p| p["r"] * x);
        let mut params = no_params();
        params.insert("r".into(), 3.0);
        let mut out = [0.0; 1];
        adapter.eval(&[2.0], &params, &mut out);
        assert_eq!(out, [6.0]);
        params.insert("r".into(), -1.0);
        adapter.eval(&[2.0], &params, &mut out);
        assert_eq!(out, [-2.0]);
    }

    #[test]
    fn polar_rotation_field_maps_to_tangent() {
        // dR = 0, dTheta = 1 is rigid rotation: (dx, dy) = (-y, x).
        let adapter = FieldAdapter::new_2d(|_r, _t, _p| (0.0, 1.0))
            .with_coordinates(Coordinates::Polar)
            .expect("2d field accepts polar");
        let mut out = [0.0; 2];
        adapter.eval(&[3.0, 4.0], &no_params(), &mut out);
        assert!((out[0] + 4.0).abs() < 1e-12, "dx = {}", out[0]);
        assert!((out[1] - 3.0).abs() < 1e-12, "dy = {}", out[1]);
    }

    #[test]
    fn polar_radial_field_points_outward() {
        let adapter = FieldAdapter::new_2d(|_r, _t, _p| (2.0, 0.0))
            .with_coordinates(Coordinates::Polar)
            .expect("2d field accepts polar");
        let mut out = [0.0; 2];
        adapter.eval(&[1.0, 1.0], &no_params(), &mut out);
        let inv_sqrt2 = 1.0 / 2f64.sqrt();
        assert!((out[0] - 2.0 * inv_sqrt2).abs() < 1e-12);
        assert!((out[1] - 2.0 * inv_sqrt2).abs() < 1e-12);
    }

    #[test]
    fn spherical_radial_field_points_outward() {
        let adapter = FieldAdapter::new_3d(|_r, _t, _p, _params| (1.0, 0.0, 0.0))
            .with_coordinates(Coordinates::Spherical)
            .expect("3d field accepts spherical");
        let x = [1.0, 2.0, 2.0]; // |x| = 3
        let mut out = [0.0; 3];
        adapter.eval(&x, &no_params(), &mut out);
        for i in 0..3 {
            assert!(
                (out[i] - x[i] / 3.0).abs() < 1e-12,
                "axis {i}: {} vs {}",
                out[i],
                x[i] / 3.0
            );
        }
    }

    #[test]
    fn spherical_azimuthal_field_rotates_about_z() {
        // dTheta = 1 alone: (dx, dy, dz) = (-y, x, 0).
        let adapter = FieldAdapter::new_3d(|_r, _t, _p, _params| (0.0, 1.0, 0.0))
            .with_coordinates(Coordinates::Spherical)
            .expect("3d field accepts spherical");
        let mut out = [0.0; 3];
        adapter.eval(&[1.0, 2.0, 0.5], &no_params(), &mut out);
        assert!((out[0] + 2.0).abs() < 1e-12, "dx = {}", out[0]);
        assert!((out[1] - 1.0).abs() < 1e-12, "dy = {}", out[1]);
        assert!(out[2].abs() < 1e-12, "dz = {}", out[2]);
    }

    #[test]
    fn spherical_inclination_field_matches_finite_difference() {
        // dPhi = 1 alone, checked against a finite difference of the
        // embedding at a generic point.
        let adapter = FieldAdapter::new_3d(|_r, _t, _p, _params| (0.0, 0.0, 1.0))
            .with_coordinates(Coordinates::Spherical)
            .expect("3d field accepts spherical");
        let (r, theta, phi) = (2.0f64, 0.7f64, 1.1f64);
        let embed = |phi: f64| {
            [
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            ]
        };
        let x = embed(phi);
        let h = 1e-6;
        let xp = embed(phi + h);
        let mut out = [0.0; 3];
        adapter.eval(&x, &no_params(), &mut out);
        for i in 0..3 {
            let fd = (xp[i] - x[i]) / h;
            assert!((out[i] - fd).abs() < 1e-5, "axis {i}: {} vs {fd}", out[i]);
        }
    }

    #[test]
    fn polar_requires_two_dimensions() {
        let err = FieldAdapter::new_3d(|_r, _t, _p, _params| (0.0, 0.0, 0.0))
            .with_coordinates(Coordinates::Polar)
            .err()
            .expect("3d field must reject polar");
        assert!(matches!(err, ConfigError::CoordinateMismatch { .. }));
    }

    #[test]
    fn state_arity_is_checked() {
        let adapter = FieldAdapter::new_2d(|x, y, _p| (x, y));
        let err = adapter
            .check_state(&[1.0])
            .expect_err("1 coordinate against a 2d field must fail");
        assert_eq!(
            err,
            ConfigError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }
}
