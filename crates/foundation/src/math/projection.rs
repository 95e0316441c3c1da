//! Cartographic projections mapping geographic degrees to screen pixels.
//!
//! Rotation follows the usual `[λ, φ]` convention: `rotate = [-30, -10]`
//! brings the point at 30°E, 10°N to the center of the projection.

use std::f64::consts::{FRAC_PI_2, PI};

use super::geo::{GeoPoint, RAD};
use crate::bounds::Aabb2;

/// Rotation, scale and translation shared by every projection kind.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProjectionParams {
    /// `[λ, φ]` rotation in degrees.
    pub rotate: [f64; 2],
    /// Pixels per radian.
    pub scale: f64,
    /// Screen position of the projection center.
    pub translate: [f64; 2],
}

impl ProjectionParams {
    pub fn new(rotate: [f64; 2], scale: f64, translate: [f64; 2]) -> Self {
        Self {
            rotate,
            scale,
            translate,
        }
    }
}

pub trait Projection: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn params(&self) -> ProjectionParams;

    /// Geographic → screen. Does not clip: points on the far side of an
    /// azimuthal projection still map somewhere on screen.
    fn forward(&self, geo: GeoPoint) -> Option<[f64; 2]>;

    /// Screen → geographic. `None` for pixels the projection does not cover.
    fn invert(&self, p: [f64; 2]) -> Option<GeoPoint>;

    /// Screen-space bounding box of the whole sphere outline.
    fn sphere_bounds(&self) -> Aabb2;

    /// Whether `p` falls inside the projected sphere outline.
    fn in_sphere(&self, p: [f64; 2]) -> bool {
        self.invert(p).is_some()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Rotation {
    d_lambda: f64,
    cos_phi: f64,
    sin_phi: f64,
}

impl Rotation {
    fn new(rotate: [f64; 2]) -> Self {
        let d_phi = rotate[1] * RAD;
        Self {
            d_lambda: rotate[0] * RAD,
            cos_phi: d_phi.cos(),
            sin_phi: d_phi.sin(),
        }
    }

    /// Radians in, radians out.
    fn forward(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let lambda = wrap_pi(lambda + self.d_lambda);
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let k = z * self.cos_phi + x * self.sin_phi;
        (
            y.atan2(x * self.cos_phi - z * self.sin_phi),
            k.clamp(-1.0, 1.0).asin(),
        )
    }

    fn invert(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let lambda = y.atan2(x * self.cos_phi + z * self.sin_phi);
        let phi = (z * self.cos_phi - x * self.sin_phi).clamp(-1.0, 1.0).asin();
        (wrap_pi(lambda - self.d_lambda), phi)
    }
}

fn wrap_pi(lambda: f64) -> f64 {
    if lambda > PI {
        lambda - 2.0 * PI
    } else if lambda < -PI {
        lambda + 2.0 * PI
    } else {
        lambda
    }
}

/// Azimuthal projection of the visible hemisphere, as seen from infinity.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Orthographic {
    params: ProjectionParams,
    rotation: Rotation,
}

impl Orthographic {
    pub fn new(params: ProjectionParams) -> Self {
        Self {
            params,
            rotation: Rotation::new(params.rotate),
        }
    }

    fn to_unit(&self, p: [f64; 2]) -> (f64, f64) {
        let k = self.params.scale;
        (
            (p[0] - self.params.translate[0]) / k,
            (self.params.translate[1] - p[1]) / k,
        )
    }
}

impl Projection for Orthographic {
    fn name(&self) -> &'static str {
        "orthographic"
    }

    fn params(&self) -> ProjectionParams {
        self.params
    }

    fn forward(&self, geo: GeoPoint) -> Option<[f64; 2]> {
        if !geo.is_finite() {
            return None;
        }
        let (lambda, phi) = self.rotation.forward(geo.lon * RAD, geo.lat * RAD);
        let x = phi.cos() * lambda.sin();
        let y = phi.sin();
        let k = self.params.scale;
        Some([
            self.params.translate[0] + x * k,
            self.params.translate[1] - y * k,
        ])
    }

    fn invert(&self, p: [f64; 2]) -> Option<GeoPoint> {
        let (x, y) = self.to_unit(p);
        let rho = (x * x + y * y).sqrt();
        if !rho.is_finite() || rho > 1.0 {
            return None;
        }
        let c = rho.asin();
        let (sin_c, cos_c) = (c.sin(), c.cos());
        let lambda = (x * sin_c).atan2(rho * cos_c);
        let phi = if rho == 0.0 {
            0.0
        } else {
            (y * sin_c / rho).clamp(-1.0, 1.0).asin()
        };
        let (lambda, phi) = self.rotation.invert(lambda, phi);
        Some(GeoPoint::new(lambda / RAD, phi / RAD))
    }

    fn sphere_bounds(&self) -> Aabb2 {
        let [tx, ty] = self.params.translate;
        let k = self.params.scale;
        Aabb2::new([tx - k, ty - k], [tx + k, ty + k])
    }

    fn in_sphere(&self, p: [f64; 2]) -> bool {
        let (x, y) = self.to_unit(p);
        x * x + y * y <= 1.0
    }
}

/// Plate carrée: longitude and latitude map linearly to x and y.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Equirectangular {
    params: ProjectionParams,
    rotation: Rotation,
}

impl Equirectangular {
    pub fn new(params: ProjectionParams) -> Self {
        Self {
            params,
            rotation: Rotation::new(params.rotate),
        }
    }
}

impl Projection for Equirectangular {
    fn name(&self) -> &'static str {
        "equirectangular"
    }

    fn params(&self) -> ProjectionParams {
        self.params
    }

    fn forward(&self, geo: GeoPoint) -> Option<[f64; 2]> {
        if !geo.is_finite() {
            return None;
        }
        let (lambda, phi) = self.rotation.forward(geo.lon * RAD, geo.lat * RAD);
        let k = self.params.scale;
        Some([
            self.params.translate[0] + lambda * k,
            self.params.translate[1] - phi * k,
        ])
    }

    fn invert(&self, p: [f64; 2]) -> Option<GeoPoint> {
        let k = self.params.scale;
        let lambda = (p[0] - self.params.translate[0]) / k;
        let phi = (self.params.translate[1] - p[1]) / k;
        if !(lambda.abs() <= PI && phi.abs() <= FRAC_PI_2) {
            return None;
        }
        let (lambda, phi) = self.rotation.invert(lambda, phi);
        Some(GeoPoint::new(lambda / RAD, phi / RAD))
    }

    fn sphere_bounds(&self) -> Aabb2 {
        let [tx, ty] = self.params.translate;
        let k = self.params.scale;
        Aabb2::new(
            [tx - PI * k, ty - FRAC_PI_2 * k],
            [tx + PI * k, ty + FRAC_PI_2 * k],
        )
    }
}
