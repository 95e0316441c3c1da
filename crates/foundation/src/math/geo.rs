//! Scalar helpers shared by the grid, projection and color code.

/// Degrees to radians factor.
pub const RAD: f64 = std::f64::consts::PI / 180.0;

/// Longitude/latitude pair in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

/// Floored modulo: the result has the sign of `n`, and never equals `n`.
pub fn floor_mod(a: f64, n: f64) -> f64 {
    let f = a - n * (a / n).floor();
    if f == n { 0.0 } else { f }
}

pub fn clamp(x: f64, low: f64, high: f64) -> f64 {
    x.min(high).max(low)
}

/// Position of `x` within `[low, high]`, clamped to `[0, 1]`.
pub fn proportion(x: f64, low: f64, high: f64) -> f64 {
    if high == low {
        return 0.0;
    }
    (clamp(x, low, high) - low) / (high - low)
}

/// Inverse of [`proportion`].
pub fn spread(p: f64, low: f64, high: f64) -> f64 {
    p * (high - low) + low
}

pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}
