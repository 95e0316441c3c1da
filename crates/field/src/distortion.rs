//! Local projection distortion: how a geographic velocity turns into a
//! screen-space velocity at one pixel.

use foundation::math::{GeoPoint, Mat2, Projection, RAD, Vec2};

/// Finite difference step, in degrees.
pub const DISTORTION_STEP: f64 = 0.000036;

/// Jacobian of `projection` at `geo`, whose projected position is `(x, y)`.
///
/// The matrix maps `(u, v)` in east/north units to `(x, y)` pixels; the
/// longitude column is divided by `cos(lat)` to account for meridians
/// converging towards the poles. Probes step towards the equator and the
/// prime meridian so they never leave the valid range. `None` when a probe
/// does not project.
pub fn distortion(projection: &dyn Projection, geo: GeoPoint, x: f64, y: f64) -> Option<Mat2> {
    let h_lon = if geo.lon < 0.0 { DISTORTION_STEP } else { -DISTORTION_STEP };
    let h_lat = if geo.lat < 0.0 { DISTORTION_STEP } else { -DISTORTION_STEP };

    let p_lon = projection.forward(GeoPoint::new(geo.lon + h_lon, geo.lat))?;
    let p_lat = projection.forward(GeoPoint::new(geo.lon, geo.lat + h_lat))?;

    let k = (geo.lat * RAD).cos();
    Some(Mat2::new(
        (p_lon[0] - x) / h_lon / k,
        (p_lat[0] - x) / h_lat,
        (p_lon[1] - y) / h_lon / k,
        (p_lat[1] - y) / h_lat,
    ))
}

/// Scales `[u, v, m]` by `scale` and distorts it into pixel space. The
/// magnitude is carried through untouched. `None` when the distortion
/// cannot be computed or is not finite.
pub fn distort(
    projection: &dyn Projection,
    geo: GeoPoint,
    x: f64,
    y: f64,
    scale: f64,
    wind: [f64; 3],
) -> Option<[f64; 3]> {
    let d = distortion(projection, geo, x, y)?;
    let [u, v, m] = wind;
    let p = d.apply(Vec2::new(u * scale, v * scale));
    (p.x.is_finite() && p.y.is_finite()).then_some([p.x, p.y, m])
}
