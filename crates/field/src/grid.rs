//! Regular longitude/latitude grids with bilinear interpolation.

use foundation::math::floor_mod;
use serde::{Deserialize, Serialize};

/// Grid geometry, as carried by product records.
///
/// `(lo1, la1)` is the first grid point; rows run from north to south in
/// steps of `dy`, columns eastward in steps of `dx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridHeader {
    pub lo1: f64,
    pub la1: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
    #[serde(default)]
    pub ref_time: Option<String>,
    #[serde(default)]
    pub forecast_time: Option<f64>,
}

impl GridHeader {
    pub fn new(lo1: f64, la1: f64, dx: f64, dy: f64, nx: usize, ny: usize) -> Self {
        Self {
            lo1,
            la1,
            dx,
            dy,
            nx,
            ny,
            ref_time: None,
            forecast_time: None,
        }
    }

    /// True when the grid wraps all the way around the globe.
    pub fn is_continuous(&self) -> bool {
        (self.nx as f64 * self.dx).floor() >= 360.0
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A value that can be bilinearly blended from four grid corners.
pub trait Interpolant: Copy {
    type Output;

    /// Stand-in for corners that carry no data.
    const ZERO: Self;

    /// `x` and `y` are the fractional offsets from `g00` towards `g10` and
    /// `g01` respectively.
    fn bilinear(x: f64, y: f64, g00: Self, g10: Self, g01: Self, g11: Self) -> Self::Output;
}

/// Blends with weights `(1-x)(1-y)`, `x(1-y)`, `(1-x)y` and `xy`, evaluated
/// as nested lerps so that equal corners reproduce their value exactly.
fn blend(x: f64, y: f64, g00: f64, g10: f64, g01: f64, g11: f64) -> f64 {
    let top = g00 + (g10 - g00) * x;
    let bottom = g01 + (g11 - g01) * x;
    top + (bottom - top) * y
}

/// Eastward (`u`) and northward (`v`) velocity components.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridVector {
    pub u: f64,
    pub v: f64,
}

impl GridVector {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

impl Interpolant for GridVector {
    /// `[u, v, magnitude]`
    type Output = [f64; 3];

    const ZERO: Self = GridVector { u: 0.0, v: 0.0 };

    fn bilinear(x: f64, y: f64, g00: Self, g10: Self, g01: Self, g11: Self) -> [f64; 3] {
        let u = blend(x, y, g00.u, g10.u, g01.u, g11.u);
        let v = blend(x, y, g00.v, g10.v, g01.v, g11.v);
        [u, v, (u * u + v * v).sqrt()]
    }
}

impl Interpolant for f64 {
    type Output = f64;

    const ZERO: Self = 0.0;

    fn bilinear(x: f64, y: f64, g00: f64, g10: f64, g01: f64, g11: f64) -> f64 {
        blend(x, y, g00, g10, g01, g11)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid<C> {
    header: GridHeader,
    rows: Vec<Vec<Option<C>>>,
}

impl<C: Interpolant> Grid<C> {
    /// Builds rows from a row-major data accessor. Continuous grids get
    /// their first column repeated at the end of each row so interpolation
    /// across the antimeridian finds both neighbors.
    pub fn from_fn(header: GridHeader, mut data: impl FnMut(usize) -> Option<C>) -> Self {
        let continuous = header.is_continuous();
        let mut p = 0;
        let rows = (0..header.ny)
            .map(|_| {
                let mut row: Vec<Option<C>> = (0..header.nx)
                    .map(|_| {
                        let value = data(p);
                        p += 1;
                        value
                    })
                    .collect();
                if continuous {
                    row.extend(row.first().copied());
                }
                row
            })
            .collect();
        Self { header, rows }
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    /// Value stored at column `i`, row `j`, including the wrapped column.
    pub fn value_at(&self, i: usize, j: usize) -> Option<C> {
        self.rows.get(j)?.get(i).copied().flatten()
    }

    /// Bilinear interpolation at `(lon, lat)` in degrees.
    ///
    /// Corners without data count as zero. The result is `None` only when a
    /// neighboring row lies outside the grid.
    pub fn interpolate(&self, lon: f64, lat: f64) -> Option<C::Output> {
        let h = &self.header;
        let i = floor_mod(lon - h.lo1, 360.0) / h.dx;
        let j = (h.la1 - lat) / h.dy;
        if !i.is_finite() || !j.is_finite() || j < 0.0 {
            return None;
        }

        let fi = i.floor();
        let fj = j.floor();
        let (x, y) = (i - fi, j - fj);
        let (fi, fj) = (fi as usize, fj as usize);

        let row0 = self.rows.get(fj)?;
        let row1 = self.rows.get(fj + 1)?;
        let corner = |row: &[Option<C>], k: usize| row.get(k).copied().flatten().unwrap_or(C::ZERO);

        Some(C::bilinear(
            x,
            y,
            corner(row0, fi),
            corner(row0, fi + 1),
            corner(row1, fi),
            corner(row1, fi + 1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{Grid, GridHeader, GridVector};

    fn global_header() -> GridHeader {
        GridHeader::new(0.0, 90.0, 1.0, 1.0, 360, 181)
    }

    fn constant_vector_grid(u: f64, v: f64) -> Grid<GridVector> {
        Grid::from_fn(global_header(), |_| Some(GridVector::new(u, v)))
    }

    #[test]
    fn constant_grid_interpolates_exactly() {
        let k = 0.123_456_789;
        let grid: Grid<f64> = Grid::from_fn(global_header(), |_| Some(k));
        for &(lon, lat) in &[(0.3, 0.7), (12.25, -33.9), (181.1, 45.45), (359.99, 10.01)] {
            assert_eq!(grid.interpolate(lon, lat), Some(k));
        }
    }

    #[test]
    fn unit_vector_scenario() {
        let grid = constant_vector_grid(1.0, 0.0);
        assert_eq!(grid.interpolate(0.5, 0.5), Some([1.0, 0.0, 1.0]));
    }

    #[test]
    fn antimeridian_wraps_to_first_column() {
        let grid = constant_vector_grid(1.0, 0.0);
        assert!(global_header().is_continuous());
        assert_eq!(grid.value_at(360, 0), grid.value_at(0, 0));
        assert_eq!(grid.interpolate(359.5, 0.5), Some([1.0, 0.0, 1.0]));
        assert_eq!(grid.interpolate(-0.5, 0.5), Some([1.0, 0.0, 1.0]));
    }

    #[test]
    fn blends_between_columns() {
        // u grows by one per column.
        let header = GridHeader::new(0.0, 90.0, 1.0, 1.0, 360, 181);
        let grid: Grid<f64> = Grid::from_fn(header, |p| Some((p % 360) as f64));
        let v = grid.interpolate(10.25, 0.0).unwrap();
        assert!((v - 10.25).abs() < 1e-12, "{v}");
    }

    #[test]
    fn missing_corners_count_as_zero() {
        let header = GridHeader::new(0.0, 1.0, 1.0, 1.0, 2, 2);
        // Only the first corner carries data.
        let grid: Grid<f64> = Grid::from_fn(header, |p| (p == 0).then_some(4.0));
        assert_eq!(grid.interpolate(0.5, 0.5), Some(1.0));
        assert_eq!(grid.interpolate(0.0, 1.0), Some(4.0));
    }

    #[test]
    fn rows_outside_grid_are_holes() {
        let grid = constant_vector_grid(1.0, 0.0);
        // The last row has no southern neighbor.
        assert_eq!(grid.interpolate(10.0, -90.0), None);
        assert_eq!(grid.interpolate(10.0, 90.5), None);
        assert_eq!(grid.interpolate(f64::NAN, 0.0), None);
    }

    #[test]
    fn regional_grid_does_not_wrap() {
        let header = GridHeader::new(0.0, 10.0, 1.0, 1.0, 10, 10);
        assert!(!header.is_continuous());
        let grid: Grid<f64> = Grid::from_fn(header, |_| Some(2.0));
        assert_eq!(grid.value_at(10, 0), None);
        // East edge blends towards a missing column.
        assert_eq!(grid.interpolate(9.5, 5.0), Some(1.0));
    }
}
