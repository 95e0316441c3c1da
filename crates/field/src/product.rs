//! Data products: decoded grids plus the metadata needed to draw them.

use std::fmt;
use std::rc::Rc;

use foundation::SegmentedColorScale;
use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, GridHeader, GridVector};

/// One record of a grid product file: a header and row-major data, where
/// `null` marks points without data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub header: GridHeader,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    Json(String),
    MissingRecord { expected: usize, found: usize },
    LengthMismatch { expected: usize, found: usize },
    HeaderMismatch,
    NotVector,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::Json(msg) => write!(f, "malformed grid json: {msg}"),
            GridError::MissingRecord { expected, found } => {
                write!(f, "expected {expected} grid records, found {found}")
            }
            GridError::LengthMismatch { expected, found } => {
                write!(f, "grid header declares {expected} points, data has {found}")
            }
            GridError::HeaderMismatch => write!(f, "vector components use different grids"),
            GridError::NotVector => write!(f, "product carries no vector data"),
        }
    }
}

impl std::error::Error for GridError {}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Json(err.to_string())
    }
}

pub fn decode_records(bytes: &[u8]) -> Result<Vec<GridRecord>, GridError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn checked(record: &GridRecord) -> Result<&GridRecord, GridError> {
    let expected = record.header.len();
    if record.data.len() != expected {
        return Err(GridError::LengthMismatch {
            expected,
            found: record.data.len(),
        });
    }
    Ok(record)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductGrid {
    Vector(Grid<GridVector>),
    Scalar(Grid<f64>),
}

impl ProductGrid {
    /// Builds a vector grid from a `u` record followed by a `v` record.
    /// A point has data only when both components do.
    pub fn vectors(records: &[GridRecord]) -> Result<Self, GridError> {
        let [u, v] = match records {
            [u, v, ..] => [checked(u)?, checked(v)?],
            _ => {
                return Err(GridError::MissingRecord {
                    expected: 2,
                    found: records.len(),
                });
            }
        };
        if u.header.nx != v.header.nx || u.header.ny != v.header.ny {
            return Err(GridError::HeaderMismatch);
        }
        let grid = Grid::from_fn(u.header.clone(), |p| match (u.data[p], v.data[p]) {
            (Some(u), Some(v)) => Some(GridVector::new(u, v)),
            _ => None,
        });
        Ok(ProductGrid::Vector(grid))
    }

    pub fn scalars(records: &[GridRecord]) -> Result<Self, GridError> {
        let record = records.first().ok_or(GridError::MissingRecord {
            expected: 1,
            found: 0,
        })?;
        let record = checked(record)?;
        Ok(ProductGrid::Scalar(Grid::from_fn(
            record.header.clone(),
            |p| record.data[p],
        )))
    }

    pub fn header(&self) -> &GridHeader {
        match self {
            ProductGrid::Vector(grid) => grid.header(),
            ProductGrid::Scalar(grid) => grid.header(),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, ProductGrid::Vector(_))
    }

    fn has_value(&self, i: usize, j: usize) -> bool {
        match self {
            ProductGrid::Vector(grid) => grid.value_at(i, j).is_some(),
            ProductGrid::Scalar(grid) => grid.value_at(i, j).is_some(),
        }
    }

    /// Positions of the grid points that carry data, row by row.
    pub fn defined_points(&self) -> Vec<GeoPoint> {
        let h = self.header();
        let mut points = Vec::new();
        for j in 0..h.ny {
            for i in 0..h.nx {
                if self.has_value(i, j) {
                    points.push(GeoPoint::new(
                        h.lo1 + i as f64 * h.dx,
                        h.la1 - j as f64 * h.dy,
                    ));
                }
            }
        }
        points
    }
}

/// How particles are animated over a vector product.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleDescriptor {
    /// Screen-height fraction a unit velocity moves per frame.
    pub velocity_scale: f64,
    /// Magnitude that maps to the brightest trail color.
    pub max_intensity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    pub bounds: [f64; 2],
    pub gradient: SegmentedColorScale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Overlay type name, e.g. `currents`.
    pub kind: String,
    pub description: String,
    pub grid: ProductGrid,
    pub scale: ColorScale,
    pub particles: ParticleDescriptor,
}

impl Product {
    pub fn header(&self) -> &GridHeader {
        self.grid.header()
    }

    /// `[u, v, magnitude]` at a geographic point.
    pub fn interpolate_vector(&self, lon: f64, lat: f64) -> Option<[f64; 3]> {
        match &self.grid {
            ProductGrid::Vector(grid) => grid.interpolate(lon, lat),
            ProductGrid::Scalar(_) => None,
        }
    }

    /// Scalar used for overlay coloring; vector products report magnitude.
    pub fn interpolate_scalar(&self, lon: f64, lat: f64) -> Option<f64> {
        match &self.grid {
            ProductGrid::Vector(grid) => grid.interpolate(lon, lat).map(|[_, _, m]| m),
            ProductGrid::Scalar(grid) => grid.interpolate(lon, lat),
        }
    }
}

/// The animated product and the product colored beneath it. Both point at
/// the same allocation when no distinct overlay was requested.
#[derive(Debug, Clone)]
pub struct Grids {
    pub primary: Rc<Product>,
    pub overlay: Rc<Product>,
}

impl Grids {
    pub fn single(primary: Rc<Product>) -> Self {
        Self {
            overlay: Rc::clone(&primary),
            primary,
        }
    }

    pub fn with_overlay(primary: Rc<Product>, overlay: Rc<Product>) -> Self {
        Self { primary, overlay }
    }

    pub fn has_distinct_overlay(&self) -> bool {
        !Rc::ptr_eq(&self.primary, &self.overlay)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{GridError, ProductGrid, decode_records};

    const TWO_BY_TWO: &str = r#"[
        {"header": {"lo1": 0, "la1": 1, "dx": 1, "dy": 1, "nx": 2, "ny": 2, "refTime": "2014-01-01T00:00:00Z"},
         "data": [1.0, 2.0, null, 4.0]},
        {"header": {"lo1": 0, "la1": 1, "dx": 1, "dy": 1, "nx": 2, "ny": 2},
         "data": [0.5, null, 3.0, 4.0]}
    ]"#;

    #[test]
    fn decodes_records_with_nulls() {
        let records = decode_records(TWO_BY_TWO.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data, vec![Some(1.0), Some(2.0), None, Some(4.0)]);
        assert_eq!(
            records[0].header.ref_time.as_deref(),
            Some("2014-01-01T00:00:00Z")
        );
    }

    #[test]
    fn vector_points_need_both_components() {
        let records = decode_records(TWO_BY_TWO.as_bytes()).unwrap();
        let ProductGrid::Vector(grid) = ProductGrid::vectors(&records).unwrap() else {
            panic!("expected vector grid");
        };
        assert!(grid.value_at(0, 0).is_some());
        assert!(grid.value_at(1, 0).is_none());
        assert!(grid.value_at(0, 1).is_none());
        assert!(grid.value_at(1, 1).is_some());
    }

    #[test]
    fn rejects_short_data() {
        let json = r#"[{"header": {"lo1": 0, "la1": 0, "dx": 1, "dy": 1, "nx": 3, "ny": 1}, "data": [1.0]}]"#;
        let records = decode_records(json.as_bytes()).unwrap();
        assert_eq!(
            ProductGrid::scalars(&records),
            Err(GridError::LengthMismatch {
                expected: 3,
                found: 1
            })
        );
    }

    #[test]
    fn defined_points_skip_missing_data() {
        let records = decode_records(TWO_BY_TWO.as_bytes()).unwrap();
        let grid = ProductGrid::vectors(&records).unwrap();
        let points: Vec<_> = grid
            .defined_points()
            .iter()
            .map(|p| (p.lon, p.lat))
            .collect();
        assert_eq!(points, vec![(0.0, 1.0), (1.0, 0.0)]);
    }

    #[test]
    fn vectors_need_two_records() {
        let json = r#"[{"header": {"lo1": 0, "la1": 0, "dx": 1, "dy": 1, "nx": 1, "ny": 1}, "data": [1.0]}]"#;
        let records = decode_records(json.as_bytes()).unwrap();
        assert_eq!(
            ProductGrid::vectors(&records),
            Err(GridError::MissingRecord {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(decode_records(b"{"), Err(GridError::Json(_))));
    }
}
