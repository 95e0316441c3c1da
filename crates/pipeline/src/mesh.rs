//! Coastline meshes decoded from GeoJSON.

use std::fmt;
use std::rc::Rc;

use foundation::math::GeoPoint;
use runtime::{TaskContext, TaskError, TaskResult};
use serde_json::Value;
use tracing::info;

use crate::resources::ResourceLoader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    Json(String),
    InvalidGeometry(String),
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::Json(msg) => write!(f, "mesh is not valid json: {msg}"),
            MeshError::InvalidGeometry(reason) => write!(f, "invalid mesh geometry: {reason}"),
        }
    }
}

impl std::error::Error for MeshError {}

/// Polylines of the coastline. Polygon rings are kept as closed lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub lines: Vec<Vec<GeoPoint>>,
}

impl Mesh {
    pub fn from_geojson_slice(bytes: &[u8]) -> Result<Self, MeshError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| MeshError::Json(e.to_string()))?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, MeshError> {
        let mut mesh = Mesh::default();
        collect(value, &mut mesh.lines).map_err(MeshError::InvalidGeometry)?;
        Ok(mesh)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn point_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }
}

/// Mesh agent task: fetches and decodes the topology at `path`.
pub async fn load_mesh(
    ctx: TaskContext,
    loader: Rc<dyn ResourceLoader>,
    path: String,
) -> TaskResult<Mesh> {
    let bytes = loader
        .load(&path)
        .await
        .map_err(|e| TaskError::failed(e.to_string()))?;
    if ctx.is_cancelled() {
        return Err(TaskError::Cancelled);
    }
    let mesh = Mesh::from_geojson_slice(&bytes).map_err(|e| TaskError::failed(format!("{path}: {e}")))?;
    info!(
        agent = ctx.agent(),
        path = %path,
        lines = mesh.line_count(),
        points = mesh.point_count(),
        "decoded mesh"
    );
    Ok(mesh)
}

fn collect(value: &Value, out: &mut Vec<Vec<GeoPoint>>) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or("geojson object expected".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geojson object missing type".to_string())?;

    match ty {
        "FeatureCollection" => {
            let features = obj
                .get("features")
                .and_then(|v| v.as_array())
                .ok_or("FeatureCollection missing features".to_string())?;
            for feature in features {
                collect(feature, out)?;
            }
            Ok(())
        }
        "Feature" => match obj.get("geometry") {
            Some(Value::Null) | None => Ok(()),
            Some(geometry) => collect(geometry, out),
        },
        "GeometryCollection" => {
            let geometries = obj
                .get("geometries")
                .and_then(|v| v.as_array())
                .ok_or("GeometryCollection missing geometries".to_string())?;
            for geometry in geometries {
                collect(geometry, out)?;
            }
            Ok(())
        }
        _ => {
            let coords = obj
                .get("coordinates")
                .ok_or(format!("{ty} missing coordinates"))?;
            match ty {
                "Point" | "MultiPoint" => Ok(()),
                "LineString" => {
                    out.push(parse_points(coords)?);
                    Ok(())
                }
                "MultiLineString" | "Polygon" => {
                    out.extend(parse_lines(coords)?);
                    Ok(())
                }
                "MultiPolygon" => {
                    let polys = coords
                        .as_array()
                        .ok_or("MultiPolygon coordinates must be an array".to_string())?;
                    for poly in polys {
                        out.extend(parse_lines(poly)?);
                    }
                    Ok(())
                }
                other => Err(format!("unsupported geometry type: {other}")),
            }
        }
    }
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    match coords.as_array().map(Vec::as_slice) {
        Some([lon, lat, ..]) => {
            let lon = lon.as_f64().ok_or("lon must be a number".to_string())?;
            let lat = lat.as_f64().ok_or("lat must be a number".to_string())?;
            Ok(GeoPoint::new(lon, lat))
        }
        _ => Err("position must be [lon, lat]".to_string()),
    }
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?
        .iter()
        .map(parse_point)
        .collect()
}

fn parse_lines(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    coords
        .as_array()
        .ok_or("coordinates must be an array of lines".to_string())?
        .iter()
        .map(parse_points)
        .collect()
}
