//! Small product and mesh documents shared by the crate's tests.

pub const CURRENTS_PATH: &str = "oscar/20140131-surface-currents-oscar-0.33.json";
pub const TOPOLOGY_PATH: &str = "ne_110m_land.json";

/// A 90 degree global grid with a uniform eastward current of 1.
pub fn tiny_vector_json() -> String {
    let header = r#"{"lo1": 0, "la1": 90, "dx": 90, "dy": 90, "nx": 4, "ny": 3}"#;
    let u = vec!["1.0"; 12].join(",");
    let v = vec!["0.0"; 12].join(",");
    format!(r#"[{{"header": {header}, "data": [{u}]}}, {{"header": {header}, "data": [{v}]}}]"#)
}

pub fn tiny_mesh_json() -> &'static str {
    r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {}, "geometry":
            {"type": "LineString", "coordinates": [[-10, 0], [0, 10], [10, 0]]}}
    ]}"#
}
