//! PLY file loading functions

use crate::types::LidarPoint;
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Errors raised while reading a PLY point cloud.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PLY parsing error: {0}")]
    Parse(String),
    #[error("missing '{property}' at vertex {index}")]
    MissingProperty { property: &'static str, index: usize },
}

// Only the vertex element is read; faces and other elements are ignored.
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
}

fn get_f32(prop: Option<&JsonValue>) -> Option<f32> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
        _ => None,
    })
}

/// Load a LiDAR sweep from a PLY file.
///
/// Positions come from `x`, `y`, `z`; intensity from `intensity`,
/// `reflectance` or `i`, whichever is present first.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_points_from_ply(path: impl AsRef<Path>) -> Result<Vec<LidarPoint>, PlyError> {
    debug!("Loading PLY points from: {}", path.as_ref().display());
    let file = File::open(path.as_ref())?;
    points_from_ply_reader(BufReader::new(file))
}

/// Parse a LiDAR sweep from any PLY byte stream.
pub fn points_from_ply_reader<R: BufRead>(reader: R) -> Result<Vec<LidarPoint>, PlyError> {
    let ply_data: PlyFile = serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        PlyError::Parse(e.to_string())
    })?;

    let mut points = Vec::with_capacity(ply_data.vertex.len());
    for (index, vertex) in ply_data.vertex.iter().enumerate() {
        let coord = |property: &'static str| {
            get_f32(vertex.get(property)).ok_or(PlyError::MissingProperty { property, index })
        };
        let position = Vec3::new(coord("x")?, coord("y")?, coord("z")?);

        let intensity = get_f32(vertex.get("intensity"))
            .or_else(|| get_f32(vertex.get("reflectance")))
            .or_else(|| get_f32(vertex.get("i")))
            .unwrap_or(0.0);

        points.push(LidarPoint::new(position, intensity));
    }

    debug!("Loaded {} points from PLY file", points.len());
    Ok(points)
}
