//! Serialized layout of the dataset and scene files

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive fields of the dataset file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct DatasetFile {
    #[serde(default)]
    pub metadata: DatasetMetadata,
    pub scene_splits: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SceneFile {
    pub name: String,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub calibration: Option<String>,
    #[serde(default)]
    pub ontologies: BTreeMap<String, String>,
    pub datums: Vec<DatumTable>,
}

/// Sensor family of a datum stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatumType {
    Image,
    PointCloud,
}

/// One datum's record table inside a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatumTable {
    pub name: String,
    #[serde(rename = "type")]
    pub datum_type: DatumType,
    /// Image width, required for `image` datums.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Image height, required for `image` datums.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Records in recording order.
    pub records: Vec<RecordEntry>,
}

/// One observation in a record table. Paths are relative to the scene file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Microseconds.
    pub timestamp: u64,
    pub filename: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}
