//! Error taxonomy.
//!
//! Construction fails with [`DatasetError`] and produces no dataset.
//! Retrieval fails per sample with [`SampleError`]; other samples stay
//! available. [`ContextUnavailable`] never leaves construction.

use ddad_data::ManifestError;

/// Position outside the addressable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("index {index} out of bounds for dataset of length {len}")]
pub struct IndexError {
    pub index: usize,
    pub len: usize,
}

/// A context window around `flat` would cross a scene boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sample {flat} lacks context (backward {backward}, forward {forward})")]
pub struct ContextUnavailable {
    pub flat: usize,
    pub backward: usize,
    pub forward: usize,
}

/// A requested datum has no record close enough to the reference timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("scene '{scene}' has no datum '{datum}'")]
    MissingDatum { scene: String, datum: String },
    #[error(
        "datum '{datum}' in scene '{scene}': nearest record at {nearest}us is {delta_us}us away \
         from {timestamp}us (tolerance {tolerance_us}us)"
    )]
    OutOfTolerance {
        scene: String,
        datum: String,
        timestamp: u64,
        nearest: u64,
        delta_us: u64,
        tolerance_us: u64,
    },
    #[error("datum '{datum}' in scene '{scene}' has no records")]
    Empty { scene: String, datum: String },
}

/// Calibration is missing or unusable for a depth-generation pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("scene '{scene}' has no calibration for '{datum}'")]
    MissingCalibration { scene: String, datum: String },
    #[error("scene '{scene}' has no intrinsics for camera '{datum}'")]
    MissingIntrinsics { scene: String, datum: String },
    #[error("depth source '{datum}' is not a point cloud datum")]
    NotAPointCloud { datum: String },
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
}

/// Per-sample retrieval failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Rejected construction options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no datum names requested")]
    NoDatums,
    #[error("datum '{0}' is requested twice")]
    DuplicateDatum(String),
    #[error("annotation '{0}' is requested twice")]
    DuplicateAnnotation(String),
    #[error("depth source '{0}' is neither requested nor the pivot datum")]
    UnknownDepthSource(String),
    #[error("depth source '{0}' is not a point cloud datum")]
    DepthSourceNotPointCloud(String),
    #[error("manifest path is empty")]
    MissingManifestPath,
}

/// Fatal construction failure.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read config {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
