//! DDAD Data Crate
//!
//! On-disk formats for synchronized multi-sensor driving datasets: the dataset
//! manifest and its scene files, per-scene calibration, annotation ontologies,
//! and LiDAR point clouds stored as PLY.
//!
//! This crate only parses and validates. Indexing and synchronization live in
//! `ddad-sync`.

pub mod calibration;
pub mod manifest;
pub mod ontology;
pub mod ply;
pub mod split;
pub mod types;

pub use calibration::{Calibration, SensorCalibration};
pub use manifest::{
    DatasetManifest, DatasetMetadata, DatumTable, DatumType, ManifestError, RecordEntry,
    SceneDescription,
};
pub use ontology::{Ontology, OntologyItem};
pub use ply::{PlyError, load_points_from_ply};
pub use split::Split;
pub use types::{CameraIntrinsics, LidarPoint, Pose};
