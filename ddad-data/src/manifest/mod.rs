//! Dataset manifest and scene files

mod error;
mod loader;
mod schema;

pub use error::ManifestError;
pub use loader::{DEFAULT_MANIFEST_NAME, DatasetManifest, SceneDescription};
pub use schema::{DatasetMetadata, DatumTable, DatumType, RecordEntry};
