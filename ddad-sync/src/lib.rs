//! DDAD Sync Crate
//!
//! Random access to synchronized multi-sensor samples of a driving dataset.
//! Everything that can disqualify a sample (missing temporal context, missing
//! annotations) is decided once at construction, so retrieval is a pure
//! lookup over an immutable index.
//!
//! ## Modules
//!
//! - [`scene`]: scenes, datum records, the flat sample index and context windows
//! - [`sync`]: cross-sensor synchronization, depth projection, annotation filtering
//! - [`ingest`]: payload loading (images, point clouds)
//! - [`config`]: dataset construction options
//! - [`dataset`]: the [`SynchronizedDataset`] facade

pub mod config;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod scene;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::DatasetConfig;
pub use dataset::{DatasetItem, SynchronizedDataset};
pub use error::{
    ConfigError, ContextUnavailable, DatasetError, IndexError, ProjectionError, SampleError,
    SyncError,
};
pub use ingest::{CancelToken, DatumPayload, FsPayloadLoader, PayloadError, PayloadLoader, PointCloud};
pub use scene::{
    ContextWindow, DatumRecord, DatumStream, GlobalSample, SampleOrder, SampleReference, Scene,
    SceneIndex, TemporalWindower,
};
pub use sync::{
    AnnotationFilter, DatumEntry, DatumSynchronizer, DepthMap, DepthProjector, SynchronizedSample,
};
