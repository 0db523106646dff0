//! Payload ingestion
//!
//! Decoding of the blobs datum records point at:
//! - Camera images (RGB)
//! - LiDAR point clouds (PLY)
//! - Cooperative cancellation between per-datum loads

pub mod payload;
pub mod point_cloud;

pub use payload::{CancelToken, DatumPayload, FsPayloadLoader, PayloadError, PayloadLoader};
pub use point_cloud::PointCloud;
