//! Payload loading interfaces

use crate::ingest::point_cloud::PointCloud;
use crate::scene::DatumRecord;
use ddad_data::{PlyError, load_points_from_ply};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A decoded datum blob.
#[derive(Debug, Clone, PartialEq)]
pub enum DatumPayload {
    Image(RgbImage),
    PointCloud(PointCloud),
}

impl DatumPayload {
    pub fn as_image(&self) -> Option<&RgbImage> {
        match self {
            DatumPayload::Image(image) => Some(image),
            DatumPayload::PointCloud(_) => None,
        }
    }

    pub fn as_point_cloud(&self) -> Option<&PointCloud> {
        match self {
            DatumPayload::PointCloud(cloud) => Some(cloud),
            DatumPayload::Image(_) => None,
        }
    }
}

/// Errors that can occur while loading one datum's payload
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Point cloud decoding error: {0}")]
    PointCloud(#[from] PlyError),
    #[error("image is {actual:?} but the manifest declares {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("load cancelled")]
    Cancelled,
}

/// Source of decoded payloads.
///
/// Each call is one synchronous unit of work for one datum; a failure only
/// affects that datum.
pub trait PayloadLoader: Send + Sync {
    fn load_image(&self, path: &Path) -> Result<RgbImage, PayloadError>;

    fn load_point_cloud(&self, path: &Path) -> Result<PointCloud, PayloadError>;

    /// Load the payload of a record, checking camera images against the
    /// declared size.
    fn load(&self, record: &DatumRecord) -> Result<DatumPayload, PayloadError> {
        match record {
            DatumRecord::Camera(camera) => {
                let image = self.load_image(&camera.image)?;
                let actual = image.dimensions();
                let expected = (camera.width, camera.height);
                if actual != expected {
                    return Err(PayloadError::SizeMismatch { expected, actual });
                }
                Ok(DatumPayload::Image(image))
            }
            DatumRecord::Lidar(lidar) => {
                let mut cloud = self.load_point_cloud(&lidar.point_cloud)?;
                cloud.timestamp = Some(lidar.timestamp);
                Ok(DatumPayload::PointCloud(cloud))
            }
        }
    }
}

/// Loads images with the `image` crate and point clouds from PLY files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPayloadLoader;

impl PayloadLoader for FsPayloadLoader {
    fn load_image(&self, path: &Path) -> Result<RgbImage, PayloadError> {
        Ok(image::open(path)?.to_rgb8())
    }

    fn load_point_cloud(&self, path: &Path) -> Result<PointCloud, PayloadError> {
        Ok(PointCloud::new(load_points_from_ply(path)?))
    }
}

/// Thread-safe cancellation signal checked between per-datum loads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
