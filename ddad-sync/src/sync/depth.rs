//! LiDAR to camera depth projection

use crate::error::ProjectionError;
use crate::ingest::PointCloud;
use ddad_data::{CameraIntrinsics, Pose};
use tracing::trace;

/// Per-pixel depth in meters, row-major. `0.0` marks pixels no point hit.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthMap {
    /// An empty (all unset) map.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw value at `(x, y)`, `0.0` when unset.
    ///
    /// # Panics
    /// If `(x, y)` is outside the map.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Depth at `(x, y)` if a point projected there.
    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let d = self.get(x, y);
        (d > 0.0).then_some(d)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of pixels carrying a depth.
    pub fn valid_pixels(&self) -> usize {
        self.data.iter().filter(|d| **d > 0.0).count()
    }
}

/// Splats point clouds into sparse camera depth maps.
///
/// When several points land on one pixel the nearest is kept, which makes the
/// result independent of point order. Gaps are left unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthProjector;

impl DepthProjector {
    pub fn new() -> Self {
        Self
    }

    /// Project `cloud` (LiDAR frame) into a `width` x `height` camera image.
    pub fn project(
        &self,
        cloud: &PointCloud,
        lidar_to_camera: &Pose,
        intrinsics: &CameraIntrinsics,
        width: u32,
        height: u32,
    ) -> Result<DepthMap, ProjectionError> {
        if width == 0 || height == 0 {
            return Err(ProjectionError::InvalidImageSize { width, height });
        }

        let mut map = DepthMap::new(width, height);
        let mut hits = 0usize;
        for point in cloud.positions() {
            if !point.is_finite() {
                continue;
            }
            let camera = lidar_to_camera.transform_point(point);
            let Some(uv) = intrinsics.project(camera) else {
                continue;
            };
            // also rejects NaN
            if !(uv.x >= 0.0 && uv.y >= 0.0) {
                continue;
            }
            let (u, v) = (uv.x.floor(), uv.y.floor());
            if u >= width as f32 || v >= height as f32 {
                continue;
            }

            let slot = &mut map.data[v as usize * width as usize + u as usize];
            if *slot == 0.0 || camera.z < *slot {
                *slot = camera.z;
            }
            hits += 1;
        }

        trace!(
            "Projected {} of {} points into {}x{} depth",
            hits,
            cloud.len(),
            width,
            height
        );
        Ok(map)
    }
}
