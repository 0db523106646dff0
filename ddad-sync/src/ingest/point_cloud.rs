//! Point cloud payloads

use ddad_data::LidarPoint;
use glam::Vec3;

/// A decoded LiDAR sweep with optional temporal information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<LidarPoint>,
    /// Microseconds, when known.
    pub timestamp: Option<u64>,
}

impl PointCloud {
    pub fn new(points: Vec<LidarPoint>) -> Self {
        Self {
            points,
            timestamp: None,
        }
    }

    /// Build a cloud from bare positions.
    pub fn from_positions(positions: impl IntoIterator<Item = Vec3>) -> Self {
        Self::new(positions.into_iter().map(LidarPoint::at).collect())
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().map(|p| p.position)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
