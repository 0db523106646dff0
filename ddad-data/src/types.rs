//! Core geometric types shared by the manifest, calibration and projection code.
//!
//! Sensor frames follow the usual camera convention: +Z points forward out of
//! the lens, +X to the right and +Y down the image.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use std::ops::Mul;

/// A single LiDAR return.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarPoint {
    /// Position in the LiDAR sensor frame (meters).
    pub position: Vec3,
    /// Return intensity, `0.0` when the file carries none.
    pub intensity: f32,
}

impl LidarPoint {
    /// Create a new point with position and intensity.
    pub fn new(position: Vec3, intensity: f32) -> Self {
        Self {
            position,
            intensity,
        }
    }

    /// Create a point with no intensity information.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            intensity: 0.0,
        }
    }
}

/// A rigid transform (rotation followed by translation).
///
/// Extrinsics map points from the sensor frame into the vehicle frame, so
/// `camera.inverse() * lidar` maps LiDAR points into the camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Unit quaternion.
    pub rotation: Quat,
    /// Translation in meters.
    pub translation: Vec3,
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// Create a pose from rotation and translation.
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation,
        }
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Homogeneous 4x4 matrix.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `a * b` applies `b` first, then `a`.
impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

/// Pinhole intrinsics of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub skew: f32,
}

impl CameraIntrinsics {
    /// Create intrinsics without skew.
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    /// Project a point given in the camera frame onto the image plane.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[inline]
    pub fn project(&self, point: Vec3) -> Option<Vec2> {
        if point.z <= 0.0 {
            return None;
        }
        let x = point.x / point.z;
        let y = point.y / point.z;
        Some(Vec2::new(
            self.fx * x + self.skew * y + self.cx,
            self.fy * y + self.cy,
        ))
    }

    /// The 3x3 camera matrix `K`.
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(self.fx, 0.0, 0.0),
            Vec3::new(self.skew, self.fy, 0.0),
            Vec3::new(self.cx, self.cy, 1.0),
        )
    }
}
