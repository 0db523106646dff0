//! Per-scene sensor calibration.

use crate::types::{CameraIntrinsics, Pose};
use glam::{Quat, Vec3};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Calibration of one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorCalibration {
    /// Sensor to vehicle transform.
    pub extrinsics: Pose,
    /// Pinhole intrinsics, absent for LiDAR.
    pub intrinsics: Option<CameraIntrinsics>,
}

/// Calibration of every sensor of a scene, keyed by datum name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    sensors: BTreeMap<String, SensorCalibration>,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sensor.
    pub fn insert(&mut self, name: impl Into<String>, sensor: SensorCalibration) {
        self.sensors.insert(name.into(), sensor);
    }

    pub fn with_sensor(mut self, name: impl Into<String>, sensor: SensorCalibration) -> Self {
        self.insert(name, sensor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SensorCalibration> {
        self.sensors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sensors.contains_key(name)
    }

    /// Transform taking points from sensor `from` into sensor `to`.
    pub fn relative_pose(&self, from: &str, to: &str) -> Option<Pose> {
        let from = self.sensors.get(from)?;
        let to = self.sensors.get(to)?;
        Some(to.extrinsics.inverse() * from.extrinsics)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// Parallel arrays as stored on disk: `names[i]` owns `extrinsics[i]` and
/// `intrinsics[i]`.
#[derive(Deserialize, Debug)]
pub(crate) struct CalibrationFile {
    names: Vec<String>,
    extrinsics: Vec<PoseFile>,
    #[serde(default)]
    intrinsics: Vec<IntrinsicsFile>,
}

#[derive(Deserialize, Debug)]
struct PoseFile {
    #[serde(default)]
    translation: TranslationFile,
    #[serde(default)]
    rotation: RotationFile,
}

#[derive(Deserialize, Debug, Default)]
struct TranslationFile {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize, Debug)]
struct RotationFile {
    #[serde(default)]
    qx: f32,
    #[serde(default)]
    qy: f32,
    #[serde(default)]
    qz: f32,
    #[serde(default)]
    qw: f32,
}

impl Default for RotationFile {
    fn default() -> Self {
        Self {
            qx: 0.0,
            qy: 0.0,
            qz: 0.0,
            qw: 1.0,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct IntrinsicsFile {
    #[serde(default)]
    fx: f32,
    #[serde(default)]
    fy: f32,
    #[serde(default)]
    cx: f32,
    #[serde(default)]
    cy: f32,
    #[serde(default)]
    skew: f32,
}

impl CalibrationFile {
    /// Validate the parallel arrays and convert. Errors are plain reasons, the
    /// caller attaches the file path.
    pub(crate) fn into_calibration(self) -> Result<Calibration, String> {
        if self.extrinsics.len() != self.names.len() {
            return Err(format!(
                "{} sensor names but {} extrinsics",
                self.names.len(),
                self.extrinsics.len()
            ));
        }
        if !self.intrinsics.is_empty() && self.intrinsics.len() != self.names.len() {
            return Err(format!(
                "{} sensor names but {} intrinsics",
                self.names.len(),
                self.intrinsics.len()
            ));
        }

        let mut intrinsics = self.intrinsics.into_iter();
        let mut calibration = Calibration::new();
        for (name, pose) in self.names.into_iter().zip(self.extrinsics) {
            let q = Quat::from_xyzw(pose.rotation.qx, pose.rotation.qy, pose.rotation.qz, pose.rotation.qw);
            let norm = q.length();
            if !norm.is_finite() || norm < 1e-6 {
                return Err(format!("sensor '{}' has a degenerate rotation", name));
            }
            let extrinsics = Pose::new(
                q / norm,
                Vec3::new(pose.translation.x, pose.translation.y, pose.translation.z),
            );

            // LiDAR entries carry all-zero intrinsics
            let intrinsics = intrinsics
                .next()
                .filter(|k| k.fx != 0.0 && k.fy != 0.0)
                .map(|k| CameraIntrinsics {
                    fx: k.fx,
                    fy: k.fy,
                    cx: k.cx,
                    cy: k.cy,
                    skew: k.skew,
                });

            if calibration.contains(&name) {
                return Err(format!("sensor '{}' is calibrated twice", name));
            }
            calibration.insert(
                name,
                SensorCalibration {
                    extrinsics,
                    intrinsics,
                },
            );
        }
        Ok(calibration)
    }
}
