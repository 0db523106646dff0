//! In-memory scenes and payloads for unit tests

use crate::ingest::{PayloadError, PayloadLoader, PointCloud};
use crate::scene::{SampleReference, Scene, SceneIndex};
use ddad_data::{
    Calibration, CameraIntrinsics, DatumTable, DatumType, LidarPoint, Ontology, OntologyItem, Pose,
    RecordEntry, SceneDescription, SensorCalibration,
};
use glam::Vec3;
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SEMANTIC: &str = "semantic_segmentation_2d";

/// Builds a scene with a `lidar` datum followed by camera datums, one record
/// per sample on each.
pub struct SceneBuilder {
    name: String,
    len: usize,
    cameras: Vec<String>,
    lidar_timestamps: Option<Vec<u64>>,
    camera_offset: u64,
    annotated: Box<dyn Fn(usize) -> bool>,
    calibrated: bool,
    lidar: bool,
    image_size: (u32, u32),
}

impl SceneBuilder {
    pub fn new(name: &str, len: usize) -> Self {
        Self {
            name: name.to_string(),
            len,
            cameras: vec!["CAMERA_01".to_string()],
            lidar_timestamps: None,
            camera_offset: 0,
            annotated: Box::new(|_| true),
            calibrated: true,
            lidar: true,
            image_size: (8, 6),
        }
    }

    pub fn cameras(mut self, cameras: &[&str]) -> Self {
        self.cameras = cameras.iter().map(|c| c.to_string()).collect();
        self
    }

    /// LiDAR timestamps in recording order. Cameras follow the same order.
    pub fn lidar_timestamps(mut self, timestamps: Vec<u64>) -> Self {
        self.len = timestamps.len();
        self.lidar_timestamps = Some(timestamps);
        self
    }

    /// Shift every camera timestamp by `offset` microseconds.
    pub fn camera_offset(mut self, offset: u64) -> Self {
        self.camera_offset = offset;
        self
    }

    /// Which samples carry semantic segmentation on every camera.
    pub fn annotated(mut self, annotated: impl Fn(usize) -> bool + 'static) -> Self {
        self.annotated = Box::new(annotated);
        self
    }

    pub fn without_calibration(mut self) -> Self {
        self.calibrated = false;
        self
    }

    /// Drop the `lidar` stream; its timestamps still drive the cameras.
    pub fn without_lidar(mut self) -> Self {
        self.lidar = false;
        self
    }

    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = (width, height);
        self
    }

    pub fn description(self) -> SceneDescription {
        let timestamps = self
            .lidar_timestamps
            .clone()
            .unwrap_or_else(|| (0..self.len as u64).map(|i| i * 100_000).collect());

        let mut datums = Vec::new();
        if self.lidar {
            datums.push(DatumTable {
                name: "lidar".into(),
                datum_type: DatumType::PointCloud,
                width: None,
                height: None,
                records: timestamps
                    .iter()
                    .enumerate()
                    .map(|(i, &t)| RecordEntry {
                        timestamp: t,
                        filename: format!("point_cloud/lidar/{i}.ply"),
                        annotations: BTreeMap::new(),
                    })
                    .collect(),
            });
        }
        for camera in &self.cameras {
            datums.push(DatumTable {
                name: camera.clone(),
                datum_type: DatumType::Image,
                width: Some(self.image_size.0),
                height: Some(self.image_size.1),
                records: timestamps
                    .iter()
                    .enumerate()
                    .map(|(i, &t)| RecordEntry {
                        timestamp: t + self.camera_offset,
                        filename: format!("rgb/{camera}/{i}.png"),
                        annotations: if (self.annotated)(i) {
                            BTreeMap::from([(SEMANTIC.to_string(), format!("{SEMANTIC}/{camera}/{i}.png"))])
                        } else {
                            BTreeMap::new()
                        },
                    })
                    .collect(),
            });
        }

        let mut calibration = Calibration::new();
        if self.calibrated {
            calibration.insert(
                "lidar",
                SensorCalibration {
                    extrinsics: Pose::IDENTITY,
                    intrinsics: None,
                },
            );
            let (width, height) = self.image_size;
            for camera in &self.cameras {
                calibration.insert(
                    camera.clone(),
                    SensorCalibration {
                        extrinsics: Pose::IDENTITY,
                        intrinsics: Some(CameraIntrinsics::new(
                            10.0,
                            10.0,
                            width as f32 / 2.0,
                            height as f32 / 2.0,
                        )),
                    },
                );
            }
        }

        let ontology = Ontology::new([
            OntologyItem {
                id: 0,
                name: "Road".into(),
                color: [128, 64, 128],
                is_thing: false,
            },
            OntologyItem {
                id: 1,
                name: "Car".into(),
                color: [0, 0, 142],
                is_thing: true,
            },
        ]);

        SceneDescription {
            directory: PathBuf::from("/data").join(&self.name),
            name: self.name,
            log: None,
            calibration,
            ontologies: BTreeMap::from([(SEMANTIC.to_string(), ontology)]),
            datums,
        }
    }

    pub fn build(self) -> Scene {
        Scene::from_description(self.description())
    }
}

/// Index of `scenes` with LiDAR timestamps as sample boundaries.
pub fn index_of(scenes: Vec<Scene>) -> SceneIndex {
    SceneIndex::from_scenes(scenes, SampleReference::pivot("lidar"), Path::new("test"))
        .expect("test scenes contain lidar")
}

/// Serves solid images and a single-point cloud at depth 3 on the optical
/// axis. Paths containing `fail_on` fail with an IO error.
pub struct MemoryLoader {
    image_size: (u32, u32),
    fail_on: Option<String>,
    image_loads: AtomicUsize,
    point_cloud_loads: AtomicUsize,
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self {
            image_size: (8, 6),
            fail_on: None,
            image_loads: AtomicUsize::new(0),
            point_cloud_loads: AtomicUsize::new(0),
        }
    }
}

impl MemoryLoader {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn image_loads(&self) -> usize {
        self.image_loads.load(Ordering::SeqCst)
    }

    pub fn point_cloud_loads(&self) -> usize {
        self.point_cloud_loads.load(Ordering::SeqCst)
    }

    fn check(&self, path: &Path) -> Result<(), PayloadError> {
        match &self.fail_on {
            Some(fragment) if path.to_string_lossy().contains(fragment.as_str()) => Err(
                PayloadError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )),
            ),
            _ => Ok(()),
        }
    }
}

impl PayloadLoader for MemoryLoader {
    fn load_image(&self, path: &Path) -> Result<RgbImage, PayloadError> {
        self.image_loads.fetch_add(1, Ordering::SeqCst);
        self.check(path)?;
        let (width, height) = self.image_size;
        Ok(RgbImage::from_pixel(width, height, Rgb([90, 90, 90])))
    }

    fn load_point_cloud(&self, path: &Path) -> Result<PointCloud, PayloadError> {
        self.point_cloud_loads.fetch_add(1, Ordering::SeqCst);
        self.check(path)?;
        Ok(PointCloud::new(vec![LidarPoint::at(Vec3::new(0.0, 0.0, 3.0))]))
    }
}
