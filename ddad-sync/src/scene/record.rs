//! Datum records and per-datum record streams

use ddad_data::{DatumTable, DatumType, RecordEntry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A camera observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraRecord {
    /// Microseconds.
    pub timestamp: u64,
    pub image: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Annotation type to payload path.
    pub annotations: BTreeMap<String, PathBuf>,
}

/// A LiDAR sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LidarRecord {
    /// Microseconds.
    pub timestamp: u64,
    pub point_cloud: PathBuf,
    /// Annotation type to payload path.
    pub annotations: BTreeMap<String, PathBuf>,
}

/// One sensor observation, tagged by sensor family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatumRecord {
    Camera(CameraRecord),
    Lidar(LidarRecord),
}

impl DatumRecord {
    /// Build a record from its manifest entry, resolving paths against the
    /// scene directory.
    pub fn from_entry(table: &DatumTable, entry: &RecordEntry, directory: &Path) -> Self {
        let annotations = entry
            .annotations
            .iter()
            .map(|(name, path)| (name.clone(), directory.join(path)))
            .collect();
        match table.datum_type {
            DatumType::Image => DatumRecord::Camera(CameraRecord {
                timestamp: entry.timestamp,
                image: directory.join(&entry.filename),
                width: table.width.unwrap_or_default(),
                height: table.height.unwrap_or_default(),
                annotations,
            }),
            DatumType::PointCloud => DatumRecord::Lidar(LidarRecord {
                timestamp: entry.timestamp,
                point_cloud: directory.join(&entry.filename),
                annotations,
            }),
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            DatumRecord::Camera(record) => record.timestamp,
            DatumRecord::Lidar(record) => record.timestamp,
        }
    }

    /// Path of the image or point cloud blob.
    pub fn payload_path(&self) -> &Path {
        match self {
            DatumRecord::Camera(record) => &record.image,
            DatumRecord::Lidar(record) => &record.point_cloud,
        }
    }

    pub fn annotations(&self) -> &BTreeMap<String, PathBuf> {
        match self {
            DatumRecord::Camera(record) => &record.annotations,
            DatumRecord::Lidar(record) => &record.annotations,
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&Path> {
        self.annotations().get(name).map(PathBuf::as_path)
    }

    pub fn has_image_payload(&self) -> bool {
        matches!(self, DatumRecord::Camera(_))
    }

    pub fn has_point_cloud_payload(&self) -> bool {
        matches!(self, DatumRecord::Lidar(_))
    }

    pub fn has_annotations(&self) -> bool {
        !self.annotations().is_empty()
    }

    /// `(width, height)` for camera records.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        match self {
            DatumRecord::Camera(record) => Some((record.width, record.height)),
            DatumRecord::Lidar(_) => None,
        }
    }
}

/// All records of one datum within a scene.
///
/// Records keep their recording order; a timestamp-sorted view (stable, so
/// equal timestamps stay in recording order) backs nearest-in-time lookups.
#[derive(Debug, Clone)]
pub struct DatumStream {
    name: String,
    datum_type: DatumType,
    records: Vec<DatumRecord>,
    by_time: Vec<usize>,
}

impl DatumStream {
    pub fn from_table(table: &DatumTable, directory: &Path) -> Self {
        let records: Vec<DatumRecord> = table
            .records
            .iter()
            .map(|entry| DatumRecord::from_entry(table, entry, directory))
            .collect();
        let mut by_time: Vec<usize> = (0..records.len()).collect();
        by_time.sort_by_key(|&i| records[i].timestamp());
        Self {
            name: table.name.clone(),
            datum_type: table.datum_type,
            records,
            by_time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datum_type(&self) -> DatumType {
        self.datum_type
    }

    pub fn is_camera(&self) -> bool {
        self.datum_type == DatumType::Image
    }

    pub fn is_lidar(&self) -> bool {
        self.datum_type == DatumType::PointCloud
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in recording order.
    pub fn records(&self) -> &[DatumRecord] {
        &self.records
    }

    /// The `i`-th record in recording order.
    pub fn recorded(&self, i: usize) -> Option<&DatumRecord> {
        self.records.get(i)
    }

    /// The `rank`-th record in ascending timestamp order.
    pub fn by_time(&self, rank: usize) -> Option<&DatumRecord> {
        self.by_time.get(rank).map(|&i| &self.records[i])
    }

    /// Record closest in time to `timestamp`. On an exact tie between an
    /// earlier and a later record the earlier one wins.
    pub fn nearest(&self, timestamp: u64) -> Option<&DatumRecord> {
        let pos = self
            .by_time
            .partition_point(|&i| self.records[i].timestamp() < timestamp);
        let after = self.by_time(pos);
        let before = pos.checked_sub(1).and_then(|p| self.by_time(p));
        match (before, after) {
            (Some(b), Some(a)) => {
                if timestamp - b.timestamp() <= a.timestamp() - timestamp {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (b, a) => b.or(a),
        }
    }
}
