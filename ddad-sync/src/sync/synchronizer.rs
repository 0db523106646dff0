//! Synchronized multi-datum sample assembly

use crate::error::{IndexError, ProjectionError, SampleError, SyncError};
use crate::ingest::{CancelToken, DatumPayload, PayloadError, PayloadLoader, PointCloud};
use crate::scene::{DatumRecord, GlobalSample, SampleReference, Scene, SceneIndex};
use crate::sync::depth::{DepthMap, DepthProjector};
use ddad_data::{CameraIntrinsics, Pose, SensorCalibration};
use image::RgbImage;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default maximum distance between a datum's record and the reference
/// timestamp, in microseconds.
pub const DEFAULT_SYNC_TOLERANCE_US: u64 = 1_000;

/// One datum of a synchronized sample.
#[derive(Debug)]
pub struct DatumEntry {
    pub datum_name: String,
    pub record: DatumRecord,
    pub calibration: Option<SensorCalibration>,
    /// Requested annotations present on the record, as payload paths.
    pub annotations: BTreeMap<String, PathBuf>,
    /// `None` when payload loading is disabled.
    pub payload: Option<Result<DatumPayload, Arc<PayloadError>>>,
    /// Depth projected from the LiDAR source, cameras only. The error is
    /// shared by every camera of the sample when the point cloud failed to
    /// load.
    pub depth: Option<Result<DepthMap, Arc<PayloadError>>>,
}

impl DatumEntry {
    pub fn timestamp(&self) -> u64 {
        self.record.timestamp()
    }

    pub fn image(&self) -> Option<&RgbImage> {
        match &self.payload {
            Some(Ok(payload)) => payload.as_image(),
            _ => None,
        }
    }

    pub fn point_cloud(&self) -> Option<&PointCloud> {
        match &self.payload {
            Some(Ok(payload)) => payload.as_point_cloud(),
            _ => None,
        }
    }

    pub fn depth_map(&self) -> Option<&DepthMap> {
        match &self.depth {
            Some(Ok(depth)) => Some(depth),
            _ => None,
        }
    }
}

/// Every requested datum at one timestamp.
#[derive(Debug)]
pub struct SynchronizedSample {
    pub scene: Arc<Scene>,
    pub sample: GlobalSample,
    /// Reference timestamp, microseconds.
    pub timestamp: u64,
    /// Pivot first when one is designated, then requested datums in request order.
    pub entries: Vec<DatumEntry>,
    has_pivot: bool,
}

impl SynchronizedSample {
    pub fn entry(&self, datum: &str) -> Option<&DatumEntry> {
        self.entries.iter().find(|entry| entry.datum_name == datum)
    }

    pub fn pivot(&self) -> Option<&DatumEntry> {
        if self.has_pivot {
            self.entries.first()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct DepthTarget {
    lidar_to_camera: Pose,
    intrinsics: CameraIntrinsics,
    width: u32,
    height: u32,
}

struct DepthPlan<'a> {
    source: &'a str,
    record: &'a DatumRecord,
    /// Aligned with the synchronizer's datums; `Some` for cameras.
    targets: Vec<Option<DepthTarget>>,
}

/// Resolves each requested datum's record at a sample's timestamp and
/// assembles the synchronized sample.
///
/// Holds no mutable state: assembling is `&self` and may run concurrently
/// for different samples.
pub struct DatumSynchronizer {
    datums: Vec<String>,
    pivot: Option<String>,
    annotations: Vec<String>,
    depth_source: Option<String>,
    tolerance_us: u64,
    load_payloads: bool,
    loader: Arc<dyn PayloadLoader>,
    projector: DepthProjector,
}

impl DatumSynchronizer {
    /// The pivot, when given, is placed first; repeated names are dropped.
    pub fn new<S: Into<String>>(
        datum_names: impl IntoIterator<Item = S>,
        pivot: Option<String>,
        loader: Arc<dyn PayloadLoader>,
    ) -> Self {
        let mut datums: Vec<String> = pivot.iter().cloned().collect();
        for name in datum_names {
            let name = name.into();
            if !datums.contains(&name) {
                datums.push(name);
            }
        }
        Self {
            datums,
            pivot,
            annotations: Vec::new(),
            depth_source: None,
            tolerance_us: DEFAULT_SYNC_TOLERANCE_US,
            load_payloads: true,
            loader,
            projector: DepthProjector::new(),
        }
    }

    pub fn with_annotations<S: Into<String>>(mut self, annotations: impl IntoIterator<Item = S>) -> Self {
        self.annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    /// Project this point cloud datum into every requested camera.
    pub fn with_depth_from(mut self, source: Option<String>) -> Self {
        self.depth_source = source;
        self
    }

    pub fn with_tolerance(mut self, tolerance_us: u64) -> Self {
        self.tolerance_us = tolerance_us;
        self
    }

    /// When disabled, entries carry record references only.
    pub fn with_payloads(mut self, load: bool) -> Self {
        self.load_payloads = load;
        self
    }

    /// Datums in entry order.
    pub fn datum_names(&self) -> &[String] {
        &self.datums
    }

    pub fn pivot(&self) -> Option<&str> {
        self.pivot.as_deref()
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn depth_source(&self) -> Option<&str> {
        self.depth_source.as_deref()
    }

    pub fn tolerance_us(&self) -> u64 {
        self.tolerance_us
    }

    /// Sample boundaries implied by this synchronizer: the pivot's timestamps,
    /// or the first datum's recording order without a pivot.
    pub fn reference(&self) -> Option<SampleReference> {
        match &self.pivot {
            Some(pivot) => Some(SampleReference::pivot(pivot.as_str())),
            None => self.datums.first().map(|d| SampleReference::recording(d.as_str())),
        }
    }

    /// The record of `datum` nearest to `timestamp`, within tolerance.
    pub fn record_at<'a>(
        &self,
        scene: &'a Scene,
        datum: &str,
        timestamp: u64,
    ) -> Result<&'a DatumRecord, SyncError> {
        let stream = scene.stream(datum).ok_or_else(|| SyncError::MissingDatum {
            scene: scene.name().to_string(),
            datum: datum.to_string(),
        })?;
        let record = stream.nearest(timestamp).ok_or_else(|| SyncError::Empty {
            scene: scene.name().to_string(),
            datum: datum.to_string(),
        })?;
        let delta_us = record.timestamp().abs_diff(timestamp);
        if delta_us > self.tolerance_us {
            return Err(SyncError::OutOfTolerance {
                scene: scene.name().to_string(),
                datum: datum.to_string(),
                timestamp,
                nearest: record.timestamp(),
                delta_us,
                tolerance_us: self.tolerance_us,
            });
        }
        Ok(record)
    }

    /// Reference timestamp of the sample at flat position `flat`.
    pub fn reference_timestamp(&self, index: &SceneIndex, flat: usize) -> Result<u64, SampleError> {
        let (scene, sample) = locate(index, flat)?;
        Ok(reference_record(index, scene, sample)?.timestamp())
    }

    /// Assemble the sample at flat position `flat`.
    pub fn assemble(&self, index: &SceneIndex, flat: usize) -> Result<SynchronizedSample, SampleError> {
        self.assemble_cancellable(index, flat, &CancelToken::new())
    }

    /// Like [`DatumSynchronizer::assemble`], but stops loading payloads once
    /// `cancel` fires. Entries not loaded by then carry
    /// [`PayloadError::Cancelled`].
    #[tracing::instrument(level = "debug", skip(self, index, cancel))]
    pub fn assemble_cancellable(
        &self,
        index: &SceneIndex,
        flat: usize,
        cancel: &CancelToken,
    ) -> Result<SynchronizedSample, SampleError> {
        let (scene, sample) = locate(index, flat)?;
        let timestamp = reference_record(index, scene, sample)?.timestamp();

        let records = self
            .datums
            .iter()
            .map(|datum| self.record_at(scene, datum, timestamp))
            .collect::<Result<Vec<_>, _>>()?;
        let plan = self.plan_depth(scene, &records, timestamp)?;

        let mut payloads: Vec<Option<Result<DatumPayload, Arc<PayloadError>>>> = records
            .iter()
            .map(|record| {
                self.load_payloads
                    .then(|| self.load(record, cancel).map_err(Arc::new))
            })
            .collect();

        let mut depths: Vec<Option<Result<DepthMap, Arc<PayloadError>>>> = vec![None; records.len()];
        if let Some(plan) = plan.filter(|plan| plan.targets.iter().any(Option::is_some)) {
            let loaded;
            let not_a_cloud = || {
                Arc::new(PayloadError::PointCloud(ddad_data::PlyError::Parse(
                    "depth source did not decode to a point cloud".into(),
                )))
            };
            let cached = self
                .datums
                .iter()
                .position(|datum| datum == plan.source)
                .and_then(|i| payloads[i].as_ref());
            let cloud: Result<&PointCloud, Arc<PayloadError>> = match cached {
                // a failed source payload is shared, never reloaded
                Some(Err(err)) => Err(Arc::clone(err)),
                Some(Ok(payload)) => payload.as_point_cloud().ok_or_else(not_a_cloud),
                None => match self.load(plan.record, cancel) {
                    Ok(payload) => {
                        loaded = payload;
                        loaded.as_point_cloud().ok_or_else(not_a_cloud)
                    }
                    Err(err) => Err(Arc::new(err)),
                },
            };

            for (slot, target) in depths.iter_mut().zip(&plan.targets) {
                let Some(target) = target else { continue };
                *slot = Some(match &cloud {
                    Ok(cloud) => Ok(self.projector.project(
                        cloud,
                        &target.lidar_to_camera,
                        &target.intrinsics,
                        target.width,
                        target.height,
                    )?),
                    Err(err) => Err(Arc::clone(err)),
                });
            }
        }

        let calibration = scene.calibration();
        let entries = self
            .datums
            .iter()
            .zip(records)
            .zip(payloads.iter_mut().zip(depths))
            .map(|((datum, record), (payload, depth))| DatumEntry {
                datum_name: datum.clone(),
                record: record.clone(),
                calibration: calibration.get(datum).copied(),
                annotations: self
                    .annotations
                    .iter()
                    .filter_map(|name| {
                        record
                            .annotation(name)
                            .map(|path| (name.clone(), path.to_path_buf()))
                    })
                    .collect(),
                payload: payload.take(),
                depth,
            })
            .collect();

        debug!(
            "Assembled sample {} of scene '{}' at {}us",
            flat,
            scene.name(),
            timestamp
        );
        Ok(SynchronizedSample {
            scene: Arc::clone(scene),
            sample,
            timestamp,
            entries,
            has_pivot: self.pivot.is_some(),
        })
    }

    fn load(&self, record: &DatumRecord, cancel: &CancelToken) -> Result<DatumPayload, PayloadError> {
        if cancel.is_cancelled() {
            return Err(PayloadError::Cancelled);
        }
        self.loader.load(record).inspect_err(|err| {
            warn!(
                "Failed to load {}: {}",
                record.payload_path().display(),
                err
            );
        })
    }

    fn plan_depth<'a>(
        &'a self,
        scene: &'a Scene,
        records: &[&'a DatumRecord],
        timestamp: u64,
    ) -> Result<Option<DepthPlan<'a>>, SampleError> {
        let Some(source) = self.depth_source.as_deref() else {
            return Ok(None);
        };
        let record = self.record_at(scene, source, timestamp)?;
        if !record.has_point_cloud_payload() {
            return Err(ProjectionError::NotAPointCloud {
                datum: source.to_string(),
            }
            .into());
        }

        let calibration = scene.calibration();
        let missing = |datum: &str| ProjectionError::MissingCalibration {
            scene: scene.name().to_string(),
            datum: datum.to_string(),
        };
        if !calibration.contains(source) {
            return Err(missing(source).into());
        }

        let mut targets = Vec::with_capacity(records.len());
        for (datum, record) in self.datums.iter().zip(records) {
            let Some((width, height)) = record.image_size() else {
                targets.push(None);
                continue;
            };
            let camera = calibration.get(datum).ok_or_else(|| missing(datum.as_str()))?;
            let intrinsics = camera.intrinsics.ok_or_else(|| ProjectionError::MissingIntrinsics {
                scene: scene.name().to_string(),
                datum: datum.clone(),
            })?;
            let lidar_to_camera = calibration
                .relative_pose(source, datum)
                .ok_or_else(|| missing(datum.as_str()))?;
            targets.push(Some(DepthTarget {
                lidar_to_camera,
                intrinsics,
                width,
                height,
            }));
        }

        Ok(Some(DepthPlan {
            source,
            record,
            targets,
        }))
    }
}

fn locate(index: &SceneIndex, flat: usize) -> Result<(&Arc<Scene>, GlobalSample), IndexError> {
    let out_of_bounds = IndexError {
        index: flat,
        len: index.flat_len(),
    };
    let sample = index.locate(flat).ok_or(out_of_bounds)?;
    let scene = index.scene(sample.scene).ok_or(out_of_bounds)?;
    Ok((scene, sample))
}

fn reference_record<'a>(
    index: &SceneIndex,
    scene: &'a Scene,
    sample: GlobalSample,
) -> Result<&'a DatumRecord, SyncError> {
    scene
        .reference_record(index.reference(), sample.local)
        .ok_or_else(|| SyncError::MissingDatum {
            scene: scene.name().to_string(),
            datum: index.reference().datum.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryLoader, SceneBuilder, index_of};
    use approx::assert_relative_eq;

    fn synchronizer(loader: Arc<MemoryLoader>) -> DatumSynchronizer {
        DatumSynchronizer::new(["CAMERA_01", "CAMERA_05"], Some("lidar".into()), loader)
    }

    #[test]
    fn test_entries_pivot_first_in_request_order() {
        let index = index_of(vec![SceneBuilder::new("s", 3).cameras(&["CAMERA_01", "CAMERA_05"]).build()]);
        let sync = DatumSynchronizer::new(
            ["CAMERA_05", "lidar", "CAMERA_01"],
            Some("lidar".into()),
            Arc::new(MemoryLoader::default()),
        );
        let sample = sync.assemble(&index, 1).unwrap();
        let names: Vec<&str> = sample.entries.iter().map(|e| e.datum_name.as_str()).collect();
        assert_eq!(names, vec!["lidar", "CAMERA_05", "CAMERA_01"]);
        assert_eq!(sample.pivot().unwrap().datum_name, "lidar");
        assert!(sample.entries.iter().all(|e| e.timestamp() == sample.timestamp));
        assert_eq!(sample.timestamp, 100_000);
        assert!(sample.entry("CAMERA_01").unwrap().image().is_some());
        assert!(sample.entry("lidar").unwrap().point_cloud().is_some());
    }

    #[test]
    fn test_tolerance() {
        let scene = SceneBuilder::new("s", 3).camera_offset(400).build();
        let index = index_of(vec![scene]);
        let loader = Arc::new(MemoryLoader::default());

        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), loader.clone());
        let sample = sync.assemble(&index, 2).unwrap();
        assert_eq!(sample.entry("CAMERA_01").unwrap().timestamp(), 200_400);

        let exact = sync.with_tolerance(0);
        let err = exact.assemble(&index, 2).unwrap_err();
        assert!(matches!(
            err,
            SampleError::Sync(SyncError::OutOfTolerance { delta_us: 400, .. })
        ));

        let loose = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), loader).with_tolerance(500);
        assert!(loose.assemble(&index, 0).is_ok());
    }

    #[test]
    fn test_missing_datum_is_sync_error() {
        let index = index_of(vec![SceneBuilder::new("s", 2).build()]);
        let sync = synchronizer(Arc::new(MemoryLoader::default()));
        let err = sync.assemble(&index, 0).unwrap_err();
        assert!(matches!(err, SampleError::Sync(SyncError::MissingDatum { datum, .. }) if datum == "CAMERA_05"));
    }

    #[test]
    fn test_out_of_range_flat() {
        let index = index_of(vec![SceneBuilder::new("s", 2).build()]);
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), Arc::new(MemoryLoader::default()));
        assert!(matches!(sync.assemble(&index, 2).unwrap_err(), SampleError::Index(_)));
    }

    #[test]
    fn test_annotations_resolved_when_present() {
        let scene = SceneBuilder::new("s", 4).annotated(|i| i % 2 == 0).build();
        let index = index_of(vec![scene]);
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), Arc::new(MemoryLoader::default()))
            .with_annotations(["semantic_segmentation_2d", "instance_segmentation_2d"]);

        let annotated = sync.assemble(&index, 0).unwrap();
        let camera = annotated.entry("CAMERA_01").unwrap();
        assert_eq!(camera.annotations.len(), 1);
        assert!(camera.annotations["semantic_segmentation_2d"].ends_with("semantic_segmentation_2d/CAMERA_01/0.png"));

        let bare = sync.assemble(&index, 1).unwrap();
        assert!(bare.entry("CAMERA_01").unwrap().annotations.is_empty());
        assert!(bare.entry("lidar").unwrap().annotations.is_empty());
    }

    #[test]
    fn test_depth_attached_to_cameras() {
        let index = index_of(vec![SceneBuilder::new("s", 2).cameras(&["CAMERA_01", "CAMERA_05"]).build()]);
        let loader = Arc::new(MemoryLoader::default());
        let sync = synchronizer(loader.clone()).with_depth_from(Some("lidar".into()));
        let sample = sync.assemble(&index, 0).unwrap();

        assert!(sample.entry("lidar").unwrap().depth.is_none());
        for camera in ["CAMERA_01", "CAMERA_05"] {
            let depth = sample.entry(camera).unwrap().depth_map().unwrap();
            assert_eq!((depth.width(), depth.height()), (8, 6));
            assert_relative_eq!(depth.depth(4, 3).unwrap(), 3.0);
        }
        // the pivot cloud is reused for projection
        assert_eq!(loader.point_cloud_loads(), 1);
    }

    #[test]
    fn test_depth_without_payloads() {
        let index = index_of(vec![SceneBuilder::new("s", 2).build()]);
        let loader = Arc::new(MemoryLoader::default());
        let sync = DatumSynchronizer::new(["CAMERA_01"], None, loader.clone())
            .with_depth_from(Some("lidar".into()))
            .with_payloads(false);
        let sample = sync.assemble(&index, 1).unwrap();
        assert!(sample.pivot().is_none());
        let camera = sample.entry("CAMERA_01").unwrap();
        assert!(camera.payload.is_none());
        assert!(camera.depth_map().is_some());
        assert_eq!(loader.point_cloud_loads(), 1);
    }

    #[test]
    fn test_missing_calibration_is_projection_error() {
        let index = index_of(vec![SceneBuilder::new("s", 2).without_calibration().build()]);
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), Arc::new(MemoryLoader::default()))
            .with_depth_from(Some("lidar".into()));
        let err = sync.assemble(&index, 0).unwrap_err();
        assert!(matches!(err, SampleError::Projection(ProjectionError::MissingCalibration { .. })));
    }

    #[test]
    fn test_depth_source_must_be_point_cloud() {
        let index = index_of(vec![SceneBuilder::new("s", 2).build()]);
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), Arc::new(MemoryLoader::default()))
            .with_depth_from(Some("CAMERA_01".into()));
        let err = sync.assemble(&index, 0).unwrap_err();
        assert!(matches!(err, SampleError::Projection(ProjectionError::NotAPointCloud { .. })));
    }

    #[test]
    fn test_failed_payload_only_affects_its_entry() {
        let index = index_of(vec![SceneBuilder::new("s", 2).cameras(&["CAMERA_01", "CAMERA_05"]).build()]);
        let loader = Arc::new(MemoryLoader::failing_on("CAMERA_05/1."));
        let sync = synchronizer(loader);

        let sample = sync.assemble(&index, 1).unwrap();
        assert!(matches!(
            &sample.entry("CAMERA_05").unwrap().payload,
            Some(Err(err)) if matches!(**err, PayloadError::Io(_))
        ));
        assert!(sample.entry("CAMERA_01").unwrap().image().is_some());
        assert!(sample.entry("lidar").unwrap().point_cloud().is_some());

        assert!(sync.assemble(&index, 0).unwrap().entry("CAMERA_05").unwrap().image().is_some());
    }

    #[test]
    fn test_failed_cloud_shared_by_cameras() {
        let index = index_of(vec![SceneBuilder::new("s", 1).cameras(&["CAMERA_01", "CAMERA_05"]).build()]);
        let loader = Arc::new(MemoryLoader::failing_on("lidar/0."));
        let sync = synchronizer(loader.clone()).with_depth_from(Some("lidar".into()));
        let sample = sync.assemble(&index, 0).unwrap();
        let Some(Err(cloud_err)) = &sample.entry("lidar").unwrap().payload else {
            panic!("lidar payload should have failed");
        };
        for camera in ["CAMERA_01", "CAMERA_05"] {
            let Some(Err(depth_err)) = &sample.entry(camera).unwrap().depth else {
                panic!("{camera} depth should have failed");
            };
            assert!(Arc::ptr_eq(cloud_err, depth_err));
            assert!(sample.entry(camera).unwrap().image().is_some());
        }
        // the failed pivot cloud is not loaded a second time for depth
        assert_eq!(loader.point_cloud_loads(), 1);
    }

    #[test]
    fn test_depth_sized_from_record_metadata() {
        let index = index_of(vec![SceneBuilder::new("s", 1).image_size(4, 3).build()]);
        let loader = Arc::new(MemoryLoader::default());
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), loader.clone())
            .with_depth_from(Some("lidar".into()));
        let sample = sync.assemble(&index, 0).unwrap();
        let camera = sample.entry("CAMERA_01").unwrap();
        // the loader serves 8x6 images, which disagree with the recorded 4x3
        assert!(matches!(
            &camera.payload,
            Some(Err(err)) if matches!(**err, PayloadError::SizeMismatch { .. })
        ));
        let depth = camera.depth_map().unwrap();
        assert_eq!((depth.width(), depth.height()), (4, 3));
        assert_relative_eq!(depth.depth(2, 1).unwrap(), 3.0);
        assert_eq!(loader.image_loads(), 1);
    }

    #[test]
    fn test_cancelled_assembly() {
        let index = index_of(vec![SceneBuilder::new("s", 1).build()]);
        let loader = Arc::new(MemoryLoader::default());
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), loader.clone());
        let cancel = CancelToken::new();
        cancel.cancel();
        let sample = sync.assemble_cancellable(&index, 0, &cancel).unwrap();
        assert!(sample
            .entries
            .iter()
            .all(|e| matches!(&e.payload, Some(Err(err)) if matches!(**err, PayloadError::Cancelled))));
        assert_eq!(loader.point_cloud_loads(), 0);
        assert_eq!(loader.image_loads(), 0);
    }

    #[test]
    fn test_reference_without_pivot() {
        let sync = DatumSynchronizer::new(["CAMERA_01", "lidar"], None, Arc::new(MemoryLoader::default()));
        assert_eq!(sync.reference(), Some(SampleReference::recording("CAMERA_01")));
        let sync = DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), Arc::new(MemoryLoader::default()));
        assert_eq!(sync.reference(), Some(SampleReference::pivot("lidar")));
    }
}
