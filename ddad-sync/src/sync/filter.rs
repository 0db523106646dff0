//! Annotation-based sample filtering

use crate::scene::{DatumRecord, Scene, SceneIndex, TemporalWindower};
use crate::sync::synchronizer::DatumSynchronizer;
use tracing::{debug, info};

/// Annotation type satisfied on cameras by LiDAR depth generation.
pub const DEPTH_ANNOTATION: &str = "depth";

/// Keeps only samples where every requested datum's synchronized record
/// carries every requested annotation.
///
/// Only the requested datums are checked; a pivot added implicitly is not.
#[derive(Debug, Clone, Default)]
pub struct AnnotationFilter {
    requested: Vec<String>,
    datums: Vec<String>,
    only_annotated: bool,
    depth_source: Option<String>,
}

impl AnnotationFilter {
    pub fn new<A, D>(
        requested: impl IntoIterator<Item = A>,
        datums: impl IntoIterator<Item = D>,
        only_annotated: bool,
    ) -> Self
    where
        A: Into<String>,
        D: Into<String>,
    {
        Self {
            requested: requested.into_iter().map(Into::into).collect(),
            datums: datums.into_iter().map(Into::into).collect(),
            only_annotated,
            depth_source: None,
        }
    }

    /// Treat the `depth` annotation of camera records as present when depth
    /// can be projected from `source` in the record's scene.
    pub fn with_depth_source(mut self, source: Option<String>) -> Self {
        self.depth_source = source;
        self
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn datums(&self) -> &[String] {
        &self.datums
    }

    /// Whether filtering removes anything at all.
    pub fn is_active(&self) -> bool {
        self.only_annotated && !self.requested.is_empty() && !self.datums.is_empty()
    }

    /// Whether `record` of `datum` in `scene` carries every requested
    /// annotation.
    pub fn record_is_covered(&self, scene: &Scene, datum: &str, record: &DatumRecord) -> bool {
        self.requested.iter().all(|name| {
            record.annotation(name).is_some()
                || (name == DEPTH_ANNOTATION && self.generates_depth(scene, datum, record))
        })
    }

    /// Projection needs the source-to-camera pose and the camera intrinsics.
    fn generates_depth(&self, scene: &Scene, datum: &str, record: &DatumRecord) -> bool {
        let Some(source) = self.depth_source.as_deref() else {
            return false;
        };
        let calibration = scene.calibration();
        record.has_image_payload()
            && calibration.relative_pose(source, datum).is_some()
            && calibration
                .get(datum)
                .is_some_and(|camera| camera.intrinsics.is_some())
    }

    /// Whether every datum of the sample at flat position `flat` resolves to
    /// a covered record.
    pub fn is_covered(&self, index: &SceneIndex, flat: usize, synchronizer: &DatumSynchronizer) -> bool {
        let Ok(timestamp) = synchronizer.reference_timestamp(index, flat) else {
            return false;
        };
        let Some(scene) = index.locate(flat).and_then(|sample| index.scene(sample.scene)) else {
            return false;
        };
        self.datums.iter().all(|datum| {
            synchronizer
                .record_at(scene, datum, timestamp)
                .is_ok_and(|record| self.record_is_covered(scene, datum, record))
        })
    }

    /// Drop every addressable sample whose context window contains an
    /// uncovered sample. Coverage is computed at most once per flat position.
    pub fn filter(
        &self,
        index: SceneIndex,
        windower: &TemporalWindower,
        synchronizer: &DatumSynchronizer,
    ) -> SceneIndex {
        if !self.is_active() {
            return index;
        }

        let mut coverage: Vec<Option<bool>> = vec![None; index.flat_len()];
        let mut covered = |flat: usize| -> bool {
            *coverage[flat].get_or_insert_with(|| self.is_covered(&index, flat, synchronizer))
        };

        let kept = index.clone().retain(|flat| match windower.window(&index, flat) {
            Ok(window) => window.positions().iter().all(|&p| covered(p)),
            Err(_) => false,
        });

        debug!(
            "Checked annotation coverage of {} flat positions",
            coverage.iter().filter(|c| c.is_some()).count()
        );
        info!(
            "Annotation filter {:?} kept {} of {} samples",
            self.requested,
            kept.len(),
            index.len()
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryLoader, SceneBuilder, index_of};
    use std::sync::Arc;

    const SEMANTIC: &str = "semantic_segmentation_2d";

    fn synchronizer() -> DatumSynchronizer {
        DatumSynchronizer::new(["CAMERA_01"], Some("lidar".into()), Arc::new(MemoryLoader::default()))
    }

    #[test]
    fn test_sparse_annotations() {
        // 50 of 3950 camera samples carry semantic segmentation
        let scene = SceneBuilder::new("s", 3950).annotated(|i| i % 79 == 0).build();
        let index = index_of(vec![scene]);
        let filter = AnnotationFilter::new([SEMANTIC], ["CAMERA_01"], true);
        let kept = filter.filter(index, &TemporalWindower::default(), &synchronizer());
        assert_eq!(kept.len(), 50);
        assert!(kept.flat_positions().iter().all(|flat| flat % 79 == 0));
    }

    #[test]
    fn test_inactive_filter_keeps_everything() {
        let scene = SceneBuilder::new("s", 10).annotated(|_| false).build();
        let sync = synchronizer();
        let off = AnnotationFilter::new([SEMANTIC], ["CAMERA_01"], false);
        assert_eq!(off.filter(index_of(vec![scene]), &TemporalWindower::default(), &sync).len(), 10);

        let scene = SceneBuilder::new("s", 10).annotated(|_| false).build();
        let nothing_requested = AnnotationFilter::new(Vec::<String>::new(), ["CAMERA_01"], true);
        assert_eq!(
            nothing_requested
                .filter(index_of(vec![scene]), &TemporalWindower::default(), &sync)
                .len(),
            10
        );
    }

    #[test]
    fn test_monotonic_in_requested_annotations() {
        let scene = || {
            SceneBuilder::new("s", 40)
                .annotated(|i| i % 3 != 0)
                .build()
        };
        let sync = synchronizer();
        let windower = TemporalWindower::default();
        let one = AnnotationFilter::new([SEMANTIC], ["CAMERA_01"], true).filter(index_of(vec![scene()]), &windower, &sync);
        let two = AnnotationFilter::new([SEMANTIC, "instance_segmentation_2d"], ["CAMERA_01"], true)
            .filter(index_of(vec![scene()]), &windower, &sync);
        assert!(two.len() <= one.len());
        assert!(two.flat_positions().iter().all(|p| one.flat_positions().contains(p)));
        // no camera record carries instance segmentation
        assert!(two.is_empty());
    }

    #[test]
    fn test_whole_window_must_be_covered() {
        // samples 0..10, sample 5 unannotated
        let scene = SceneBuilder::new("s", 10).annotated(|i| i != 5).build();
        let windower = TemporalWindower::new(1, 1);
        let index = windower.prune(index_of(vec![scene]));
        let kept = AnnotationFilter::new([SEMANTIC], ["CAMERA_01"], true).filter(index, &windower, &synchronizer());
        assert_eq!(kept.flat_positions(), &[1, 2, 3, 7, 8]);
    }

    #[test]
    fn test_generated_depth_counts_as_annotation() {
        let scene = || SceneBuilder::new("s", 5).annotated(|_| false).build();
        let sync = synchronizer();
        let windower = TemporalWindower::default();

        let without = AnnotationFilter::new([DEPTH_ANNOTATION], ["CAMERA_01"], true)
            .filter(index_of(vec![scene()]), &windower, &sync);
        assert!(without.is_empty());

        let with = AnnotationFilter::new([DEPTH_ANNOTATION], ["CAMERA_01"], true)
            .with_depth_source(Some("lidar".into()))
            .filter(index_of(vec![scene()]), &windower, &sync);
        assert_eq!(with.len(), 5);

        // generated depth never covers a LiDAR record
        let lidar = AnnotationFilter::new([DEPTH_ANNOTATION], ["lidar", "CAMERA_01"], true)
            .with_depth_source(Some("lidar".into()))
            .filter(index_of(vec![scene()]), &windower, &sync);
        assert!(lidar.is_empty());
    }

    #[test]
    fn test_generated_depth_needs_calibration() {
        let scene = SceneBuilder::new("s", 5)
            .annotated(|_| false)
            .without_calibration()
            .build();
        let kept = AnnotationFilter::new([DEPTH_ANNOTATION], ["CAMERA_01"], true)
            .with_depth_source(Some("lidar".into()))
            .filter(index_of(vec![scene]), &TemporalWindower::default(), &synchronizer());
        assert!(kept.is_empty());

        let scene = SceneBuilder::new("s", 5).annotated(|_| false).build();
        let other_source = AnnotationFilter::new([DEPTH_ANNOTATION], ["CAMERA_01"], true)
            .with_depth_source(Some("LIDAR_TOP".into()))
            .filter(index_of(vec![scene]), &TemporalWindower::default(), &synchronizer());
        assert!(other_source.is_empty());
    }
}
