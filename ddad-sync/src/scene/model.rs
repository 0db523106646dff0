//! Scene representation

use crate::scene::index::{SampleOrder, SampleReference};
use crate::scene::record::{DatumRecord, DatumStream};
use ddad_data::{Calibration, DatasetManifest, ManifestError, Ontology, SceneDescription, Split};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One recorded drive: every datum stream plus the calibration and
/// ontologies shared by all of its samples.
///
/// Immutable after construction.
#[derive(Debug)]
pub struct Scene {
    name: String,
    log: Option<String>,
    streams: Vec<DatumStream>,
    calibration: Arc<Calibration>,
    ontologies: BTreeMap<String, Arc<Ontology>>,
}

impl Scene {
    pub fn from_description(description: SceneDescription) -> Self {
        let streams = description
            .datums
            .iter()
            .map(|table| DatumStream::from_table(table, &description.directory))
            .collect();
        Self {
            name: description.name,
            log: description.log,
            streams,
            calibration: Arc::new(description.calibration),
            ontologies: description
                .ontologies
                .into_iter()
                .map(|(name, ontology)| (name, Arc::new(ontology)))
                .collect(),
        }
    }

    /// Every scene of `split`, in manifest order.
    pub fn load_split(manifest: &DatasetManifest, split: Split) -> Result<Vec<Self>, ManifestError> {
        Ok(manifest
            .load_scenes(split)?
            .into_iter()
            .map(Self::from_description)
            .collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    /// Datum streams in scene-file order.
    pub fn streams(&self) -> &[DatumStream] {
        &self.streams
    }

    pub fn stream(&self, datum: &str) -> Option<&DatumStream> {
        self.streams.iter().find(|stream| stream.name() == datum)
    }

    pub fn calibration(&self) -> &Arc<Calibration> {
        &self.calibration
    }

    /// Ontology of an annotation type.
    pub fn ontology(&self, annotation: &str) -> Option<&Arc<Ontology>> {
        self.ontologies.get(annotation)
    }

    /// Number of samples when `reference` defines sample boundaries.
    pub fn sample_count(&self, reference: &SampleReference) -> usize {
        self.stream(&reference.datum).map_or(0, DatumStream::len)
    }

    /// The reference record of local sample `local`.
    pub fn reference_record(
        &self,
        reference: &SampleReference,
        local: usize,
    ) -> Option<&DatumRecord> {
        let stream = self.stream(&reference.datum)?;
        match reference.order {
            SampleOrder::Timestamp => stream.by_time(local),
            SampleOrder::Recording => stream.recorded(local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SceneBuilder;

    #[test]
    fn test_scene_from_description() {
        let scene = SceneBuilder::new("000042", 4).cameras(&["CAMERA_01"]).build();
        assert_eq!(scene.name(), "000042");
        assert_eq!(scene.streams().len(), 2);
        assert!(scene.stream("lidar").unwrap().is_lidar());
        assert!(scene.stream("CAMERA_01").unwrap().is_camera());
        assert!(scene.stream("CAMERA_09").is_none());
        assert!(scene.calibration().contains("CAMERA_01"));
        assert!(scene.ontology("semantic_segmentation_2d").is_some());
    }

    #[test]
    fn test_reference_record_order() {
        // lidar recorded out of order: 300, 100, 200, 0
        let scene = SceneBuilder::new("s", 4)
            .lidar_timestamps(vec![300, 100, 200, 0])
            .build();
        let by_time = SampleReference::pivot("lidar");
        let recorded = SampleReference::recording("lidar");

        let t: Vec<u64> = (0..4)
            .map(|i| scene.reference_record(&by_time, i).unwrap().timestamp())
            .collect();
        assert_eq!(t, vec![0, 100, 200, 300]);

        let t: Vec<u64> = (0..4)
            .map(|i| scene.reference_record(&recorded, i).unwrap().timestamp())
            .collect();
        assert_eq!(t, vec![300, 100, 200, 0]);

        assert_eq!(scene.sample_count(&by_time), 4);
        assert_eq!(scene.sample_count(&SampleReference::pivot("radar")), 0);
    }
}
