//! Random access over synchronized samples of one dataset split

use crate::config::DatasetConfig;
use crate::error::{ConfigError, DatasetError, IndexError, SampleError};
use crate::ingest::{CancelToken, FsPayloadLoader, PayloadLoader};
use crate::scene::{Scene, SceneIndex, TemporalWindower};
use crate::sync::{AnnotationFilter, DatumSynchronizer, SynchronizedSample};
use ddad_data::{DatasetManifest, DatasetMetadata, ManifestError, Ontology};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// What one dataset position yields.
#[derive(Debug)]
pub enum DatasetItem {
    /// No temporal context configured.
    Sample(SynchronizedSample),
    /// `backward + 1 + forward` consecutive samples, oldest first.
    Window(Vec<SynchronizedSample>),
}

impl DatasetItem {
    /// Samples in time order; a single sample without context.
    pub fn samples(&self) -> &[SynchronizedSample] {
        match self {
            DatasetItem::Sample(sample) => std::slice::from_ref(sample),
            DatasetItem::Window(samples) => samples,
        }
    }

    pub fn into_samples(self) -> Vec<SynchronizedSample> {
        match self {
            DatasetItem::Sample(sample) => vec![sample],
            DatasetItem::Window(samples) => samples,
        }
    }
}

/// A split of a driving dataset, indexed once and read concurrently.
///
/// Construction decides which samples are addressable (temporal context,
/// annotation coverage). Afterwards [`SynchronizedDataset::len`] is fixed and
/// [`SynchronizedDataset::get`] only fails for per-sample reasons.
pub struct SynchronizedDataset {
    config: DatasetConfig,
    metadata: DatasetMetadata,
    index: SceneIndex,
    windower: TemporalWindower,
    synchronizer: DatumSynchronizer,
}

impl SynchronizedDataset {
    /// Build from disk, decoding payloads with [`FsPayloadLoader`].
    pub fn new(config: DatasetConfig) -> Result<Self, DatasetError> {
        Self::with_loader(config, Arc::new(FsPayloadLoader))
    }

    #[tracing::instrument(skip_all, fields(manifest = %config.manifest_path.display(), split = %config.split))]
    pub fn with_loader(
        config: DatasetConfig,
        loader: Arc<dyn PayloadLoader>,
    ) -> Result<Self, DatasetError> {
        config.validate()?;
        let manifest = DatasetManifest::load(&config.manifest_path)?;
        let scenes = Scene::load_split(&manifest, config.split)?;
        let metadata = manifest.metadata().clone();
        Self::build(config, metadata, scenes, manifest.path(), loader)
    }

    /// Build over scenes that are already loaded.
    pub fn from_scenes(
        config: DatasetConfig,
        metadata: DatasetMetadata,
        scenes: Vec<Scene>,
        loader: Arc<dyn PayloadLoader>,
    ) -> Result<Self, DatasetError> {
        config.validate()?;
        let source = config.manifest_path.clone();
        Self::build(config, metadata, scenes, &source, loader)
    }

    fn build(
        config: DatasetConfig,
        metadata: DatasetMetadata,
        scenes: Vec<Scene>,
        source: &Path,
        loader: Arc<dyn PayloadLoader>,
    ) -> Result<Self, DatasetError> {
        // configured pivot, else a requested LiDAR, else any LiDAR of the first scene
        let pivot = config.pivot_datum_name.clone().or_else(|| {
            let first = scenes.first()?;
            config
                .datum_names
                .iter()
                .find(|datum| first.stream(datum).is_some_and(|stream| stream.is_lidar()))
                .cloned()
                .or_else(|| {
                    first
                        .streams()
                        .iter()
                        .find(|stream| stream.is_lidar())
                        .map(|stream| stream.name().to_string())
                })
        });

        for scene in &scenes {
            for datum in config.datum_names.iter().chain(pivot.iter()) {
                if scene.stream(datum).is_none() {
                    return Err(ManifestError::Invalid {
                        path: source.to_path_buf(),
                        reason: format!("scene '{}' has no datum '{}'", scene.name(), datum),
                    }
                    .into());
                }
            }
            if let Some(depth) = &config.generate_depth_from_datum {
                if !scene.stream(depth).is_some_and(|stream| stream.is_lidar()) {
                    return Err(ConfigError::DepthSourceNotPointCloud(depth.clone()).into());
                }
            }
        }

        let synchronizer = DatumSynchronizer::new(config.datum_names.iter().cloned(), pivot, loader)
            .with_annotations(config.requested_annotations.iter().cloned())
            .with_depth_from(config.generate_depth_from_datum.clone())
            .with_tolerance(config.sync_tolerance_us)
            .with_payloads(config.load_payloads);
        let reference = synchronizer.reference().ok_or(ConfigError::NoDatums)?;

        let index = SceneIndex::from_scenes(scenes, reference, source)?;
        let windower = TemporalWindower::new(config.backward_context, config.forward_context);
        let index = windower.prune(index);
        let index = AnnotationFilter::new(
            config.requested_annotations.iter().cloned(),
            config.datum_names.iter().cloned(),
            config.only_annotated_datums,
        )
        .with_depth_source(config.generate_depth_from_datum.clone())
        .filter(index, &windower, &synchronizer);

        if index.is_empty() {
            warn!("No samples left in split '{}'", config.split);
        }
        info!(
            "Dataset ready: {} samples from {} scenes, datums {:?}, pivot {:?}",
            index.len(),
            index.scene_count(),
            synchronizer.datum_names(),
            synchronizer.pivot()
        );

        Ok(Self {
            config,
            metadata,
            index,
            windower,
            synchronizer,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The item at `position`, `0 <= position < len()`.
    pub fn get(&self, position: usize) -> Result<DatasetItem, SampleError> {
        self.get_cancellable(position, &CancelToken::new())
    }

    /// Like [`SynchronizedDataset::get`], stopping payload loads once
    /// `cancel` fires.
    pub fn get_cancellable(
        &self,
        position: usize,
        cancel: &CancelToken,
    ) -> Result<DatasetItem, SampleError> {
        let flat = self.index.flat_position(position)?;
        if self.windower.is_trivial() {
            let sample = self.synchronizer.assemble_cancellable(&self.index, flat, cancel)?;
            return Ok(DatasetItem::Sample(sample));
        }

        // pruning guarantees the window exists
        let window = self.windower.window(&self.index, flat).map_err(|_| IndexError {
            index: position,
            len: self.len(),
        })?;
        let samples = window
            .positions()
            .iter()
            .map(|&p| self.synchronizer.assemble_cancellable(&self.index, p, cancel))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DatasetItem::Window(samples))
    }

    /// Every item in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<DatasetItem, SampleError>> + '_ {
        (0..self.len()).map(|position| self.get(position))
    }

    /// Scene by manifest position.
    pub fn scene(&self, scene: usize) -> Option<&Arc<Scene>> {
        self.index.scene(scene)
    }

    pub fn scenes(&self) -> &[Arc<Scene>] {
        self.index.scenes()
    }

    /// Ontology of `annotation` in scene `scene`.
    pub fn ontology(&self, scene: usize, annotation: &str) -> Option<&Arc<Ontology>> {
        self.scene(scene)?.ontology(annotation)
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Resolved pivot datum.
    pub fn pivot(&self) -> Option<&str> {
        self.synchronizer.pivot()
    }

    pub fn index(&self) -> &SceneIndex {
        &self.index
    }

    pub fn synchronizer(&self) -> &DatumSynchronizer {
        &self.synchronizer
    }
}
