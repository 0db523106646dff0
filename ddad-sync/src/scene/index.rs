//! Flat sample index over all scenes of a split

use crate::error::IndexError;
use crate::scene::model::Scene;
use ddad_data::{DatasetManifest, ManifestError, Split};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// How the reference datum's records are ordered into samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrder {
    /// Ascending timestamp; used when the reference is the pivot datum.
    Timestamp,
    /// Recording order; used when no pivot is designated.
    Recording,
}

/// The datum whose records define sample boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReference {
    pub datum: String,
    pub order: SampleOrder,
}

impl SampleReference {
    /// Samples follow the pivot's timestamps.
    pub fn pivot(datum: impl Into<String>) -> Self {
        Self {
            datum: datum.into(),
            order: SampleOrder::Timestamp,
        }
    }

    /// Samples follow `datum` in recording order.
    pub fn recording(datum: impl Into<String>) -> Self {
        Self {
            datum: datum.into(),
            order: SampleOrder::Recording,
        }
    }
}

/// Location of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalSample {
    /// Scene position in manifest order.
    pub scene: usize,
    /// Sample position within the scene.
    pub local: usize,
    /// Position in the unpruned flat index.
    pub flat: usize,
}

/// Flat index over every sample of every scene.
///
/// Flat positions are contiguous and scene-contiguous: scene `s` owns
/// `offsets[s]..offsets[s + 1]`. The addressable positions are a sorted
/// subset of the flat positions; pruning (context, annotations) only ever
/// shrinks that subset, leaving flat positions stable.
#[derive(Debug, Clone)]
pub struct SceneIndex {
    scenes: Vec<Arc<Scene>>,
    offsets: Vec<usize>,
    reference: SampleReference,
    items: Vec<usize>,
}

impl SceneIndex {
    /// Read the manifest, load every scene of `split` and index it.
    #[tracing::instrument(skip_all, fields(path = %manifest_path.as_ref().display(), split = %split))]
    pub fn build(
        manifest_path: impl AsRef<Path>,
        split: Split,
        reference: SampleReference,
    ) -> Result<Self, ManifestError> {
        let manifest = DatasetManifest::load(manifest_path)?;
        let scenes = Scene::load_split(&manifest, split)?;
        Self::from_scenes(scenes, reference, manifest.path())
    }

    /// Index already loaded scenes. Every scene must contain the reference
    /// datum; `source` names the manifest in errors.
    pub fn from_scenes(
        scenes: Vec<Scene>,
        reference: SampleReference,
        source: &Path,
    ) -> Result<Self, ManifestError> {
        let mut offsets = Vec::with_capacity(scenes.len() + 1);
        offsets.push(0);
        for scene in &scenes {
            if scene.stream(&reference.datum).is_none() {
                return Err(ManifestError::Invalid {
                    path: source.to_path_buf(),
                    reason: format!(
                        "scene '{}' has no reference datum '{}'",
                        scene.name(),
                        reference.datum
                    ),
                });
            }
            let count = scene.sample_count(&reference);
            debug!("Scene '{}': {} samples", scene.name(), count);
            offsets.push(offsets[offsets.len() - 1] + count);
        }

        let total = offsets[offsets.len() - 1];
        info!(
            "Indexed {} samples across {} scenes (reference '{}', {:?} order)",
            total,
            scenes.len(),
            reference.datum,
            reference.order
        );

        Ok(Self {
            scenes: scenes.into_iter().map(Arc::new).collect(),
            offsets,
            reference,
            items: (0..total).collect(),
        })
    }

    /// Addressable sample count after pruning.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sample count before pruning.
    pub fn flat_len(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn scenes(&self) -> &[Arc<Scene>] {
        &self.scenes
    }

    pub fn scene(&self, scene: usize) -> Option<&Arc<Scene>> {
        self.scenes.get(scene)
    }

    pub fn reference(&self) -> &SampleReference {
        &self.reference
    }

    /// Flat positions owned by `scene`.
    pub fn scene_range(&self, scene: usize) -> Range<usize> {
        match (self.offsets.get(scene), self.offsets.get(scene + 1)) {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Flat position of addressable `position`.
    pub fn flat_position(&self, position: usize) -> Result<usize, IndexError> {
        self.items.get(position).copied().ok_or(IndexError {
            index: position,
            len: self.items.len(),
        })
    }

    /// Addressable flat positions in order.
    pub fn flat_positions(&self) -> &[usize] {
        &self.items
    }

    /// Scene and local index of a flat position.
    pub fn locate(&self, flat: usize) -> Option<GlobalSample> {
        if flat >= self.flat_len() {
            return None;
        }
        // first offset strictly greater than `flat`, minus one; empty scenes
        // share offsets and are skipped by this search
        let scene = self.offsets.partition_point(|&offset| offset <= flat) - 1;
        Some(GlobalSample {
            scene,
            local: flat - self.offsets[scene],
            flat,
        })
    }

    /// Sample at addressable `position`.
    pub fn sample(&self, position: usize) -> Result<GlobalSample, IndexError> {
        let flat = self.flat_position(position)?;
        // flat positions in `items` are always in range
        self.locate(flat).ok_or(IndexError {
            index: position,
            len: self.items.len(),
        })
    }

    /// Scene and local index at addressable `position`.
    pub fn resolve(&self, position: usize) -> Result<(&Arc<Scene>, usize), IndexError> {
        let sample = self.sample(position)?;
        Ok((&self.scenes[sample.scene], sample.local))
    }

    /// Keep only addressable positions whose flat position satisfies `keep`.
    pub fn retain(mut self, mut keep: impl FnMut(usize) -> bool) -> Self {
        let before = self.items.len();
        self.items.retain(|&flat| keep(flat));
        debug!("Pruned index from {} to {} samples", before, self.items.len());
        self
    }
}
