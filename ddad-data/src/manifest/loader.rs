//! Manifest loading functions

use super::error::ManifestError;
use super::schema::{DatasetFile, DatasetMetadata, DatumTable, DatumType, SceneFile};
use crate::calibration::{Calibration, CalibrationFile};
use crate::ontology::{Ontology, OntologyFile};
use crate::split::Split;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name looked up when a manifest path points at a directory.
pub const DEFAULT_MANIFEST_NAME: &str = "scene_dataset.json";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let file = File::open(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// The top-level dataset file: metadata plus scene file lists per split.
#[derive(Debug, Clone)]
pub struct DatasetManifest {
    path: PathBuf,
    metadata: DatasetMetadata,
    splits: BTreeMap<Split, Vec<PathBuf>>,
}

impl DatasetManifest {
    /// Read a dataset manifest. Scene paths are resolved against the
    /// manifest's directory; scene files themselves are read lazily by
    /// [`DatasetManifest::load_scenes`].
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let mut path = path.as_ref().to_path_buf();
        if path.is_dir() {
            path.push(DEFAULT_MANIFEST_NAME);
        }
        debug!("Loading dataset manifest from: {}", path.display());

        let file: DatasetFile = read_json(&path)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut splits = BTreeMap::new();
        for (key, scenes) in file.scene_splits {
            let split: Split = key.parse()?;
            if splits.contains_key(&split) {
                return Err(ManifestError::invalid(
                    &path,
                    format!("split '{}' is listed twice", split),
                ));
            }
            let scenes: Vec<PathBuf> = scenes.iter().map(|scene| root.join(scene)).collect();
            splits.insert(split, scenes);
        }

        info!(
            "Dataset manifest '{}' v{}: {}",
            file.metadata.name,
            file.metadata.version,
            splits
                .iter()
                .map(|(split, scenes)| format!("{}={}", split, scenes.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            path,
            metadata: file.metadata,
            splits,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Splits present in the manifest.
    pub fn splits(&self) -> impl Iterator<Item = Split> + '_ {
        self.splits.keys().copied()
    }

    /// Scene file paths of a split, in manifest order.
    pub fn scene_paths(&self, split: Split) -> Result<&[PathBuf], ManifestError> {
        self.splits
            .get(&split)
            .map(Vec::as_slice)
            .ok_or(ManifestError::MissingSplit(split))
    }

    /// Read every scene file of a split.
    ///
    /// Scene files are parsed on the rayon pool; the result keeps manifest
    /// order. The first failing scene in manifest order aborts the whole load.
    #[tracing::instrument(skip_all, fields(split = %split))]
    pub fn load_scenes(&self, split: Split) -> Result<Vec<SceneDescription>, ManifestError> {
        let paths = self.scene_paths(split)?;
        let loaded: Vec<Result<SceneDescription, ManifestError>> = paths
            .par_iter()
            .map(|path| SceneDescription::load(path))
            .collect();
        let scenes = loaded.into_iter().collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(scenes.len());
        for scene in &scenes {
            if !seen.insert(scene.name.as_str()) {
                return Err(ManifestError::invalid(
                    &self.path,
                    format!("scene '{}' appears twice in split '{}'", scene.name, split),
                ));
            }
        }

        info!("Loaded {} scenes for split '{}'", scenes.len(), split);
        Ok(scenes)
    }
}

/// A parsed scene file with its calibration and ontologies resolved.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    pub name: String,
    pub log: Option<String>,
    /// Directory all record paths are relative to.
    pub directory: PathBuf,
    pub calibration: Calibration,
    /// Annotation type to ontology.
    pub ontologies: BTreeMap<String, Ontology>,
    pub datums: Vec<DatumTable>,
}

impl SceneDescription {
    /// Read a scene file and the calibration and ontology files it references.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let file: SceneFile = read_json(path)?;
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let calibration = match &file.calibration {
            Some(relative) => {
                let calibration_path = directory.join(relative);
                let raw: CalibrationFile = read_json(&calibration_path)?;
                raw.into_calibration()
                    .map_err(|reason| ManifestError::invalid(&calibration_path, reason))?
            }
            None => {
                warn!("Scene '{}' has no calibration", file.name);
                Calibration::new()
            }
        };

        let mut ontologies = BTreeMap::new();
        for (annotation, relative) in &file.ontologies {
            let raw: OntologyFile = read_json(&directory.join(relative))?;
            ontologies.insert(annotation.clone(), Ontology::from(raw));
        }

        let description = Self {
            name: file.name,
            log: file.log,
            directory,
            calibration,
            ontologies,
            datums: file.datums,
        };
        description
            .validate()
            .map_err(|reason| ManifestError::invalid(path, reason))?;

        debug!(
            "Scene '{}': {} datums, {} calibrated sensors",
            description.name,
            description.datums.len(),
            description.calibration.len()
        );
        Ok(description)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("scene name is empty".to_string());
        }
        let mut names = HashSet::new();
        for datum in &self.datums {
            if !names.insert(datum.name.as_str()) {
                return Err(format!("datum '{}' is listed twice", datum.name));
            }
            if datum.datum_type == DatumType::Image {
                match (datum.width, datum.height) {
                    (Some(w), Some(h)) if w > 0 && h > 0 => {}
                    _ => {
                        return Err(format!(
                            "image datum '{}' needs a non-zero width and height",
                            datum.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn datum(&self, name: &str) -> Option<&DatumTable> {
        self.datums.iter().find(|datum| datum.name == name)
    }
}
