//! Dataset construction options

use crate::error::{ConfigError, DatasetError};
use crate::sync::synchronizer::DEFAULT_SYNC_TOLERANCE_US;
use ddad_data::Split;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Everything needed to build a [`crate::SynchronizedDataset`].
///
/// Deserializes from JSON with every field but `manifest_path` optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset manifest file, or the directory holding `scene_dataset.json`.
    pub manifest_path: PathBuf,
    pub split: Split,
    /// Requested datums, in entry order.
    pub datum_names: Vec<String>,
    /// Datum whose timestamps define samples. Defaults to the first requested
    /// point cloud datum, else the first point cloud datum of the first scene.
    pub pivot_datum_name: Option<String>,
    /// Point cloud datum projected into every requested camera.
    pub generate_depth_from_datum: Option<String>,
    pub forward_context: usize,
    pub backward_context: usize,
    pub requested_annotations: Vec<String>,
    /// Keep only samples whose requested datums carry every requested annotation.
    pub only_annotated_datums: bool,
    pub sync_tolerance_us: u64,
    /// Decode images and point clouds on retrieval.
    pub load_payloads: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::new(),
            split: Split::Train,
            datum_names: Vec::new(),
            pivot_datum_name: None,
            generate_depth_from_datum: None,
            forward_context: 0,
            backward_context: 0,
            requested_annotations: Vec::new(),
            only_annotated_datums: false,
            sync_tolerance_us: DEFAULT_SYNC_TOLERANCE_US,
            load_payloads: true,
        }
    }
}

impl DatasetConfig {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    pub fn with_datums<S: Into<String>>(mut self, datums: impl IntoIterator<Item = S>) -> Self {
        self.datum_names = datums.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pivot(mut self, pivot: impl Into<String>) -> Self {
        self.pivot_datum_name = Some(pivot.into());
        self
    }

    pub fn with_depth_from(mut self, datum: impl Into<String>) -> Self {
        self.generate_depth_from_datum = Some(datum.into());
        self
    }

    pub fn with_context(mut self, backward: usize, forward: usize) -> Self {
        self.backward_context = backward;
        self.forward_context = forward;
        self
    }

    pub fn with_annotations<S: Into<String>>(mut self, annotations: impl IntoIterator<Item = S>) -> Self {
        self.requested_annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_only_annotated(mut self, only_annotated: bool) -> Self {
        self.only_annotated_datums = only_annotated;
        self
    }

    pub fn with_tolerance(mut self, tolerance_us: u64) -> Self {
        self.sync_tolerance_us = tolerance_us;
        self
    }

    pub fn with_payloads(mut self, load: bool) -> Self {
        self.load_payloads = load;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingManifestPath);
        }
        if self.datum_names.is_empty() {
            return Err(ConfigError::NoDatums);
        }

        let mut seen = HashSet::new();
        if let Some(name) = self.datum_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ConfigError::DuplicateDatum(name.clone()));
        }
        let mut seen = HashSet::new();
        if let Some(name) = self
            .requested_annotations
            .iter()
            .find(|name| !seen.insert(name.as_str()))
        {
            return Err(ConfigError::DuplicateAnnotation(name.clone()));
        }

        if let Some(source) = &self.generate_depth_from_datum {
            let requested = self.datum_names.contains(source);
            let pivot = self.pivot_datum_name.as_ref() == Some(source);
            if !requested && !pivot {
                return Err(ConfigError::UnknownDepthSource(source.clone()));
            }
        }
        Ok(())
    }
}
