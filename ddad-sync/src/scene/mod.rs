//! Scene representation and indexing
//!
//! This module provides the immutable scene model, the flat sample index over
//! all scenes of a split, and temporal context windows over that index.

pub mod index;
pub mod model;
pub mod record;
pub mod temporal;

pub use index::{GlobalSample, SampleOrder, SampleReference, SceneIndex};
pub use model::Scene;
pub use record::{CameraRecord, DatumRecord, DatumStream, LidarRecord};
pub use temporal::{ContextWindow, TemporalWindower};
