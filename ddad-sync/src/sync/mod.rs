//! Cross-sensor synchronization
//!
//! Assembles synchronized multi-datum samples, derives camera depth from
//! LiDAR, and decides which samples carry every requested annotation.

pub mod depth;
pub mod filter;
pub mod synchronizer;

pub use depth::{DepthMap, DepthProjector};
pub use filter::AnnotationFilter;
pub use synchronizer::{DatumEntry, DatumSynchronizer, SynchronizedSample};
