//! PLY point cloud loading

mod loader;

pub use loader::{PlyError, load_points_from_ply, points_from_ply_reader};
