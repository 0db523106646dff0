//! Dataset partitions.

use crate::manifest::ManifestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical dataset partition named in the manifest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    #[serde(alias = "validation")]
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts split names as well as the numeric keys some manifests use
/// (`0` train, `1` val, `2` test).
impl FromStr for Split {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" | "0" => Ok(Split::Train),
            "val" | "validation" | "1" => Ok(Split::Val),
            "test" | "2" => Ok(Split::Test),
            _ => Err(ManifestError::UnknownSplit(s.to_string())),
        }
    }
}
