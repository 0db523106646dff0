//! Temporal context windows

use crate::error::ContextUnavailable;
use crate::scene::index::SceneIndex;
use tracing::debug;

/// Consecutive flat positions of one scene around a pivot sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    positions: Vec<usize>,
    pivot: usize,
}

impl ContextWindow {
    /// Flat positions, oldest first.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Offset of the pivot inside [`ContextWindow::positions`].
    pub fn pivot_offset(&self) -> usize {
        self.pivot
    }

    /// Flat position of the pivot.
    pub fn pivot(&self) -> usize {
        self.positions[self.pivot]
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Computes context windows of `backward` preceding and `forward` following
/// samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemporalWindower {
    backward: usize,
    forward: usize,
}

impl TemporalWindower {
    pub fn new(backward: usize, forward: usize) -> Self {
        Self { backward, forward }
    }

    pub fn backward(&self) -> usize {
        self.backward
    }

    pub fn forward(&self) -> usize {
        self.forward
    }

    /// Samples per window.
    pub fn size(&self) -> usize {
        self.backward + 1 + self.forward
    }

    /// Window of a single sample.
    pub fn is_trivial(&self) -> bool {
        self.backward == 0 && self.forward == 0
    }

    fn unavailable(&self, flat: usize) -> ContextUnavailable {
        ContextUnavailable {
            flat,
            backward: self.backward,
            forward: self.forward,
        }
    }

    /// Window centred on flat position `flat`, pivot at offset `backward`.
    ///
    /// Fails when the window would leave the pivot's scene.
    pub fn window(&self, index: &SceneIndex, flat: usize) -> Result<ContextWindow, ContextUnavailable> {
        let sample = index.locate(flat).ok_or_else(|| self.unavailable(flat))?;
        let scene = index.scene_range(sample.scene);

        let start = flat
            .checked_sub(self.backward)
            .filter(|start| *start >= scene.start)
            .ok_or_else(|| self.unavailable(flat))?;
        let end = flat
            .checked_add(self.forward)
            .filter(|end| *end < scene.end)
            .ok_or_else(|| self.unavailable(flat))?;

        Ok(ContextWindow {
            positions: (start..=end).collect(),
            pivot: self.backward,
        })
    }

    /// Drop every addressable sample whose window is unavailable.
    pub fn prune(&self, index: SceneIndex) -> SceneIndex {
        if self.is_trivial() {
            return index;
        }
        let windower = *self;
        let pruned = index.clone().retain(|flat| windower.window(&index, flat).is_ok());
        debug!(
            "Context ({}, {}) kept {} of {} samples",
            self.backward,
            self.forward,
            pruned.len(),
            index.len()
        );
        pruned
    }
}
