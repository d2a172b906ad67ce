//! Undo/redo history of level-set states
//!
//! One manager per segmentation phase. The current state lives outside the
//! stacks; undo and redo move whole fields by value, never deep-copying
//! (snapshots are tens of MB at clinical resolutions).
//!
//! History is keyed on observable mask equality rather than bitwise field
//! equality: the PDE can produce numerically different distance fields that
//! delimit the identical region (e.g. a run stopped by the RMS criterion
//! after zero effective iterations). Recording those would fill the undo
//! stack with states the user cannot tell apart.

use log::debug;

use crate::error::SegmentationError;
use crate::field::VolumetricField;

/// Per-phase undo/redo stacks of level-set snapshots.
#[derive(Debug, Default)]
pub struct HistoryManager {
    current: Option<VolumetricField>,
    undo_stack: Vec<VolumetricField>,
    redo_stack: Vec<VolumetricField>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current level-set state, if any
    pub fn current(&self) -> Option<&VolumetricField> {
        self.current.as_ref()
    }

    /// Number of states available to undo
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of states available to redo
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Adopt `candidate` as the current state unless it is mask-equivalent
    /// to the present one.
    ///
    /// The first-ever state is always adopted. On adoption the previous
    /// state moves onto the undo stack and the redo stack is cleared: a new
    /// edit starts a fresh branch, so states from an abandoned branch must
    /// not resurface through redo.
    ///
    /// Returns whether the candidate was recorded. A mask-equivalent
    /// candidate is discarded and leaves both stacks untouched.
    pub fn record_if_changed(&mut self, candidate: VolumetricField) -> bool {
        match self.current.take() {
            None => {
                self.current = Some(candidate);
                true
            }
            Some(previous) => {
                if candidate.mask_equivalent(&previous) {
                    debug!("record_if_changed: no observable change, state discarded");
                    self.current = Some(previous);
                    false
                } else {
                    self.undo_stack.push(previous);
                    self.redo_stack.clear();
                    self.current = Some(candidate);
                    true
                }
            }
        }
    }

    /// Step back to the previous recorded state.
    ///
    /// Returns whether further undo steps remain, so the caller can disable
    /// its undo control. Fails with `HistoryUnderflow` on an empty stack,
    /// leaving the state unchanged.
    pub fn undo(&mut self) -> Result<bool, SegmentationError> {
        let restored = self.undo_stack.pop().ok_or_else(|| {
            debug!("undo failed: stack empty");
            SegmentationError::HistoryUnderflow { action: "undo" }
        })?;
        if let Some(current) = self.current.take() {
            self.redo_stack.push(current);
        }
        self.current = Some(restored);
        Ok(!self.undo_stack.is_empty())
    }

    /// Step forward to the next recorded state.
    ///
    /// Symmetric to [`undo`](Self::undo).
    pub fn redo(&mut self) -> Result<bool, SegmentationError> {
        let restored = self.redo_stack.pop().ok_or_else(|| {
            debug!("redo failed: stack empty");
            SegmentationError::HistoryUnderflow { action: "redo" }
        })?;
        if let Some(current) = self.current.take() {
            self.undo_stack.push(current);
        }
        self.current = Some(restored);
        Ok(!self.redo_stack.is_empty())
    }
}
