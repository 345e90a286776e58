//! Matrix cells

use crate::automation::MixingAutomation;
use serde::{Deserialize, Serialize};

/// Largest gain a cell accepts (+6 dB)
pub const MAX_CELL_GAIN: f32 = 2.0;

/// One directed gain connection from a source stem to a target stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingMatrixCell {
    pub source: usize,
    pub target: usize,
    /// Stored gain (0-2); kept while the cell is disabled
    pub gain: f32,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<MixingAutomation>,
}

impl MixingMatrixCell {
    /// Default cell: unity on the diagonal, silent and disabled elsewhere
    pub fn identity(source: usize, target: usize) -> Self {
        let diagonal = source == target;
        Self {
            source,
            target,
            gain: if diagonal { 1.0 } else { 0.0 },
            enabled: diagonal,
            automation: None,
        }
    }

    /// Gain the mix bus should apply (0 when disabled)
    #[inline]
    pub fn effective_gain(&self) -> f32 {
        if self.enabled {
            self.gain
        } else {
            0.0
        }
    }

    pub fn is_diagonal(&self) -> bool {
        self.source == self.target
    }
}

/// Clamp a requested gain into the cell range; NaN becomes silence
#[inline]
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, MAX_CELL_GAIN)
    }
}
