//! N×N stem mixing matrix
//!
//! The matrix is the control-side model of the mix bus: it stores the
//! target gain and enabled flag of every (source, target) cell, runs cell
//! automation, records live gains back into automation and feeds
//! statistics to a [`MixAdvisor`]. It never touches audio. The owner
//! forwards every change to the renderer, which ramps toward it.
//!
//! Cells are stored row-major: index `source * size + target`.

mod advisor;
mod cell;
mod preset;
mod recording;

pub use advisor::{GainAdjustment, HeuristicAdvisor, MatrixStatistics, MixAdvisor, Recommendation};
pub use cell::{clamp_gain, MixingMatrixCell, MAX_CELL_GAIN};
pub use preset::MatrixPreset;
pub use recording::{thin_to_keyframes, MatrixRecorder};

use crate::automation::{AutomationEngine, MixingAutomation};
use crate::config::AutomationConfig;
use crate::error::{EngineError, EngineResult};

/// A cell whose effective gain changed, to be pushed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellUpdate {
    pub source: usize,
    pub target: usize,
    /// Effective gain (0 when disabled)
    pub gain: f32,
}

pub struct MixingMatrix {
    size: usize,
    cells: Vec<MixingMatrixCell>,
    engines: Vec<AutomationEngine>,
    resolution_hz: f64,
    record_threshold: f32,
    recorder: Option<MatrixRecorder>,
}

impl MixingMatrix {
    /// Create an identity matrix of `size` stems
    pub fn new(size: usize, automation: &AutomationConfig) -> Self {
        let preset = MatrixPreset::identity(size);
        Self {
            size,
            engines: (0..size * size)
                .map(|_| AutomationEngine::new(automation.resolution_hz))
                .collect(),
            cells: preset.cells,
            resolution_hz: automation.resolution_hz,
            record_threshold: automation.record_threshold,
            recorder: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, source: usize, target: usize) -> EngineResult<usize> {
        if source < self.size && target < self.size {
            Ok(source * self.size + target)
        } else {
            Err(EngineError::UnknownCell { from: source, to: target })
        }
    }

    pub fn cell(&self, source: usize, target: usize) -> EngineResult<&MixingMatrixCell> {
        let idx = self.index(source, target)?;
        Ok(&self.cells[idx])
    }

    pub fn cells(&self) -> &[MixingMatrixCell] {
        &self.cells
    }

    fn update(&self, idx: usize) -> CellUpdate {
        let cell = &self.cells[idx];
        CellUpdate {
            source: cell.source,
            target: cell.target,
            gain: cell.effective_gain(),
        }
    }

    /// Set a cell's stored gain, clamped to 0-2
    pub fn set_gain(&mut self, source: usize, target: usize, gain: f32) -> EngineResult<CellUpdate> {
        let idx = self.index(source, target)?;
        self.cells[idx].gain = clamp_gain(gain);
        Ok(self.update(idx))
    }

    /// Toggle cell participation; the stored gain is left alone
    pub fn set_enabled(&mut self, source: usize, target: usize, enabled: bool) -> EngineResult<CellUpdate> {
        let idx = self.index(source, target)?;
        self.cells[idx].enabled = enabled;
        Ok(self.update(idx))
    }

    /// Attach (`Some`) or detach (`None`) automation on a cell
    pub fn set_automation(
        &mut self,
        source: usize,
        target: usize,
        automation: Option<MixingAutomation>,
    ) -> EngineResult<()> {
        let idx = self.index(source, target)?;
        match automation {
            Some(mut automation) => {
                automation.normalize();
                self.engines[idx].set_automation(automation.clone());
                self.cells[idx].automation = Some(automation);
            }
            None => {
                self.engines[idx].clear();
                self.cells[idx].automation = None;
            }
        }
        Ok(())
    }

    /// Pause or resume a cell's automation without discarding it
    pub fn set_automation_enabled(&mut self, source: usize, target: usize, enabled: bool) -> EngineResult<()> {
        let idx = self.index(source, target)?;
        self.engines[idx].set_enabled(enabled);
        if let Some(automation) = &mut self.cells[idx].automation {
            automation.enabled = enabled;
        }
        Ok(())
    }

    /// Which cells currently route audio
    pub fn topology(&self) -> Vec<bool> {
        self.cells.iter().map(|c| c.enabled).collect()
    }

    /// Replace every cell from a preset
    ///
    /// Cells the preset doesn't list revert to identity. The preset is
    /// validated first, so a bad cell leaves the matrix untouched. Returns
    /// whether the routing topology changed.
    pub fn apply_preset(&mut self, preset: &MatrixPreset) -> EngineResult<bool> {
        for cell in &preset.cells {
            self.index(cell.source, cell.target)?;
        }

        let before = self.topology();
        let mut next = MatrixPreset::identity(self.size).cells;
        for cell in &preset.cells {
            let idx = cell.source * self.size + cell.target;
            next[idx] = MixingMatrixCell {
                gain: clamp_gain(cell.gain),
                ..cell.clone()
            };
        }
        self.cells = next;

        for (idx, cell) in self.cells.iter_mut().enumerate() {
            match &mut cell.automation {
                Some(automation) => {
                    automation.normalize();
                    self.engines[idx].set_automation(automation.clone());
                }
                None => self.engines[idx].clear(),
            }
        }

        let reconnected = before != self.topology();
        log::info!(
            "MixingMatrix: applied preset '{}' (topology {})",
            preset.name,
            if reconnected { "changed" } else { "unchanged" }
        );
        Ok(reconnected)
    }

    /// Snapshot the current grid as a preset
    pub fn to_preset(&self, name: &str) -> MatrixPreset {
        MatrixPreset {
            name: name.to_string(),
            description: String::new(),
            size: self.size,
            cells: self.cells.clone(),
        }
    }

    /// Effective gain updates for every cell, for a full resync
    pub fn all_updates(&self) -> impl Iterator<Item = CellUpdate> + '_ {
        (0..self.cells.len()).map(|idx| self.update(idx))
    }

    /// Run cell automation; returns the cells whose gain moved
    pub fn tick(&mut self, now: f64) -> Vec<CellUpdate> {
        let mut changed = Vec::new();
        for idx in 0..self.cells.len() {
            if let Some(value) = self.engines[idx].tick(now) {
                let gain = clamp_gain(value);
                if (self.cells[idx].gain - gain).abs() > f32::EPSILON {
                    self.cells[idx].gain = gain;
                    changed.push(self.update(idx));
                }
            }
        }
        changed
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn start_recording(&mut self, now: f64) {
        log::info!("MixingMatrix: recording started");
        self.recorder = Some(MatrixRecorder::new(self.cells.len(), now, self.resolution_hz));
    }

    /// Sample live gains if a recording frame is due
    ///
    /// `live_gain(idx)` returns the gain the audio side is currently
    /// applying for row-major cell `idx`.
    pub fn record_frame(&mut self, now: f64, live_gain: impl Fn(usize) -> f32) {
        if let Some(recorder) = &mut self.recorder {
            if recorder.is_due(now) {
                recorder.push_frame(now, (0..self.cells.len()).map(live_gain));
            }
        }
    }

    /// Stop recording and install keyframes on every cell that moved
    ///
    /// Returns the number of cells that received automation.
    pub fn stop_recording(&mut self, now: f64) -> usize {
        let Some(recorder) = self.recorder.take() else {
            return 0;
        };
        let frames = recorder.frames_recorded();
        let results = recorder.finish(now, self.record_threshold);

        let mut installed = 0;
        for (idx, automation) in results.into_iter().enumerate() {
            if let Some(automation) = automation {
                self.engines[idx].set_automation(automation.clone());
                self.cells[idx].automation = Some(automation);
                installed += 1;
            }
        }
        log::info!(
            "MixingMatrix: recording stopped ({} frames, {} cells automated)",
            frames,
            installed
        );
        installed
    }

    pub fn statistics(&self) -> MatrixStatistics {
        MatrixStatistics::from_cells(self.size, &self.cells)
    }

    pub fn recommendations(&self, advisor: &dyn MixAdvisor) -> Vec<Recommendation> {
        advisor.recommend(&self.statistics(), &self.cells)
    }
}
