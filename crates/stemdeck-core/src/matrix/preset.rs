//! Matrix presets
//!
//! A preset is a full snapshot of the grid: gain, enabled flag and
//! automation for every cell. Built-ins assume the canonical stem order
//! {vocals, drums, bass, other}.

use super::cell::MixingMatrixCell;
use crate::automation::{CurveKind, MixingAutomation, MixingKeyframe};
use crate::types::{StemKind, NUM_STEMS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixPreset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Matrix dimension the preset was authored for
    pub size: usize,
    /// Cells not listed fall back to the identity default
    pub cells: Vec<MixingMatrixCell>,
}

impl MatrixPreset {
    /// Pure pass-through: unity diagonal, nothing crossing between stems
    pub fn identity(size: usize) -> Self {
        let mut cells = Vec::with_capacity(size * size);
        for source in 0..size {
            for target in 0..size {
                cells.push(MixingMatrixCell::identity(source, target));
            }
        }
        Self {
            name: "pass_through".to_string(),
            description: "Every stem to itself at unity".to_string(),
            size,
            cells,
        }
    }

    fn named(name: &str, description: &str) -> Self {
        let mut preset = Self::identity(NUM_STEMS);
        preset.name = name.to_string();
        preset.description = description.to_string();
        preset
    }

    /// Mutable access to a cell, for building presets
    pub fn cell_mut(&mut self, source: usize, target: usize) -> Option<&mut MixingMatrixCell> {
        self.cells
            .iter_mut()
            .find(|c| c.source == source && c.target == target)
    }

    fn route(mut self, source: StemKind, target: StemKind, gain: f32) -> Self {
        if let Some(cell) = self.cell_mut(source.index(), target.index()) {
            cell.gain = gain;
            cell.enabled = gain > 0.0;
        }
        self
    }

    fn automate(mut self, source: StemKind, target: StemKind, automation: MixingAutomation) -> Self {
        if let Some(cell) = self.cell_mut(source.index(), target.index()) {
            cell.automation = Some(automation);
        }
        self
    }

    /// Built-in presets for the canonical 4-stem layout
    pub fn builtin() -> Vec<MatrixPreset> {
        use StemKind::*;

        let swell = MixingAutomation::new(
            CurveKind::Sine,
            8.0,
            vec![
                MixingKeyframe::new(0.0, 0.0),
                MixingKeyframe::new(0.5, 0.6),
                MixingKeyframe::new(1.0, 0.0),
            ],
        );

        vec![
            MatrixPreset::identity(NUM_STEMS),
            MatrixPreset::named("vocal_spotlight", "Vocals forward, band tucked under")
                .route(Vocals, Vocals, 1.3)
                .route(Drums, Drums, 0.8)
                .route(Bass, Bass, 0.8)
                .route(Other, Other, 0.6),
            MatrixPreset::named("drum_bleed", "Drums feed the bass and music buses")
                .route(Drums, Bass, 0.2)
                .route(Drums, Other, 0.3),
            MatrixPreset::named("low_end_glue", "Kick and bass share each other's bus")
                .route(Bass, Drums, 0.25)
                .route(Drums, Bass, 0.25),
            MatrixPreset::named("breakdown", "Drums out, vocals swell into the music bus")
                .route(Drums, Drums, 0.0)
                .route(Vocals, Other, 0.4)
                .automate(Vocals, Other, swell),
        ]
    }

    /// Look up a built-in preset by name
    pub fn find_builtin(name: &str) -> Option<MatrixPreset> {
        Self::builtin().into_iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_preset_shape() {
        let p = MatrixPreset::identity(3);
        assert_eq!(p.cells.len(), 9);
        assert_eq!(p.cells.iter().filter(|c| c.enabled).count(), 3);
    }

    #[test]
    fn test_builtin_names_unique() {
        let presets = MatrixPreset::builtin();
        let mut names: Vec<_> = presets.iter().map(|p| p.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), presets.len());
    }

    #[test]
    fn test_breakdown_silences_drums() {
        let p = MatrixPreset::find_builtin("breakdown").unwrap();
        let drums = StemKind::Drums.index();
        let cell = p.cells.iter().find(|c| c.source == drums && c.target == drums).unwrap();
        assert!(!cell.enabled);
        assert!(p.cells.iter().any(|c| c.automation.is_some()));
    }

    #[test]
    fn test_preset_json_roundtrip() {
        for preset in MatrixPreset::builtin() {
            let json = serde_json::to_string(&preset).unwrap();
            let back: MatrixPreset = serde_json::from_str(&json).unwrap();
            assert_eq!(preset, back);
        }
    }
}
