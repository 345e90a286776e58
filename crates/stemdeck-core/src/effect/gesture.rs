//! Continuous-input mappings
//!
//! Gesture recognition happens elsewhere; this core only sees a gesture
//! class and a normalized 0-1 value. A mapping table turns that into
//! effect parameter writes or matrix gain changes.

use super::{EffectKind, EffectParam, EffectParameters};
use crate::types::StemKind;
use serde::{Deserialize, Serialize};

/// Gesture classes the input collaborator reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Pinch,
    Rotation,
    Spread,
    Tap,
    Swipe,
}

/// What a mapped value does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingBehavior {
    /// Write the effect's intensity
    #[default]
    Intensity,
    /// Write the mapping's `parameter`
    ParameterSweep,
    /// Write the effect's wetness
    WetDry,
    /// Flip `enabled` when the value crosses the threshold upward
    Toggle,
    /// Disable the enabled effect in [`CYCLE_ORDER`] and enable the next one
    CycleNext,
}

impl MappingBehavior {
    /// Fires once per threshold crossing rather than on every update
    pub fn is_trigger(self) -> bool {
        matches!(self, MappingBehavior::Toggle | MappingBehavior::CycleNext)
    }
}

/// Effects visited by [`MappingBehavior::CycleNext`], in order
pub const CYCLE_ORDER: [EffectKind; 5] = [
    EffectKind::Reverb,
    EffectKind::Delay,
    EffectKind::Filter,
    EffectKind::Phaser,
    EffectKind::Flanger,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingTarget {
    Effect(EffectKind),
    /// Matrix cell gain (row-major `source`/`target` stem indices)
    Cell { source: usize, target: usize },
}

/// One gesture → target binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureMapping {
    pub gesture: GestureKind,
    pub target: MappingTarget,
    /// Parameter written by `ParameterSweep`
    #[serde(default = "default_parameter")]
    pub parameter: EffectParam,
    #[serde(default)]
    pub behavior: MappingBehavior,
    /// Input multiplier applied before the threshold check
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    /// Scaled inputs below this are ignored
    #[serde(default)]
    pub threshold: f32,
    /// Output range the scaled input is mapped onto
    #[serde(default = "default_range")]
    pub range: (f32, f32),
    /// Stem to act on; `None` follows the focused stem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stem: Option<StemKind>,
}

fn default_parameter() -> EffectParam {
    EffectParam::Intensity
}

fn default_sensitivity() -> f32 {
    1.0
}

fn default_range() -> (f32, f32) {
    (0.0, 1.0)
}

impl GestureMapping {
    pub fn new(gesture: GestureKind, target: MappingTarget, behavior: MappingBehavior) -> Self {
        Self {
            gesture,
            target,
            parameter: default_parameter(),
            behavior,
            sensitivity: default_sensitivity(),
            threshold: 0.0,
            range: default_range(),
            stem: None,
        }
    }

    pub fn with_parameter(mut self, parameter: EffectParam) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = (min, max);
        self
    }

    pub fn for_stem(mut self, stem: StemKind) -> Self {
        self.stem = Some(stem);
        self
    }

    /// Input after sensitivity, or `None` when below threshold
    pub fn scale(&self, value: f32) -> Option<f32> {
        let value = if value.is_nan() { 0.0 } else { value };
        let scaled = (value * self.sensitivity).clamp(0.0, 1.0);
        (scaled >= self.threshold).then_some(scaled)
    }

    /// Map a scaled 0-1 input onto the output range
    pub fn map(&self, scaled: f32) -> f32 {
        let (min, max) = self.range;
        min + scaled * (max - min)
    }

    /// Default table: one mapping per gesture class
    pub fn defaults() -> Vec<GestureMapping> {
        vec![
            GestureMapping::new(
                GestureKind::Pinch,
                MappingTarget::Effect(EffectKind::Filter),
                MappingBehavior::Intensity,
            )
            .with_threshold(0.05),
            GestureMapping::new(
                GestureKind::Rotation,
                MappingTarget::Effect(EffectKind::Reverb),
                MappingBehavior::ParameterSweep,
            )
            .with_parameter(EffectParam::Intensity)
            .with_threshold(0.05),
            GestureMapping::new(
                GestureKind::Spread,
                MappingTarget::Effect(EffectKind::Delay),
                MappingBehavior::WetDry,
            )
            .with_threshold(0.05)
            .with_range(0.0, 0.8),
            GestureMapping::new(
                GestureKind::Tap,
                MappingTarget::Effect(EffectKind::Stutter),
                MappingBehavior::Toggle,
            )
            .with_threshold(0.5),
            GestureMapping::new(
                GestureKind::Swipe,
                MappingTarget::Effect(CYCLE_ORDER[0]),
                MappingBehavior::CycleNext,
            )
            .with_threshold(0.5),
        ]
    }
}

/// Effect parameter write produced by the control side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectUpdate {
    pub stem: StemKind,
    pub kind: EffectKind,
    pub params: EffectParameters,
}

/// Result of feeding one gesture value through the mapping table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    Effect(EffectUpdate),
    CellGain { source: usize, target: usize, gain: f32 },
    CellToggle { source: usize, target: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_and_sensitivity() {
        let m = GestureMapping::new(
            GestureKind::Pinch,
            MappingTarget::Effect(EffectKind::Filter),
            MappingBehavior::Intensity,
        )
        .with_threshold(0.3)
        .with_sensitivity(2.0);

        assert_eq!(m.scale(0.1), None);
        assert_eq!(m.scale(0.2), Some(0.4));
        assert_eq!(m.scale(0.9), Some(1.0));
        assert_eq!(m.scale(f32::NAN), None);
    }

    #[test]
    fn test_range_mapping() {
        let m = GestureMapping::new(
            GestureKind::Spread,
            MappingTarget::Effect(EffectKind::Delay),
            MappingBehavior::WetDry,
        )
        .with_range(0.2, 0.6);
        assert!((m.map(0.5) - 0.4).abs() < 1e-6);
        assert!((m.map(1.0) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_defaults_cover_every_gesture() {
        let defaults = GestureMapping::defaults();
        for gesture in [
            GestureKind::Pinch,
            GestureKind::Rotation,
            GestureKind::Spread,
            GestureKind::Tap,
            GestureKind::Swipe,
        ] {
            assert!(defaults.iter().any(|m| m.gesture == gesture));
        }
    }

    #[test]
    fn test_mapping_yaml_fills_defaults() {
        let yaml = "gesture: pinch\ntarget: !cell\n  source: 0\n  target: 2\n";
        let m: GestureMapping = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(m.target, MappingTarget::Cell { source: 0, target: 2 });
        assert_eq!(m.sensitivity, 1.0);
        assert_eq!(m.range, (0.0, 1.0));
        assert_eq!(m.behavior, MappingBehavior::Intensity);
    }
}
