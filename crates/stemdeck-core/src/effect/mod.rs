//! Per-stem effect chains
//!
//! Split the same way as the mixer:
//! - Control side: [`EffectChainProcessor`] owns each stem's
//!   [`EffectChainConfig`], presets, gesture mappings and parameter automation.
//! - Audio side: [`StemRack`] holds the DSP processors and wet/dry ramps and
//!   renders a stem through them in serial or parallel routing.
//!
//! Every effect kind exposes the same parameter contract
//! ([`EffectParameters`]); what `intensity`, `param1` and `param2` mean is
//! up to the processor in [`dsp`].

mod chain;
pub mod dsp;
mod gesture;
mod preset;
mod rack;

pub use chain::{ChainCost, EffectChainConfig, EffectChainProcessor, PresetChange};
pub use gesture::{
    EffectUpdate, GestureKind, GestureMapping, InputAction, MappingBehavior, MappingTarget, CYCLE_ORDER,
};
pub use preset::EffectPreset;
pub use rack::StemRack;

use serde::{Deserialize, Serialize};

/// Number of effect kinds
pub const NUM_EFFECTS: usize = 12;

/// Effect kinds, declared in serial processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum EffectKind {
    Compression = 0,
    Filter = 1,
    Distortion = 2,
    Delay = 3,
    Reverb = 4,
    Phaser = 5,
    Flanger = 6,
    Gate = 7,
    Stutter = 8,
    Convolution = 9,
    Freeze = 10,
    Loop = 11,
}

impl EffectKind {
    /// Serial routing order
    pub const ALL: [EffectKind; NUM_EFFECTS] = [
        EffectKind::Compression,
        EffectKind::Filter,
        EffectKind::Distortion,
        EffectKind::Delay,
        EffectKind::Reverb,
        EffectKind::Phaser,
        EffectKind::Flanger,
        EffectKind::Gate,
        EffectKind::Stutter,
        EffectKind::Convolution,
        EffectKind::Freeze,
        EffectKind::Loop,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Compression => "Compression",
            EffectKind::Filter => "Filter",
            EffectKind::Distortion => "Distortion",
            EffectKind::Delay => "Delay",
            EffectKind::Reverb => "Reverb",
            EffectKind::Phaser => "Phaser",
            EffectKind::Flanger => "Flanger",
            EffectKind::Gate => "Gate",
            EffectKind::Stutter => "Stutter",
            EffectKind::Convolution => "Convolution",
            EffectKind::Freeze => "Freeze",
            EffectKind::Loop => "Loop",
        }
    }

    /// Default wet/dry mix for this kind
    ///
    /// Insert-style effects (dynamics, filter, repeaters) default fully wet;
    /// send-style effects (time and space) default to a blend.
    pub fn default_wetness(&self) -> f32 {
        match self {
            EffectKind::Reverb | EffectKind::Delay => 0.3,
            EffectKind::Convolution => 0.4,
            EffectKind::Distortion | EffectKind::Phaser | EffectKind::Flanger => 0.5,
            EffectKind::Compression
            | EffectKind::Filter
            | EffectKind::Gate
            | EffectKind::Stutter
            | EffectKind::Freeze
            | EffectKind::Loop => 1.0,
        }
    }

    /// Estimated cost of one active instance
    pub fn cost(&self) -> EffectCost {
        let (cpu_percent, latency_ms) = match self {
            EffectKind::Compression => (2.0, 1.0),
            EffectKind::Filter => (1.0, 0.0),
            EffectKind::Distortion => (1.5, 0.0),
            EffectKind::Delay => (2.5, 0.0),
            EffectKind::Reverb => (8.0, 5.0),
            EffectKind::Phaser => (2.0, 0.0),
            EffectKind::Flanger => (2.0, 0.5),
            EffectKind::Gate => (1.0, 0.5),
            EffectKind::Stutter => (1.5, 2.7),
            EffectKind::Convolution => (12.0, 10.7),
            EffectKind::Freeze => (4.0, 5.3),
            EffectKind::Loop => (1.0, 0.0),
        };
        EffectCost { cpu_percent, latency_ms }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static cost estimate for an effect kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectCost {
    pub cpu_percent: f32,
    pub latency_ms: f32,
}

/// Signal topology of a stem's chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Each effect feeds the next in `EffectKind::ALL` order
    #[default]
    Serial,
    /// Every effect is fed the dry input; wets are summed over an attenuated dry
    Parallel,
}

/// Addressable numeric parameter of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectParam {
    Wetness,
    Intensity,
    Param1,
    Param2,
}

/// Parameters of one effect in a chain
///
/// All numeric fields are 0-1. `Copy` so the record can travel to the
/// audio thread inside a command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectParameters {
    pub enabled: bool,
    /// Dry/wet mix (0 = dry, 1 = wet)
    pub wetness: f32,
    pub intensity: f32,
    pub param1: f32,
    pub param2: f32,
    pub bypass: bool,
}

impl EffectParameters {
    /// Disabled record with the kind's default values
    pub fn default_for(kind: EffectKind) -> Self {
        Self {
            enabled: false,
            wetness: kind.default_wetness(),
            intensity: 0.5,
            param1: 0.5,
            param2: 0.5,
            bypass: false,
        }
    }

    /// Force every numeric field into 0-1 (NaN becomes 0)
    pub fn clamped(mut self) -> Self {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        self.wetness = unit(self.wetness);
        self.intensity = unit(self.intensity);
        self.param1 = unit(self.param1);
        self.param2 = unit(self.param2);
        self
    }

    /// Numeric fields equal the kind's defaults
    pub fn is_default_for(&self, kind: EffectKind) -> bool {
        let d = Self::default_for(kind);
        const EPS: f32 = 1e-6;
        (self.wetness - d.wetness).abs() < EPS
            && (self.intensity - d.intensity).abs() < EPS
            && (self.param1 - d.param1).abs() < EPS
            && (self.param2 - d.param2).abs() < EPS
    }

    /// Enabled and not bypassed
    #[inline]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.bypass
    }

    pub fn get(&self, param: EffectParam) -> f32 {
        match param {
            EffectParam::Wetness => self.wetness,
            EffectParam::Intensity => self.intensity,
            EffectParam::Param1 => self.param1,
            EffectParam::Param2 => self.param2,
        }
    }

    /// Set one numeric field, clamped to 0-1
    pub fn set(&mut self, param: EffectParam, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        match param {
            EffectParam::Wetness => self.wetness = value,
            EffectParam::Intensity => self.intensity = value,
            EffectParam::Param1 => self.param1 = value,
            EffectParam::Param2 => self.param2 = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_order_starts_with_named_stages() {
        let head: Vec<_> = EffectKind::ALL[..7].to_vec();
        assert_eq!(
            head,
            vec![
                EffectKind::Compression,
                EffectKind::Filter,
                EffectKind::Distortion,
                EffectKind::Delay,
                EffectKind::Reverb,
                EffectKind::Phaser,
                EffectKind::Flanger,
            ]
        );
        for (i, kind) in EffectKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_clamp_out_of_range() {
        let p = EffectParameters {
            wetness: 1.7,
            intensity: -0.2,
            param1: f32::NAN,
            ..EffectParameters::default_for(EffectKind::Reverb)
        }
        .clamped();
        assert_eq!(p.wetness, 1.0);
        assert_eq!(p.intensity, 0.0);
        assert_eq!(p.param1, 0.0);
    }

    #[test]
    fn test_default_detection() {
        let kind = EffectKind::Delay;
        let mut p = EffectParameters::default_for(kind);
        assert!(p.is_default_for(kind));
        p.set(EffectParam::Param2, 0.9);
        assert!(!p.is_default_for(kind));
        assert!((p.get(EffectParam::Param2) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parameters_stay_small() {
        // Travels inside EngineCommand
        assert!(std::mem::size_of::<EffectParameters>() <= 20);
    }
}
