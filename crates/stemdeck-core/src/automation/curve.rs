//! Segment shaping for keyframe interpolation

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Interpolation shape applied to every segment of an automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    #[default]
    Linear,
    Exponential,
    Logarithmic,
    Sine,
    /// Each segment uses the easing of its starting keyframe
    Custom,
}

/// Per-keyframe easing, used when the automation curve is `Custom`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Hold the starting value until the next keyframe
    Step,
}

impl Easing {
    /// Map segment progress `f` (0-1) to interpolation weight (0-1)
    #[inline]
    pub fn apply(self, f: f32) -> f32 {
        let f = f.clamp(0.0, 1.0);
        match self {
            Easing::Linear => f,
            Easing::EaseIn => f * f,
            Easing::EaseOut => 1.0 - (1.0 - f) * (1.0 - f),
            Easing::EaseInOut => f * f * (3.0 - 2.0 * f),
            Easing::Step => {
                if f >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl CurveKind {
    /// Interpolation weight for progress `f`, deferring to `easing` for `Custom`
    #[inline]
    pub fn shape(self, f: f32, easing: Easing) -> f32 {
        let f = f.clamp(0.0, 1.0);
        match self {
            CurveKind::Linear => f,
            CurveKind::Exponential => f * f,
            CurveKind::Logarithmic => 1.0 - (1.0 - f) * (1.0 - f),
            CurveKind::Sine => 0.5 - 0.5 * (PI * f).cos(),
            CurveKind::Custom => easing.apply(f),
        }
    }
}
