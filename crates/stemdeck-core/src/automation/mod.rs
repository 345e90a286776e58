//! Time-based parameter automation
//!
//! A [`MixingAutomation`] is a looping keyframe curve over normalized time.
//! [`AutomationEngine`] plays one back at control rate for a single
//! parameter (a matrix cell gain or an effect parameter).

mod curve;
mod engine;

pub use curve::{CurveKind, Easing};
pub use engine::AutomationEngine;

use serde::{Deserialize, Serialize};

/// One point on an automation curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixingKeyframe {
    /// Normalized position within the loop (0-1)
    pub time: f32,
    /// Parameter value (0-1)
    pub value: f32,
    /// Shape of the segment starting here (used by `CurveKind::Custom`)
    #[serde(default)]
    pub easing: Easing,
}

impl MixingKeyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time: time.clamp(0.0, 1.0),
            value: value.clamp(0.0, 1.0),
            easing: Easing::Linear,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Looping keyframe automation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingAutomation {
    pub enabled: bool,
    pub curve: CurveKind,
    /// Loop length in seconds
    pub duration_secs: f64,
    /// Sorted by `time`
    pub keyframes: Vec<MixingKeyframe>,
}

impl MixingAutomation {
    /// Build an enabled automation, clamping and sorting the keyframes
    pub fn new(curve: CurveKind, duration_secs: f64, keyframes: Vec<MixingKeyframe>) -> Self {
        let mut automation = Self {
            enabled: true,
            curve,
            duration_secs,
            keyframes,
        };
        automation.normalize();
        automation
    }

    /// Clamp keyframe fields into range and restore time ordering
    pub fn normalize(&mut self) {
        for k in &mut self.keyframes {
            k.time = k.time.clamp(0.0, 1.0);
            k.value = k.value.clamp(0.0, 1.0);
        }
        self.keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            self.duration_secs = 0.0;
        }
    }

    /// Value at absolute time `now` (seconds), looping every `duration_secs`
    ///
    /// Holds the first value before the first keyframe and the last value
    /// after the final one. `None` when there are no keyframes.
    pub fn evaluate(&self, now: f64) -> Option<f32> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if self.duration_secs <= 0.0 {
            return Some(first.value);
        }

        let t = (now.rem_euclid(self.duration_secs) / self.duration_secs) as f32;
        if t <= first.time {
            return Some(first.value);
        }
        if t >= last.time {
            return Some(last.value);
        }

        for pair in self.keyframes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t >= a.time && t < b.time {
                let span = b.time - a.time;
                if span <= f32::EPSILON {
                    return Some(b.value);
                }
                let w = self.curve.shape((t - a.time) / span, a.easing);
                return Some(a.value + (b.value - a.value) * w);
            }
        }
        Some(last.value)
    }
}
