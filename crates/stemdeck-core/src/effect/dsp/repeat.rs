//! Capture-and-repeat effects: stutter, freeze and loop
//!
//! All three record a slice of the incoming signal once they are engaged
//! (passing the input through while capturing), then replay that slice
//! until reset. The rack resets them whenever the effect is re-engaged so
//! each activation grabs fresh audio.
//!
//! - param1: slice length (mode-dependent range)
//! - intensity: stutter gate (1 = shortest duty), replay level for freeze/loop

use super::{exp_range, EffectProcessor};
use crate::effect::EffectParameters;
use crate::types::StereoSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Short rhythmic retrigger
    Stutter,
    /// Sustained grain
    Freeze,
    /// Long phrase loop
    Loop,
}

impl RepeatMode {
    /// Slice length range in seconds
    fn length_range(self) -> (f32, f32) {
        match self {
            RepeatMode::Stutter => (0.03, 0.5),
            RepeatMode::Freeze => (0.05, 0.5),
            RepeatMode::Loop => (0.25, 4.0),
        }
    }

    /// Edge fade in seconds
    fn fade_secs(self) -> f32 {
        match self {
            RepeatMode::Stutter | RepeatMode::Loop => 0.002,
            RepeatMode::Freeze => 0.005,
        }
    }
}

pub struct RepeatProcessor {
    mode: RepeatMode,
    sample_rate: f32,
    capture: Vec<StereoSample>,
    /// Slice length locked when capture starts
    slice_len: usize,
    filled: usize,
    play_pos: usize,
}

impl RepeatProcessor {
    pub fn new(mode: RepeatMode, sample_rate: f32) -> Self {
        let (_, max) = mode.length_range();
        let capacity = ((max * sample_rate) as usize).max(2);
        Self {
            mode,
            sample_rate,
            capture: vec![StereoSample::silence(); capacity],
            slice_len: 0,
            filled: 0,
            play_pos: 0,
        }
    }

    pub fn mode(&self) -> RepeatMode {
        self.mode
    }

    /// True once a full slice has been captured
    pub fn is_replaying(&self) -> bool {
        self.slice_len > 0 && self.filled >= self.slice_len
    }

    fn target_len(&self, param1: f32) -> usize {
        let (min, max) = self.mode.length_range();
        let len = (exp_range(param1, min, max) * self.sample_rate).round() as usize;
        len.clamp(2, self.capture.len())
    }

    #[inline]
    fn envelope(&self, pos: usize, duty_len: usize) -> f32 {
        if pos >= duty_len {
            return 0.0;
        }
        let fade = ((self.mode.fade_secs() * self.sample_rate) as usize)
            .min(duty_len / 4)
            .max(1) as f32;
        let rise = pos as f32 / fade;
        let fall = (duty_len - pos) as f32 / fade;
        rise.min(fall).min(1.0)
    }
}

impl EffectProcessor for RepeatProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        if self.slice_len == 0 {
            self.slice_len = self.target_len(params.param1);
        }
        let intensity = params.intensity.clamp(0.0, 1.0);
        let (duty_len, level) = match self.mode {
            RepeatMode::Stutter => {
                let duty = 1.0 - 0.75 * intensity;
                (((self.slice_len as f32 * duty) as usize).max(1), 1.0)
            }
            RepeatMode::Freeze | RepeatMode::Loop => (self.slice_len, 0.5 + 0.5 * intensity),
        };

        for sample in buffer.iter_mut() {
            if self.filled < self.slice_len {
                self.capture[self.filled] = *sample;
                self.filled += 1;
                continue;
            }
            let gain = self.envelope(self.play_pos, duty_len) * level;
            *sample = self.capture[self.play_pos] * gain;
            self.play_pos = (self.play_pos + 1) % self.slice_len;
        }
    }

    fn reset(&mut self) {
        self.slice_len = 0;
        self.filled = 0;
        self.play_pos = 0;
    }
}
