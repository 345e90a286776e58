//! Soft-clip saturation
//!
//! - intensity: drive (1x - 31x into tanh)
//! - param1: tone (dark one-pole low-pass → fully open)
//! - param2: output level (-12 dB → 0 dB)

use super::{db_to_linear, exp_range, EffectProcessor};
use crate::effect::EffectParameters;
use crate::types::StereoSample;

pub struct DistortionProcessor {
    sample_rate: f32,
    tone_state: [f32; 2],
}

impl DistortionProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            tone_state: [0.0; 2],
        }
    }

    #[inline]
    fn shape(x: f32, drive: f32) -> f32 {
        // Normalized so full-scale input maps to full-scale output
        (x * drive).tanh() / drive.tanh()
    }
}

impl EffectProcessor for DistortionProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let drive = 1.0 + 30.0 * params.intensity.clamp(0.0, 1.0);
        let cutoff = exp_range(params.param1, 800.0, self.sample_rate * 0.45);
        let alpha = 1.0 - (-2.0 * std::f32::consts::PI * cutoff / self.sample_rate).exp();
        let level = db_to_linear(-12.0 + 12.0 * params.param2.clamp(0.0, 1.0));

        for sample in buffer.iter_mut() {
            let l = Self::shape(sample.left, drive);
            let r = Self::shape(sample.right, drive);
            self.tone_state[0] += alpha * (l - self.tone_state[0]);
            self.tone_state[1] += alpha * (r - self.tone_state[1]);
            sample.left = self.tone_state[0] * level;
            sample.right = self.tone_state[1] * level;
        }
    }

    fn reset(&mut self) {
        self.tone_state = [0.0; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;

    #[test]
    fn test_output_bounded_by_level() {
        let mut dist = DistortionProcessor::new(48000.0);
        let params = EffectParameters {
            enabled: true,
            intensity: 1.0,
            param1: 1.0,
            param2: 1.0,
            ..EffectParameters::default_for(EffectKind::Distortion)
        };
        let mut buf: Vec<StereoSample> = (0..1000).map(|i| StereoSample::mono((i as f32 * 0.37).sin() * 4.0)).collect();
        dist.process(&mut buf, &params);
        assert!(buf.iter().all(|s| s.left.abs() <= 1.0 + 1e-4));
    }

    #[test]
    fn test_more_drive_squares_the_wave() {
        let run = |intensity: f32| {
            let mut dist = DistortionProcessor::new(48000.0);
            let params = EffectParameters {
                enabled: true,
                intensity,
                param1: 1.0,
                param2: 1.0,
                ..EffectParameters::default_for(EffectKind::Distortion)
            };
            let mut buf = vec![StereoSample::mono(0.1); 2000];
            dist.process(&mut buf, &params);
            buf[1999].left
        };
        assert!(run(1.0) > run(0.0) * 2.0);
    }
}
