//! LFO-driven modulation effects

use super::{exp_range, EffectProcessor};
use crate::effect::EffectParameters;
use crate::types::StereoSample;
use std::f32::consts::TAU;

/// Sine LFO with a per-channel phase offset
struct Lfo {
    phase: f32,
}

impl Lfo {
    #[inline]
    fn advance(&mut self, rate_hz: f32, sample_rate: f32) -> [f32; 2] {
        self.phase = (self.phase + rate_hz / sample_rate).fract();
        let l = (self.phase * TAU).sin();
        let r = ((self.phase + 0.25) * TAU).sin();
        [l, r]
    }
}

const PHASER_STAGES: usize = 4;

/// Four-stage allpass phaser
///
/// - intensity: sweep depth
/// - param1: LFO rate (0.05 - 5 Hz)
/// - param2: feedback (0 - 80%)
pub struct PhaserProcessor {
    sample_rate: f32,
    lfo: Lfo,
    stages: [[f32; PHASER_STAGES]; 2],
    feedback: [f32; 2],
}

impl PhaserProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            lfo: Lfo { phase: 0.0 },
            stages: [[0.0; PHASER_STAGES]; 2],
            feedback: [0.0; 2],
        }
    }
}

impl EffectProcessor for PhaserProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let depth = params.intensity.clamp(0.0, 1.0);
        let rate = exp_range(params.param1, 0.05, 5.0);
        let fb_amount = params.param2.clamp(0.0, 1.0) * 0.8;

        for sample in buffer.iter_mut() {
            let lfo = self.lfo.advance(rate, self.sample_rate);
            let mut io = [sample.left, sample.right];
            for ch in 0..2 {
                // Notch center sweeps 200 Hz - 4 kHz
                let sweep = 0.5 + 0.5 * lfo[ch] * depth;
                let freq = exp_range(sweep, 200.0, 4000.0);
                let t = (std::f32::consts::PI * freq / self.sample_rate).tan();
                let a = (t - 1.0) / (t + 1.0);

                let mut x = io[ch] + self.feedback[ch] * fb_amount;
                for z in self.stages[ch].iter_mut() {
                    let y = a * x + *z;
                    *z = x - a * y;
                    x = y;
                }
                self.feedback[ch] = x;
                io[ch] = 0.5 * (io[ch] + x);
            }
            sample.left = io[0];
            sample.right = io[1];
        }
    }

    fn reset(&mut self) {
        self.stages = [[0.0; PHASER_STAGES]; 2];
        self.feedback = [0.0; 2];
        self.lfo.phase = 0.0;
    }
}

/// Longest flanger sweep in seconds
const FLANGER_MAX_SECONDS: f32 = 0.012;

/// Modulated short delay
///
/// - intensity: sweep depth (1 - 10 ms)
/// - param1: LFO rate (0.05 - 5 Hz)
/// - param2: feedback (0 - 90%)
pub struct FlangerProcessor {
    sample_rate: f32,
    lfo: Lfo,
    line: Vec<StereoSample>,
    write_pos: usize,
}

impl FlangerProcessor {
    pub fn new(sample_rate: f32) -> Self {
        let len = ((sample_rate * FLANGER_MAX_SECONDS) as usize).max(4);
        Self {
            sample_rate,
            lfo: Lfo { phase: 0.0 },
            line: vec![StereoSample::silence(); len],
            write_pos: 0,
        }
    }

    /// Linear-interpolated read `delay` samples behind the write head
    #[inline]
    fn read(&self, delay: f32, channel: usize) -> f32 {
        let len = self.line.len();
        let delay = delay.clamp(1.0, (len - 2) as f32);
        let pos = self.write_pos as f32 + len as f32 - delay;
        let i = pos.floor() as usize;
        let frac = pos - pos.floor();
        let a = self.line[i % len];
        let b = self.line[(i + 1) % len];
        let (a, b) = if channel == 0 { (a.left, b.left) } else { (a.right, b.right) };
        a + (b - a) * frac
    }
}

impl EffectProcessor for FlangerProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let ms = self.sample_rate / 1000.0;
        let depth = 1.0 + 9.0 * params.intensity.clamp(0.0, 1.0);
        let rate = exp_range(params.param1, 0.05, 5.0);
        let feedback = params.param2.clamp(0.0, 1.0) * 0.9;

        for sample in buffer.iter_mut() {
            let lfo = self.lfo.advance(rate, self.sample_rate);
            let mut out = [0.0f32; 2];
            for ch in 0..2 {
                let delay = (1.0 + (depth - 1.0) * (0.5 + 0.5 * lfo[ch])) * ms;
                out[ch] = self.read(delay, ch);
            }
            let input = *sample;
            self.line[self.write_pos] = StereoSample::new(
                input.left + out[0] * feedback,
                input.right + out[1] * feedback,
            );
            self.write_pos = (self.write_pos + 1) % self.line.len();
            sample.left = 0.5 * (input.left + out[0]);
            sample.right = 0.5 * (input.right + out[1]);
        }
    }

    fn reset(&mut self) {
        self.line.fill(StereoSample::silence());
        self.write_pos = 0;
        self.lfo.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::dsp::test_util::{rms, sine};
    use crate::effect::EffectKind;

    fn params(kind: EffectKind) -> EffectParameters {
        EffectParameters {
            enabled: true,
            intensity: 1.0,
            param1: 0.5,
            param2: 0.9,
            ..EffectParameters::default_for(kind)
        }
    }

    #[test]
    fn test_phaser_stays_bounded_with_feedback() {
        let mut phaser = PhaserProcessor::new(48000.0);
        let mut buf = sine(440.0, 48000.0, 48000, 0.8);
        phaser.process(&mut buf, &params(EffectKind::Phaser));
        assert!(buf.iter().all(|s| s.left.abs() < 8.0 && s.left.is_finite()));
        assert!(rms(&buf) > 0.0);
    }

    #[test]
    fn test_flanger_changes_signal() {
        let mut flanger = FlangerProcessor::new(48000.0);
        let mut buf = sine(3000.0, 48000.0, 9600, 0.5);
        let original = buf.clone();
        flanger.process(&mut buf, &params(EffectKind::Flanger));
        let diff: f32 = buf
            .iter()
            .zip(original.iter())
            .map(|(a, b)| (a.left - b.left).abs())
            .sum();
        assert!(diff > 1.0);
    }

    #[test]
    fn test_flanger_reset_clears_line() {
        let mut flanger = FlangerProcessor::new(48000.0);
        let mut buf = sine(300.0, 48000.0, 1024, 0.5);
        flanger.process(&mut buf, &params(EffectKind::Flanger));
        flanger.reset();
        let mut silent = vec![StereoSample::silence(); 1024];
        flanger.process(&mut silent, &params(EffectKind::Flanger));
        assert_eq!(rms(&silent), 0.0);
    }
}
