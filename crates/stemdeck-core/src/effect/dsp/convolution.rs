//! Short-IR convolution
//!
//! Convolves with a synthetic room response: decorrelated decaying noise
//! per channel, regenerated in place when its controls move.
//!
//! - param1: IR length (64 - 1024 taps)
//! - intensity: decay (0 = long, even tail; 1 = tight)

use super::EffectProcessor;
use crate::effect::EffectParameters;
use crate::types::StereoSample;

pub const MAX_IR_TAPS: usize = 1024;
const MIN_IR_TAPS: usize = 64;
const HISTORY_MASK: usize = MAX_IR_TAPS - 1;

/// xorshift32, enough for a reproducible noise burst
struct NoiseSource(u32);

impl NoiseSource {
    #[inline]
    fn next(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

pub struct ConvolutionProcessor {
    ir: [Vec<f32>; 2],
    taps: usize,
    /// Controls the current IR was generated for
    ir_key: (f32, f32),
    history: [Vec<f32>; 2],
    pos: usize,
}

impl ConvolutionProcessor {
    pub fn new(_sample_rate: f32) -> Self {
        let mut p = Self {
            ir: [vec![0.0; MAX_IR_TAPS], vec![0.0; MAX_IR_TAPS]],
            taps: 0,
            ir_key: (f32::NAN, f32::NAN),
            history: [vec![0.0; MAX_IR_TAPS], vec![0.0; MAX_IR_TAPS]],
            pos: 0,
        };
        p.regenerate(0.5, 0.5);
        p
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    fn regenerate(&mut self, length: f32, decay: f32) {
        let length = length.clamp(0.0, 1.0);
        let decay = decay.clamp(0.0, 1.0);
        self.taps = MIN_IR_TAPS + ((MAX_IR_TAPS - MIN_IR_TAPS) as f32 * length) as usize;
        // Reaches -60 dB at the last tap for decay 0, much earlier for 1
        let rate = (3.0 + 9.0 * decay) * std::f32::consts::LN_10 / self.taps as f32;

        for (ch, seed) in [0x9E37_79B9u32, 0x85EB_CA6B].into_iter().enumerate() {
            let mut noise = NoiseSource(seed);
            let ir = &mut self.ir[ch];
            ir[0] = 1.0;
            for (k, tap) in ir.iter_mut().enumerate().take(self.taps).skip(1) {
                *tap = noise.next() * (-rate * k as f32).exp();
            }
            ir[self.taps..].fill(0.0);
            let energy: f32 = ir.iter().map(|v| v * v).sum();
            let norm = 1.0 / energy.sqrt().max(1e-6);
            ir.iter_mut().for_each(|v| *v *= norm);
        }
        self.ir_key = (length, decay);
    }

    #[cfg(test)]
    fn ir(&self, channel: usize) -> &[f32] {
        &self.ir[channel][..self.taps]
    }
}

impl EffectProcessor for ConvolutionProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let key = (params.param1.clamp(0.0, 1.0), params.intensity.clamp(0.0, 1.0));
        if (key.0 - self.ir_key.0).abs() > 1e-3 || (key.1 - self.ir_key.1).abs() > 1e-3 || self.ir_key.0.is_nan() {
            self.regenerate(key.0, key.1);
        }

        for sample in buffer.iter_mut() {
            self.history[0][self.pos] = sample.left;
            self.history[1][self.pos] = sample.right;
            let mut out = [0.0f32; 2];
            for ch in 0..2 {
                let ir = &self.ir[ch];
                let hist = &self.history[ch];
                let mut acc = 0.0;
                for (k, &h) in ir[..self.taps].iter().enumerate() {
                    acc += h * hist[(self.pos + MAX_IR_TAPS - k) & HISTORY_MASK];
                }
                out[ch] = acc;
            }
            self.pos = (self.pos + 1) & HISTORY_MASK;
            sample.left = out[0];
            sample.right = out[1];
        }
    }

    fn reset(&mut self) {
        self.history.iter_mut().for_each(|h| h.fill(0.0));
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::dsp::test_util::{impulse, rms};
    use crate::effect::EffectKind;

    fn params(param1: f32) -> EffectParameters {
        EffectParameters {
            enabled: true,
            param1,
            ..EffectParameters::default_for(EffectKind::Convolution)
        }
    }

    #[test]
    fn test_impulse_returns_ir() {
        let mut conv = ConvolutionProcessor::new(48000.0);
        let mut buf = impulse(2048);
        conv.process(&mut buf, &params(0.25));
        let taps = conv.taps();
        for k in 0..taps {
            assert!((buf[k].left - conv.ir(0)[k]).abs() < 1e-6);
            assert!((buf[k].right - conv.ir(1)[k]).abs() < 1e-6);
        }
        assert!(buf[taps..].iter().all(|s| s.left == 0.0));
    }

    #[test]
    fn test_ir_is_deterministic_and_normalized() {
        let a = ConvolutionProcessor::new(48000.0);
        let b = ConvolutionProcessor::new(44100.0);
        assert_eq!(a.ir(0), b.ir(0));
        let energy: f32 = a.ir(0).iter().map(|v| v * v).sum();
        assert!((energy - 1.0).abs() < 1e-3);
        assert_ne!(a.ir(0), a.ir(1));
    }

    #[test]
    fn test_length_follows_param() {
        let mut conv = ConvolutionProcessor::new(48000.0);
        let mut buf = impulse(16);
        conv.process(&mut buf, &params(0.0));
        assert_eq!(conv.taps(), MIN_IR_TAPS);
        conv.process(&mut buf, &params(1.0));
        assert_eq!(conv.taps(), MAX_IR_TAPS);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut conv = ConvolutionProcessor::new(48000.0);
        let mut buf = impulse(32);
        conv.process(&mut buf, &params(1.0));
        conv.reset();
        let mut silent = vec![StereoSample::silence(); 256];
        conv.process(&mut silent, &params(1.0));
        assert_eq!(rms(&silent), 0.0);
    }
}
