//! DJ-style sweep filter
//!
//! - intensity: sweep depth (0 = open, 1 = fully closed)
//! - param1: direction (< 0.5 low-pass, >= 0.5 high-pass)
//! - param2: resonance

use super::{exp_range, EffectProcessor};
use crate::effect::EffectParameters;
use crate::types::StereoSample;

/// Two-pole (12dB/octave) state-variable filter, trapezoidal integration
struct Svf {
    ic1eq: [f32; 2],
    ic2eq: [f32; 2],
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl Svf {
    fn new() -> Self {
        Self {
            ic1eq: [0.0; 2],
            ic2eq: [0.0; 2],
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        }
    }

    fn set_params(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        let cutoff = cutoff.clamp(20.0, sample_rate * 0.45);
        let g = (std::f32::consts::PI * cutoff / sample_rate).tan();
        self.k = 1.0 / q.clamp(0.1, 10.0);
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    /// Returns (lowpass, highpass) for one channel
    #[inline]
    fn tick(&mut self, ch: usize, input: f32) -> (f32, f32) {
        let v3 = input - self.ic2eq[ch];
        let v1 = self.a1 * self.ic1eq[ch] + self.a2 * v3;
        let v2 = self.ic2eq[ch] + self.a2 * self.ic1eq[ch] + self.a3 * v3;
        self.ic1eq[ch] = 2.0 * v1 - self.ic1eq[ch];
        self.ic2eq[ch] = 2.0 * v2 - self.ic2eq[ch];
        let low = v2;
        let high = input - self.k * v1 - low;
        (low, high)
    }

    fn reset(&mut self) {
        self.ic1eq = [0.0; 2];
        self.ic2eq = [0.0; 2];
    }
}

pub struct FilterProcessor {
    sample_rate: f32,
    svf: Svf,
}

impl FilterProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            svf: Svf::new(),
        }
    }

    /// Cutoff for a sweep depth: LP closes 20kHz -> 100Hz, HP opens 20Hz -> 5kHz
    fn cutoff(depth: f32, high_pass: bool) -> f32 {
        if high_pass {
            exp_range(depth, 20.0, 5000.0)
        } else {
            exp_range(1.0 - depth, 100.0, 20000.0)
        }
    }
}

impl EffectProcessor for FilterProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let high_pass = params.param1 >= 0.5;
        let q = 0.5 + params.param2 * 7.5;
        self.svf
            .set_params(Self::cutoff(params.intensity, high_pass), q, self.sample_rate);

        for sample in buffer.iter_mut() {
            let (low_l, high_l) = self.svf.tick(0, sample.left);
            let (low_r, high_r) = self.svf.tick(1, sample.right);
            if high_pass {
                sample.left = high_l;
                sample.right = high_r;
            } else {
                sample.left = low_l;
                sample.right = low_r;
            }
        }
    }

    fn reset(&mut self) {
        self.svf.reset();
    }
}
