//! Freeverb-style stereo reverb
//!
//! - intensity: room size (decay)
//! - param1: damping (0 = bright, 1 = dark)
//! - param2: stereo width

use super::EffectProcessor;
use crate::effect::EffectParameters;
use crate::types::StereoSample;

/// Comb delay lengths at 44.1kHz, mutually prime-ish to avoid resonances
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];
/// Right-channel length offset for decorrelation
const STEREO_SPREAD: usize = 23;
const ALLPASS_FEEDBACK: f32 = 0.5;
/// Input scaling so eight summed combs don't clip
const COMB_GAIN: f32 = 0.2;

fn scaled_len(len: usize, sample_rate: f32) -> usize {
    ((len as f32 * sample_rate / 44100.0) as usize).max(1)
}

struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
            store: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.store = out * (1.0 - damp) + self.store * damp;
        self.buffer[self.pos] = input + self.store * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.store = 0.0;
    }
}

struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        self.buffer[self.pos] = input + buffered * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        buffered - input
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

pub struct ReverbProcessor {
    combs: [Vec<Comb>; 2],
    allpasses: [Vec<Allpass>; 2],
}

impl ReverbProcessor {
    pub fn new(sample_rate: f32) -> Self {
        let combs = |spread: usize| {
            COMB_LENGTHS
                .iter()
                .map(|&l| Comb::new(scaled_len(l + spread, sample_rate)))
                .collect::<Vec<_>>()
        };
        let allpasses = |spread: usize| {
            ALLPASS_LENGTHS
                .iter()
                .map(|&l| Allpass::new(scaled_len(l + spread, sample_rate)))
                .collect::<Vec<_>>()
        };
        Self {
            combs: [combs(0), combs(STEREO_SPREAD)],
            allpasses: [allpasses(0), allpasses(STEREO_SPREAD)],
        }
    }
}

impl EffectProcessor for ReverbProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        // Feedback range 0.7-0.98 keeps the tail bounded
        let room = 0.7 + params.intensity.clamp(0.0, 1.0) * 0.28;
        let damp = params.param1.clamp(0.0, 1.0) * 0.4;
        let width = params.param2.clamp(0.0, 1.0);
        let wet1 = width / 2.0 + 0.5;
        let wet2 = (1.0 - width) / 2.0;

        for sample in buffer.iter_mut() {
            let input = (sample.left + sample.right) * 0.5 * COMB_GAIN;
            let mut out = [0.0f32; 2];
            for ch in 0..2 {
                for comb in &mut self.combs[ch] {
                    out[ch] += comb.tick(input, room, damp);
                }
                for ap in &mut self.allpasses[ch] {
                    out[ch] = ap.tick(out[ch]);
                }
            }
            sample.left = out[0] * wet1 + out[1] * wet2;
            sample.right = out[1] * wet1 + out[0] * wet2;
        }
    }

    fn reset(&mut self) {
        for ch in 0..2 {
            self.combs[ch].iter_mut().for_each(Comb::reset);
            self.allpasses[ch].iter_mut().for_each(Allpass::reset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::dsp::test_util::{impulse, rms};
    use crate::effect::EffectKind;

    fn params(room: f32) -> EffectParameters {
        EffectParameters {
            enabled: true,
            intensity: room,
            ..EffectParameters::default_for(EffectKind::Reverb)
        }
    }

    #[test]
    fn test_impulse_produces_tail() {
        let mut r = ReverbProcessor::new(48000.0);
        let mut buf = impulse(48000);
        r.process(&mut buf, &params(0.5));
        assert!(rms(&buf[4800..9600]) > 0.0);
        assert!(buf.iter().all(|s| s.left.is_finite()));
    }

    #[test]
    fn test_bigger_room_rings_longer() {
        let tail = |room: f32| {
            let mut r = ReverbProcessor::new(48000.0);
            let mut buf = impulse(96000);
            r.process(&mut buf, &params(room));
            rms(&buf[72000..])
        };
        assert!(tail(1.0) > tail(0.0));
    }

    #[test]
    fn test_reset_silences() {
        let mut r = ReverbProcessor::new(48000.0);
        let mut buf = impulse(1000);
        r.process(&mut buf, &params(0.8));
        r.reset();
        let mut silent = vec![StereoSample::silence(); 4000];
        r.process(&mut silent, &params(0.8));
        assert_eq!(rms(&silent), 0.0);
    }
}
