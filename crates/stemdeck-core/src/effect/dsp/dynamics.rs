//! Compressor and noise gate
//!
//! Both follow a stereo-linked peak envelope with separate attack and
//! release coefficients and apply the resulting gain to both channels.

use super::{db_to_linear, one_pole_coeff, EffectProcessor};
use crate::effect::EffectParameters;
use crate::types::StereoSample;

/// Peak envelope follower with attack/release smoothing
#[derive(Debug, Clone, Copy)]
struct Envelope {
    level: f32,
}

impl Envelope {
    #[inline]
    fn follow(&mut self, input: f32, attack: f32, release: f32) -> f32 {
        let coeff = if input > self.level { attack } else { release };
        self.level = input + coeff * (self.level - input);
        self.level
    }
}

/// Downward compressor
///
/// - intensity: amount (threshold 0 → -40 dBFS, ratio 1:1 → 20:1)
/// - param1: attack (0.1 - 50 ms)
/// - param2: release (20 - 500 ms)
pub struct CompressorProcessor {
    sample_rate: f32,
    envelope: Envelope,
}

impl CompressorProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            envelope: Envelope { level: 0.0 },
        }
    }

    fn gain_for(level: f32, threshold: f32, ratio: f32) -> f32 {
        if level <= threshold || level <= 0.0 {
            return 1.0;
        }
        // Above threshold the output rises 1/ratio dB per input dB
        let over_db = 20.0 * (level / threshold).log10();
        db_to_linear(-over_db * (1.0 - 1.0 / ratio))
    }
}

impl EffectProcessor for CompressorProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let amount = params.intensity.clamp(0.0, 1.0);
        let threshold = db_to_linear(-40.0 * amount);
        let ratio = 1.0 + 19.0 * amount;
        let attack = one_pole_coeff(0.0001 + params.param1.clamp(0.0, 1.0) * 0.05, self.sample_rate);
        let release = one_pole_coeff(0.02 + params.param2.clamp(0.0, 1.0) * 0.48, self.sample_rate);

        for sample in buffer.iter_mut() {
            let level = self.envelope.follow(sample.peak(), attack, release);
            *sample *= Self::gain_for(level, threshold, ratio);
        }
    }

    fn reset(&mut self) {
        self.envelope.level = 0.0;
    }
}

/// Noise gate
///
/// - intensity: threshold (-80 → -20 dBFS)
/// - param1: attack (0.1 - 10 ms)
/// - param2: release (10 - 300 ms)
pub struct GateProcessor {
    sample_rate: f32,
    envelope: Envelope,
    gain: f32,
}

impl GateProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            envelope: Envelope { level: 0.0 },
            gain: 0.0,
        }
    }
}

impl EffectProcessor for GateProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let threshold = db_to_linear(-80.0 + 60.0 * params.intensity.clamp(0.0, 1.0));
        let attack = one_pole_coeff(0.0001 + params.param1.clamp(0.0, 1.0) * 0.01, self.sample_rate);
        let release = one_pole_coeff(0.01 + params.param2.clamp(0.0, 1.0) * 0.29, self.sample_rate);
        // Detector runs fast; the gain itself carries attack/release
        let detect = one_pole_coeff(0.001, self.sample_rate);

        for sample in buffer.iter_mut() {
            let level = self.envelope.follow(sample.peak(), 0.0, detect);
            let open = if level >= threshold { 1.0 } else { 0.0 };
            let coeff = if open > self.gain { attack } else { release };
            self.gain = open + coeff * (self.gain - open);
            *sample *= self.gain;
        }
    }

    fn reset(&mut self) {
        self.envelope.level = 0.0;
        self.gain = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::dsp::test_util::{rms, sine};
    use crate::effect::EffectKind;

    fn params(kind: EffectKind, intensity: f32) -> EffectParameters {
        EffectParameters {
            enabled: true,
            intensity,
            param1: 0.0,
            param2: 0.2,
            ..EffectParameters::default_for(kind)
        }
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut comp = CompressorProcessor::new(48000.0);
        let mut buf = sine(200.0, 48000.0, 48000, 0.9);
        let before = rms(&buf[24000..]);
        comp.process(&mut buf, &params(EffectKind::Compression, 0.8));
        assert!(rms(&buf[24000..]) < before * 0.5);
    }

    #[test]
    fn test_compressor_zero_amount_is_transparent() {
        let mut comp = CompressorProcessor::new(48000.0);
        let mut buf = sine(200.0, 48000.0, 4800, 0.5);
        let original = buf.clone();
        comp.process(&mut buf, &params(EffectKind::Compression, 0.0));
        for (a, b) in buf.iter().zip(original.iter()) {
            assert!((a.left - b.left).abs() < 1e-6);
        }
    }

    #[test]
    fn test_gate_closes_on_quiet_input() {
        let mut gate = GateProcessor::new(48000.0);
        // -60 dBFS against a -32 dBFS threshold
        let mut buf = sine(200.0, 48000.0, 9600, 0.001);
        gate.process(&mut buf, &params(EffectKind::Gate, 0.8));
        assert!(rms(&buf[4800..]) < 1e-6);
    }

    #[test]
    fn test_gate_opens_on_loud_input() {
        let mut gate = GateProcessor::new(48000.0);
        let mut buf = sine(200.0, 48000.0, 9600, 0.5);
        gate.process(&mut buf, &params(EffectKind::Gate, 0.5));
        let out = rms(&buf[4800..]);
        assert!(out > 0.3, "gate stayed shut: {}", out);
    }
}
