//! Native effect processors
//!
//! One small processor per [`EffectKind`]. Processors render fully wet;
//! the rack owns wet/dry mixing and bypass. All state is allocated in the
//! constructor so `process` is real-time safe.

mod convolution;
mod delay;
mod distortion;
mod dynamics;
mod filter;
mod modulation;
mod repeat;
mod reverb;

pub use convolution::ConvolutionProcessor;
pub use delay::DelayProcessor;
pub use distortion::DistortionProcessor;
pub use dynamics::{CompressorProcessor, GateProcessor};
pub use filter::FilterProcessor;
pub use modulation::{FlangerProcessor, PhaserProcessor};
pub use repeat::{RepeatMode, RepeatProcessor};
pub use reverb::ReverbProcessor;

use super::{EffectKind, EffectParameters};
use crate::types::StereoSample;

/// A DSP stage in a stem rack
pub trait EffectProcessor: Send {
    /// Replace `buffer` with the fully wet signal
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters);

    /// Clear tails and internal state
    fn reset(&mut self);
}

/// Construct the processor for an effect kind
pub fn build_processor(kind: EffectKind, sample_rate: u32) -> Box<dyn EffectProcessor> {
    let sr = sample_rate.max(1) as f32;
    match kind {
        EffectKind::Compression => Box::new(CompressorProcessor::new(sr)),
        EffectKind::Filter => Box::new(FilterProcessor::new(sr)),
        EffectKind::Distortion => Box::new(DistortionProcessor::new(sr)),
        EffectKind::Delay => Box::new(DelayProcessor::new(sr)),
        EffectKind::Reverb => Box::new(ReverbProcessor::new(sr)),
        EffectKind::Phaser => Box::new(PhaserProcessor::new(sr)),
        EffectKind::Flanger => Box::new(FlangerProcessor::new(sr)),
        EffectKind::Gate => Box::new(GateProcessor::new(sr)),
        EffectKind::Stutter => Box::new(RepeatProcessor::new(RepeatMode::Stutter, sr)),
        EffectKind::Convolution => Box::new(ConvolutionProcessor::new(sr)),
        EffectKind::Freeze => Box::new(RepeatProcessor::new(RepeatMode::Freeze, sr)),
        EffectKind::Loop => Box::new(RepeatProcessor::new(RepeatMode::Loop, sr)),
    }
}

/// One-pole smoothing coefficient for a time constant in seconds
///
/// `coeff = exp(-1 / (τ × fs))`
#[inline]
pub(crate) fn one_pole_coeff(seconds: f32, sample_rate: f32) -> f32 {
    (-1.0 / (seconds.max(1e-5) * sample_rate)).exp()
}

#[inline]
pub(crate) fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Map a 0-1 control onto `[min, max]` exponentially
#[inline]
pub(crate) fn exp_range(x: f32, min: f32, max: f32) -> f32 {
    min * (max / min).powf(x.clamp(0.0, 1.0))
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::types::StereoSample;

    pub fn sine(freq: f32, sample_rate: f32, len: usize, amp: f32) -> Vec<StereoSample> {
        (0..len)
            .map(|i| {
                let v = amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin();
                StereoSample::mono(v)
            })
            .collect()
    }

    pub fn rms(buf: &[StereoSample]) -> f32 {
        let sum: f32 = buf.iter().map(|s| s.left * s.left + s.right * s.right).sum();
        (sum / (2 * buf.len().max(1)) as f32).sqrt()
    }

    pub fn impulse(len: usize) -> Vec<StereoSample> {
        let mut buf = vec![StereoSample::silence(); len];
        buf[0] = StereoSample::mono(1.0);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_builds_and_stays_finite() {
        for kind in EffectKind::ALL {
            let mut p = build_processor(kind, 48000);
            let mut params = EffectParameters::default_for(kind);
            params.enabled = true;
            params.intensity = 0.8;
            let mut buf = test_util::sine(220.0, 48000.0, 512, 0.5);
            p.process(&mut buf, &params);
            assert!(
                buf.iter().all(|s| s.left.is_finite() && s.right.is_finite()),
                "{} produced non-finite output",
                kind
            );
            p.reset();
        }
    }

    #[test]
    fn test_exp_range_endpoints() {
        assert!((exp_range(0.0, 20.0, 20000.0) - 20.0).abs() < 1e-3);
        assert!((exp_range(1.0, 20.0, 20000.0) - 20000.0).abs() < 1.0);
    }
}
