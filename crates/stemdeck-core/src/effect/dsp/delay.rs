//! Feedback delay
//!
//! - param1: delay time (10ms - 2s)
//! - intensity: feedback (0 - 95%)
//! - param2: ping-pong above 0.5

use super::EffectProcessor;
use crate::effect::EffectParameters;
use crate::types::StereoSample;

/// Longest delay time in seconds
const MAX_DELAY_SECONDS: f32 = 2.0;

/// Stereo delay line with a fixed maximum length
struct DelayLine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); max_samples.max(2)],
            write_pos: 0,
            delay_samples: 1,
        }
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.buffer.len() - 1);
    }

    #[inline]
    fn read(&self) -> StereoSample {
        let len = self.buffer.len();
        self.buffer[(self.write_pos + len - self.delay_samples) % len]
    }

    #[inline]
    fn write(&mut self, sample: StereoSample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    fn reset(&mut self) {
        self.buffer.fill(StereoSample::silence());
        self.write_pos = 0;
    }
}

pub struct DelayProcessor {
    sample_rate: f32,
    line: DelayLine,
}

impl DelayProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            line: DelayLine::new((sample_rate * MAX_DELAY_SECONDS) as usize),
        }
    }

    fn delay_ms(param1: f32) -> f32 {
        10.0 + param1.clamp(0.0, 1.0) * (MAX_DELAY_SECONDS * 1000.0 - 10.0)
    }
}

impl EffectProcessor for DelayProcessor {
    fn process(&mut self, buffer: &mut [StereoSample], params: &EffectParameters) {
        let samples = (Self::delay_ms(params.param1) / 1000.0 * self.sample_rate) as usize;
        self.line.set_delay_samples(samples);
        let feedback = params.intensity.clamp(0.0, 1.0) * 0.95;
        let ping_pong = params.param2 > 0.5;

        for sample in buffer.iter_mut() {
            let delayed = self.line.read();
            // Ping-pong swaps channels in the feedback path
            let fb = if ping_pong {
                StereoSample::new(delayed.right, delayed.left)
            } else {
                delayed
            };
            self.line.write(*sample + fb * feedback);
            *sample = delayed;
        }
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}
