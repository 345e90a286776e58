//! Linear parameter ramps for the audio thread
//!
//! Every gain the renderer applies (matrix cells, effect wet/dry) moves
//! toward its target over a fixed number of frames instead of jumping,
//! which keeps parameter changes click-free regardless of when the
//! command lands.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: usize,
}

impl GainRamp {
    /// A settled ramp sitting at `value`
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Head toward `target` over `frames` frames (at least one)
    pub fn set_target(&mut self, target: f32, frames: usize) {
        if (target - self.target).abs() < f32::EPSILON && self.remaining == 0 {
            self.current = target;
            self.target = target;
            return;
        }
        let frames = frames.max(1);
        self.target = target;
        self.step = (target - self.current) / frames as f32;
        self.remaining = frames;
    }

    /// Jump straight to `value` (hard mute, rebuilds)
    pub fn snap(&mut self, value: f32) {
        *self = Self::new(value);
    }

    /// Value for the next frame
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    /// Skip `frames` frames without producing per-frame values
    pub fn advance(&mut self, frames: usize) {
        if frames >= self.remaining {
            self.current = self.target;
            self.remaining = 0;
        } else {
            self.current += self.step * frames as f32;
            self.remaining -= frames;
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }

    /// Settled at zero: nothing to render
    #[inline]
    pub fn is_silent(&self) -> bool {
        self.remaining == 0 && self.current == 0.0
    }
}

impl Default for GainRamp {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaches_target_exactly() {
        let mut ramp = GainRamp::new(0.0);
        ramp.set_target(1.0, 4);
        let values: Vec<f32> = (0..4).map(|_| ramp.next_value()).collect();
        assert!((values[0] - 0.25).abs() < 1e-6);
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert_eq!(values[3], 1.0);
        assert!(ramp.is_settled());
        assert_eq!(ramp.next_value(), 1.0);
    }

    #[test]
    fn test_never_steps_instantly() {
        let mut ramp = GainRamp::new(1.0);
        ramp.set_target(0.0, 480);
        let first = ramp.next_value();
        assert!(first > 0.99);
    }

    #[test]
    fn test_retarget_mid_ramp_starts_from_current() {
        let mut ramp = GainRamp::new(0.0);
        ramp.set_target(1.0, 10);
        ramp.advance(5);
        assert!((ramp.current() - 0.5).abs() < 1e-6);
        ramp.set_target(0.0, 5);
        ramp.next_value();
        assert!((ramp.current() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_snap_and_silence() {
        let mut ramp = GainRamp::new(0.8);
        ramp.set_target(0.3, 100);
        ramp.snap(0.0);
        assert!(ramp.is_silent());
        assert_eq!(ramp.next_value(), 0.0);
    }
}
