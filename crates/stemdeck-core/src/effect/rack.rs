//! Audio-side effect rack for one stem slot
//!
//! Owns one processor per [`EffectKind`] plus the wet/dry ramps, all built
//! up front. Parameter and routing changes arrive as commands and only move
//! ramp targets, so `process` never allocates.

use super::dsp::{build_processor, EffectProcessor};
use super::{EffectKind, EffectParameters, RoutingMode, NUM_EFFECTS};
use crate::engine::GainRamp;
use crate::types::{StereoBuffer, StereoSample};

pub struct StemRack {
    processors: Vec<Box<dyn EffectProcessor>>,
    params: [EffectParameters; NUM_EFFECTS],
    wet: [GainRamp; NUM_EFFECTS],
    /// Processor has rendered since its last reset
    engaged: [bool; NUM_EFFECTS],
    /// Dry level in parallel routing
    dry: GainRamp,
    routing: RoutingMode,
    ramp_frames: usize,
    parallel_dry_gain: f32,
    stage: StereoBuffer,
    acc: StereoBuffer,
    rebuilds: u64,
}

impl StemRack {
    pub fn new(sample_rate: u32, max_block_frames: usize, ramp_frames: usize, parallel_dry_gain: f32) -> Self {
        let params = std::array::from_fn(|i| EffectParameters::default_for(EffectKind::ALL[i]));
        Self {
            processors: EffectKind::ALL
                .iter()
                .map(|&kind| build_processor(kind, sample_rate))
                .collect(),
            params,
            wet: [GainRamp::new(0.0); NUM_EFFECTS],
            engaged: [false; NUM_EFFECTS],
            dry: GainRamp::new(1.0),
            routing: RoutingMode::Serial,
            ramp_frames: ramp_frames.max(1),
            parallel_dry_gain: parallel_dry_gain.clamp(0.0, 1.0),
            stage: StereoBuffer::silence(max_block_frames),
            acc: StereoBuffer::silence(max_block_frames),
            rebuilds: 0,
        }
    }

    pub fn routing(&self) -> RoutingMode {
        self.routing
    }

    pub fn params(&self, kind: EffectKind) -> &EffectParameters {
        &self.params[kind.index()]
    }

    /// Current (ramping) wet gain of an effect
    pub fn wet_gain(&self, kind: EffectKind) -> f32 {
        self.wet[kind.index()].current()
    }

    /// Current (ramping) dry gain in parallel routing
    pub fn dry_gain(&self) -> f32 {
        self.dry.current()
    }

    /// Number of topology rebuilds so far
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn any_active(&self) -> bool {
        self.params.iter().any(EffectParameters::is_active)
    }

    fn dry_target(&self) -> f32 {
        if self.any_active() {
            self.parallel_dry_gain
        } else {
            1.0
        }
    }

    fn wet_target(params: &EffectParameters) -> f32 {
        if params.is_active() {
            params.wetness
        } else {
            0.0
        }
    }

    /// Store new parameters and ramp the wet/dry mix toward them
    pub fn set_params(&mut self, kind: EffectKind, params: EffectParameters) {
        let i = kind.index();
        let params = params.clamped();
        // Re-engaging a quiet stage starts from clean state
        if params.is_active() && !self.engaged[i] {
            self.processors[i].reset();
        }
        self.params[i] = params;
        self.wet[i].set_target(Self::wet_target(&params), self.ramp_frames);
        let dry = self.dry_target();
        self.dry.set_target(dry, self.ramp_frames);
    }

    /// Switch routing, rebuilding only when the topology actually changes
    pub fn set_routing(&mut self, mode: RoutingMode) -> bool {
        if mode == self.routing {
            return false;
        }
        self.routing = mode;
        self.rebuild();
        true
    }

    /// Reset every processor and settle all ramps at their targets
    fn rebuild(&mut self) {
        for (i, processor) in self.processors.iter_mut().enumerate() {
            processor.reset();
            self.engaged[i] = false;
            self.wet[i].snap(Self::wet_target(&self.params[i]));
        }
        let dry = self.dry_target();
        self.dry.snap(dry);
        self.rebuilds += 1;
    }

    /// Clear tails without touching parameters
    pub fn reset(&mut self) {
        for (i, processor) in self.processors.iter_mut().enumerate() {
            processor.reset();
            self.engaged[i] = false;
        }
    }

    /// Render `buffer` through the chain in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let frames = buffer.len().min(self.stage.capacity());
        match self.routing {
            RoutingMode::Serial => self.process_serial(&mut buffer.as_mut_slice()[..frames]),
            RoutingMode::Parallel => self.process_parallel(&mut buffer.as_mut_slice()[..frames]),
        }
    }

    /// A stage that is off and fully faded out is skipped entirely
    fn stage_running(&mut self, i: usize) -> bool {
        let running = self.params[i].is_active() || !self.wet[i].is_silent();
        if !running {
            self.engaged[i] = false;
        }
        running
    }

    fn process_serial(&mut self, buffer: &mut [StereoSample]) {
        let frames = buffer.len();
        self.stage.set_len_from_capacity(frames);
        for i in 0..NUM_EFFECTS {
            if !self.stage_running(i) {
                continue;
            }
            let stage = self.stage.as_mut_slice();
            stage.copy_from_slice(buffer);
            self.processors[i].process(stage, &self.params[i]);
            self.engaged[i] = true;

            let ramp = &mut self.wet[i];
            for (x, fx) in buffer.iter_mut().zip(stage.iter()) {
                let w = ramp.next_value();
                *x = *x * (1.0 - w) + *fx * w;
            }
        }
    }

    fn process_parallel(&mut self, buffer: &mut [StereoSample]) {
        let frames = buffer.len();
        self.stage.set_len_from_capacity(frames);
        self.acc.set_len_from_capacity(frames);

        {
            let acc = self.acc.as_mut_slice();
            for (a, x) in acc.iter_mut().zip(buffer.iter()) {
                *a = *x * self.dry.next_value();
            }
        }

        for i in 0..NUM_EFFECTS {
            if !self.stage_running(i) {
                continue;
            }
            let stage = self.stage.as_mut_slice();
            stage.copy_from_slice(buffer);
            self.processors[i].process(stage, &self.params[i]);
            self.engaged[i] = true;

            let ramp = &mut self.wet[i];
            for (a, fx) in self.acc.as_mut_slice().iter_mut().zip(stage.iter()) {
                *a += *fx * ramp.next_value();
            }
        }

        buffer.copy_from_slice(self.acc.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::dsp::test_util::sine;

    const RATE: u32 = 48000;

    fn rack() -> StemRack {
        StemRack::new(RATE, 1024, 480, 0.7)
    }

    fn block() -> StereoBuffer {
        StereoBuffer::from_vec(sine(220.0, RATE as f32, 1024, 0.5))
    }

    /// Compressor at zero amount renders its input unchanged
    fn transparent_comp() -> EffectParameters {
        EffectParameters {
            enabled: true,
            wetness: 1.0,
            intensity: 0.0,
            ..EffectParameters::default_for(EffectKind::Compression)
        }
    }

    #[test]
    fn test_empty_chain_is_pass_through() {
        let mut rack = rack();
        let mut buf = block();
        let original = buf.clone();
        rack.process(&mut buf);
        assert_eq!(buf.as_slice(), original.as_slice());
    }

    #[test]
    fn test_bypassed_effect_passes_through() {
        let mut rack = rack();
        let mut params = EffectParameters::default_for(EffectKind::Distortion);
        params.enabled = true;
        params.bypass = true;
        params.intensity = 1.0;
        rack.set_params(EffectKind::Distortion, params);

        let mut buf = block();
        let original = buf.clone();
        rack.process(&mut buf);
        assert_eq!(buf.as_slice(), original.as_slice());
    }

    #[test]
    fn test_wet_ramps_instead_of_stepping() {
        let mut rack = rack();
        let mut params = EffectParameters::default_for(EffectKind::Distortion);
        params.enabled = true;
        params.wetness = 1.0;
        rack.set_params(EffectKind::Distortion, params);

        let mut buf = StereoBuffer::silence(4);
        rack.process(&mut buf);
        let w = rack.wet_gain(EffectKind::Distortion);
        assert!(w > 0.0 && w < 0.05, "wet jumped to {}", w);
    }

    #[test]
    fn test_parallel_sums_attenuated_dry_and_wet() {
        let mut rack = rack();
        rack.set_params(EffectKind::Compression, transparent_comp());
        assert!(rack.set_routing(RoutingMode::Parallel));
        // Rebuild settles ramps at their targets
        assert!((rack.dry_gain() - 0.7).abs() < 1e-6);

        let mut buf = block();
        let original = buf.clone();
        rack.process(&mut buf);
        for (out, x) in buf.iter().zip(original.iter()).skip(16) {
            assert!((out.left - x.left * 1.7).abs() < 1e-4);
        }
    }

    #[test]
    fn test_parallel_without_effects_keeps_full_dry() {
        let mut rack = rack();
        rack.set_routing(RoutingMode::Parallel);
        let mut buf = block();
        let original = buf.clone();
        rack.process(&mut buf);
        assert_eq!(buf.as_slice(), original.as_slice());
    }

    #[test]
    fn test_serial_transparent_stage() {
        let mut rack = rack();
        rack.set_params(EffectKind::Compression, transparent_comp());
        let mut buf = block();
        let original = buf.clone();
        rack.process(&mut buf);
        for (out, x) in buf.iter().zip(original.iter()) {
            assert!((out.left - x.left).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rebuild_only_on_topology_change() {
        let mut rack = rack();
        assert!(!rack.set_routing(RoutingMode::Serial));
        assert_eq!(rack.rebuild_count(), 0);
        assert!(rack.set_routing(RoutingMode::Parallel));
        assert!(!rack.set_routing(RoutingMode::Parallel));
        assert_eq!(rack.rebuild_count(), 1);
    }

    #[test]
    fn test_stage_fades_out_after_disable() {
        let mut rack = rack();
        let mut params = transparent_comp();
        rack.set_params(EffectKind::Compression, params);
        let mut buf = block();
        rack.process(&mut buf);

        params.enabled = false;
        rack.set_params(EffectKind::Compression, params);
        let mut buf = block();
        rack.process(&mut buf);
        assert_eq!(rack.wet_gain(EffectKind::Compression), 0.0);
    }
}
