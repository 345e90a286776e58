//! N×N matrix summing on the audio thread
//!
//! Each cell has its own [`GainRamp`]; a gain command only retargets the
//! ramp. Every target stem gets a bus, and the master is the sum of buses.

use super::ramp::GainRamp;
use crate::types::StereoBuffer;

pub struct MixBus {
    size: usize,
    /// Row-major: `source * size + target`
    ramps: Vec<GainRamp>,
    buses: Vec<StereoBuffer>,
    ramp_frames: usize,
}

impl MixBus {
    /// Identity routing: unity on the diagonal
    pub fn new(size: usize, max_block_frames: usize, ramp_frames: usize) -> Self {
        Self {
            size,
            ramps: (0..size * size)
                .map(|idx| GainRamp::new(if idx / size == idx % size { 1.0 } else { 0.0 }))
                .collect(),
            buses: (0..size).map(|_| StereoBuffer::silence(max_block_frames)).collect(),
            ramp_frames: ramp_frames.max(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Retarget a cell; returns false for a cell outside the grid
    pub fn set_gain(&mut self, source: usize, target: usize, gain: f32) -> bool {
        if source >= self.size || target >= self.size {
            return false;
        }
        let frames = self.ramp_frames;
        self.ramps[source * self.size + target].set_target(gain, frames);
        true
    }

    /// Gain a cell is applying right now
    pub fn gain(&self, source: usize, target: usize) -> f32 {
        if source >= self.size || target >= self.size {
            return 0.0;
        }
        self.ramps[source * self.size + target].current()
    }

    /// Current gains, row-major
    pub fn gains(&self) -> impl Iterator<Item = f32> + '_ {
        self.ramps.iter().map(GainRamp::current)
    }

    /// The summed signal arriving at one target stem in the last block
    pub fn bus(&self, target: usize) -> Option<&StereoBuffer> {
        self.buses.get(target)
    }

    /// Route `sources` (one buffer per stem slot) into the buses and master
    pub fn mix<'a, I>(&mut self, sources: I, master: &mut StereoBuffer)
    where
        I: IntoIterator<Item = &'a StereoBuffer>,
    {
        let frames = master.len().min(self.buses.first().map(StereoBuffer::capacity).unwrap_or(0));
        for bus in &mut self.buses {
            bus.set_len_from_capacity(frames);
            bus.fill_silence();
        }

        let mut mixed_sources = 0;
        for (source, input) in sources.into_iter().enumerate().take(self.size) {
            mixed_sources += 1;
            let input = &input.as_slice()[..frames.min(input.len())];
            for target in 0..self.size {
                let ramp = &mut self.ramps[source * self.size + target];
                if ramp.is_silent() {
                    continue;
                }
                let bus = &mut self.buses[target].as_mut_slice()[..input.len()];
                for (dst, src) in bus.iter_mut().zip(input.iter()) {
                    *dst += *src * ramp.next_value();
                }
                // Keep ramps in step when the source block was short
                ramp.advance(frames - input.len());
            }
        }
        // Sources with no buffer still move their ramps along
        for source in mixed_sources..self.size {
            for target in 0..self.size {
                self.ramps[source * self.size + target].advance(frames);
            }
        }

        master.fill_silence();
        let out = &mut master.as_mut_slice()[..frames];
        for bus in &self.buses {
            for (dst, src) in out.iter_mut().zip(bus.iter()) {
                *dst += *src;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn constant(value: f32, len: usize) -> StereoBuffer {
        StereoBuffer::from_vec(vec![StereoSample::mono(value); len])
    }

    #[test]
    fn test_identity_is_sum_of_stems() {
        let mut bus = MixBus::new(4, 64, 8);
        let stems: Vec<StereoBuffer> = (0..4).map(|i| constant(0.1 * (i + 1) as f32, 64)).collect();
        let mut master = StereoBuffer::silence(64);
        bus.mix(stems.iter(), &mut master);

        for s in master.iter() {
            assert!((s.left - 1.0).abs() < 1e-6);
        }
        // No cross-bleed: each bus holds only its own stem
        for (i, stem) in stems.iter().enumerate() {
            let b = bus.bus(i).unwrap();
            assert!((b[10].left - stem[10].left).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cross_route_ramps_in() {
        let mut bus = MixBus::new(2, 32, 16);
        assert!(bus.set_gain(0, 1, 0.5));
        let stems = [constant(1.0, 32), constant(0.0, 32)];
        let mut master = StereoBuffer::silence(32);
        bus.mix(stems.iter(), &mut master);

        let b1 = bus.bus(1).unwrap();
        assert!(b1[0].left > 0.0 && b1[0].left < 0.1);
        assert!((b1[31].left - 0.5).abs() < 1e-6);
        assert!((bus.gain(0, 1) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_cell_rejected() {
        let mut bus = MixBus::new(2, 32, 16);
        assert!(!bus.set_gain(2, 0, 1.0));
        assert_eq!(bus.gain(5, 5), 0.0);
    }

    #[test]
    fn test_missing_sources_advance_ramps() {
        let mut bus = MixBus::new(2, 32, 16);
        bus.set_gain(1, 1, 0.0);
        let stems = [constant(1.0, 32)];
        let mut master = StereoBuffer::silence(32);
        bus.mix(stems.iter(), &mut master);
        assert_eq!(bus.gain(1, 1), 0.0);
    }
}
