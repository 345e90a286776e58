//! Audio-thread side of the engine
//!
//! [`AudioRenderer::process`] is the real-time callback body: apply queued
//! commands, render every stem slot through its ring and effect rack in
//! parallel, then sum through the mix bus. Everything it touches was
//! allocated up front; it never locks, never allocates and never frees a
//! stem buffer (replaced buffers go back over the return queue).

use super::command::{CommandReceiver, EngineCommand};
use super::mixbus::MixBus;
use super::telemetry::EngineTelemetry;
use crate::buffer::StemBuffer;
use crate::effect::StemRack;
use crate::types::StereoBuffer;
use rayon::prelude::*;
use std::sync::Arc;

/// Per-slot playback state, owned by the audio thread
struct Slot {
    stem: Option<Box<StemBuffer>>,
    rack: StemRack,
    muted: bool,
    output: StereoBuffer,
}

impl Slot {
    /// Render one block into `output`; returns false on underrun
    fn render(&mut self, frames: usize, looping: bool, now: f64) -> bool {
        self.output.set_len_from_capacity(frames);
        let Some(stem) = self.stem.as_mut() else {
            self.output.fill_silence();
            return true;
        };
        let ok = stem.read_block(self.output.as_mut_slice(), looping, now);
        // The rack keeps running while muted so tails stay consistent
        self.rack.process(&mut self.output);
        if self.muted {
            self.output.fill_silence();
        }
        ok
    }
}

pub struct AudioRenderer {
    sample_rate: u32,
    looping: bool,
    max_block_frames: usize,
    slots: Vec<Slot>,
    mixbus: MixBus,
    commands: CommandReceiver,
    returns: rtrb::Producer<Box<StemBuffer>>,
    /// Buffers waiting for room in the return queue
    parked: Vec<Box<StemBuffer>>,
    telemetry: Arc<EngineTelemetry>,
    frames_processed: u64,
}

/// Everything the renderer needs, assembled by `build_engine`
pub(crate) struct RendererParts {
    pub sample_rate: u32,
    pub looping: bool,
    pub stem_count: usize,
    pub max_block_frames: usize,
    pub ramp_frames: usize,
    pub parallel_dry_gain: f32,
    pub commands: CommandReceiver,
    pub returns: rtrb::Producer<Box<StemBuffer>>,
    pub telemetry: Arc<EngineTelemetry>,
}

impl AudioRenderer {
    pub(crate) fn new(parts: RendererParts) -> Self {
        let slots = (0..parts.stem_count)
            .map(|_| Slot {
                stem: None,
                rack: StemRack::new(
                    parts.sample_rate,
                    parts.max_block_frames,
                    parts.ramp_frames,
                    parts.parallel_dry_gain,
                ),
                muted: false,
                output: StereoBuffer::silence(parts.max_block_frames),
            })
            .collect();

        Self {
            sample_rate: parts.sample_rate,
            looping: parts.looping,
            max_block_frames: parts.max_block_frames,
            slots,
            mixbus: MixBus::new(parts.stem_count, parts.max_block_frames, parts.ramp_frames),
            commands: parts.commands,
            returns: parts.returns,
            parked: Vec::with_capacity(parts.stem_count * 4),
            telemetry: parts.telemetry,
            frames_processed: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn max_block_frames(&self) -> usize {
        self.max_block_frames
    }

    pub fn telemetry(&self) -> Arc<EngineTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Bus signal for one target stem from the last block
    pub fn bus(&self, target: usize) -> Option<&StereoBuffer> {
        self.mixbus.bus(target)
    }

    /// Render one block into `output`
    ///
    /// Blocks longer than `max_block_frames` get silence past that point.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        self.drain_commands();
        self.flush_parked();

        let frames = output.len().min(self.max_block_frames);
        let now = self.frames_processed as f64 / self.sample_rate.max(1) as f64;
        let looping = self.looping;
        let telemetry = &self.telemetry;

        // Each slot owns its stem, rack and output, so slots render independently
        self.slots
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, slot)| {
                if !slot.render(frames, looping, now) {
                    telemetry.add_underrun(idx);
                }
                if let Some(stem) = &slot.stem {
                    telemetry.set_position(idx, stem.position() as u64);
                }
            });

        self.mixbus.mix(self.slots.iter().map(|s| &s.output), output);

        for (idx, gain) in self.mixbus.gains().enumerate() {
            self.telemetry.set_cell_gain(idx, gain);
        }
        self.telemetry.set_master_peak(output.peak());
        self.telemetry.add_frames(frames as u64);
        self.frames_processed += frames as u64;
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadStem { slot, buffer } => {
                let Some(s) = self.slots.get_mut(slot) else {
                    self.send_back(buffer);
                    return;
                };
                let previous = s.stem.replace(buffer);
                s.rack.reset();
                self.telemetry.set_loaded(slot, true);
                self.telemetry.set_position(slot, 0);
                if let Some(previous) = previous {
                    self.send_back(previous);
                }
            }
            EngineCommand::UnloadStem { slot } => {
                let previous = self.slots.get_mut(slot).and_then(|s| s.stem.take());
                self.telemetry.set_loaded(slot, false);
                if let Some(previous) = previous {
                    self.send_back(previous);
                }
            }
            EngineCommand::SetStemMuted { slot, muted } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.muted = muted;
                }
            }
            EngineCommand::RewindStem { slot } => {
                if let Some(stem) = self.slots.get_mut(slot).and_then(|s| s.stem.as_mut()) {
                    stem.rewind();
                }
            }
            EngineCommand::SetCellGain { source, target, gain } => {
                self.mixbus.set_gain(source, target, gain);
            }
            EngineCommand::SetEffect { slot, kind, params } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.rack.set_params(kind, params);
                }
            }
            EngineCommand::SetRouting { slot, mode } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.rack.set_routing(mode);
                }
            }
            EngineCommand::SetLooping(looping) => self.looping = looping,
        }
    }

    fn send_back(&mut self, buffer: Box<StemBuffer>) {
        if let Err(rtrb::PushError::Full(buffer)) = self.returns.push(buffer) {
            if self.parked.len() < self.parked.capacity() {
                self.parked.push(buffer);
            } else {
                // Last resort: the pool never sees this buffer again
                self.telemetry.add_dropped_return();
                drop(buffer);
            }
        }
    }

    fn flush_parked(&mut self) {
        while let Some(buffer) = self.parked.pop() {
            if let Err(rtrb::PushError::Full(buffer)) = self.returns.push(buffer) {
                self.parked.push(buffer);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferId;
    use crate::engine::command::{command_channel, return_channel, CommandSender};
    use crate::types::StemKind;

    fn renderer(return_capacity: usize) -> (AudioRenderer, CommandSender, rtrb::Consumer<Box<StemBuffer>>) {
        let (tx, rx) = command_channel(64);
        let (ret_tx, ret_rx) = return_channel(return_capacity);
        let renderer = AudioRenderer::new(RendererParts {
            sample_rate: 48000,
            looping: true,
            stem_count: 2,
            max_block_frames: 128,
            ramp_frames: 1,
            parallel_dry_gain: 0.7,
            commands: rx,
            returns: ret_tx,
            telemetry: Arc::new(EngineTelemetry::new(2)),
        });
        (renderer, tx, ret_rx)
    }

    fn stem(id: u64, value: f32) -> Box<StemBuffer> {
        let mut buffer = Box::new(StemBuffer::new(BufferId(id), StemKind::Vocals, 1000, 512));
        buffer.load_interleaved(&vec![value; 2000], 2);
        buffer
    }

    #[test]
    fn test_replaced_buffers_come_back_in_order() {
        let (mut r, mut tx, mut returned) = renderer(1);
        let mut out = StereoBuffer::silence(64);

        for id in 1..=3 {
            tx.push(EngineCommand::LoadStem { slot: 0, buffer: stem(id, 0.1) })
                .ok()
                .unwrap();
            r.process(&mut out);
        }
        // Queue holds #1, #2 waits in the parked list
        assert_eq!(returned.pop().unwrap().id(), BufferId(1));
        assert!(returned.pop().is_err());
        r.process(&mut out);
        assert_eq!(returned.pop().unwrap().id(), BufferId(2));
        assert_eq!(r.telemetry().dropped_returns(), 0);
    }

    #[test]
    fn test_load_into_unknown_slot_hands_buffer_back() {
        let (mut r, mut tx, mut returned) = renderer(4);
        tx.push(EngineCommand::LoadStem { slot: 7, buffer: stem(9, 0.1) })
            .ok()
            .unwrap();
        let mut out = StereoBuffer::silence(64);
        r.process(&mut out);
        assert_eq!(returned.pop().unwrap().id(), BufferId(9));
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_cell_gain_and_underrun_telemetry() {
        let (mut r, mut tx, _returned) = renderer(4);
        tx.push(EngineCommand::LoadStem { slot: 1, buffer: stem(1, 0.5) })
            .ok()
            .unwrap();
        tx.push(EngineCommand::SetCellGain { source: 1, target: 0, gain: 0.5 })
            .ok()
            .unwrap();
        let mut out = StereoBuffer::silence(64);
        r.process(&mut out);
        // 0.5 on its own bus plus 0.25 routed to bus 0
        assert!((out[32].left - 0.75).abs() < 1e-5);
        assert!((r.bus(0).unwrap()[32].left - 0.25).abs() < 1e-5);
        assert_eq!(r.telemetry().cell_gain(2), 0.5);
        assert!(r.telemetry().is_loaded(1));

        tx.push(EngineCommand::SetLooping(false)).ok().unwrap();
        for _ in 0..20 {
            r.process(&mut out);
        }
        assert!(r.telemetry().underruns(1) > 0);
        assert_eq!(out.peak(), 0.0);
    }
}
