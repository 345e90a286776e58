//! A pooled buffer holding one stem's decoded audio
//!
//! Storage is allocated once at full capacity. Playback pumps frames from
//! the storage cursor into the buffer's ring, and the renderer reads one
//! block at a time out of the ring.

use super::ring::RingBuffer;
use crate::types::{AudioFormat, Sample, StemKind, StereoSample};
use serde::{Deserialize, Serialize};

/// Stable identifier of a pooled buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(pub u64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Descriptive data about the audio currently held in a buffer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemMetadata {
    pub track_id: String,
    pub sample_rate: u32,
    /// Channel count of the source (mono sources are stored as stereo)
    pub channels: u16,
    pub duration_secs: f64,
    /// Bytes of sample data loaded (not buffer capacity)
    pub byte_length: u64,
    pub format: AudioFormat,
    pub compressed: bool,
    /// Separation quality reported by the stem source, 0-1
    pub quality: f32,
}

pub struct StemBuffer {
    id: BufferId,
    kind: StemKind,
    storage: Vec<StereoSample>,
    /// Frames of valid audio at the start of `storage`
    frames: usize,
    /// Next storage frame to pump into the ring
    cursor: usize,
    ring: RingBuffer,
    metadata: StemMetadata,
    is_active: bool,
    /// Seconds on the engine clock
    last_access: f64,
    access_count: u64,
}

impl StemBuffer {
    /// Allocate a silent buffer of `capacity_frames` frames
    pub fn new(id: BufferId, kind: StemKind, capacity_frames: usize, ring_frames: usize) -> Self {
        Self {
            id,
            kind,
            storage: vec![StereoSample::silence(); capacity_frames],
            frames: 0,
            cursor: 0,
            ring: RingBuffer::new(ring_frames),
            metadata: StemMetadata::default(),
            is_active: false,
            last_access: 0.0,
            access_count: 0,
        }
    }

    /// Memory a buffer of this shape occupies, for accounting before allocating it
    pub fn bytes_for(capacity_frames: usize, ring_frames: usize) -> u64 {
        ((capacity_frames + ring_frames.max(1)) * std::mem::size_of::<StereoSample>()) as u64
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn kind(&self) -> StemKind {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: StemKind) {
        self.kind = kind;
    }

    pub fn metadata(&self) -> &StemMetadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: StemMetadata) {
        self.metadata = metadata;
    }

    pub fn capacity_frames(&self) -> usize {
        self.storage.len()
    }

    /// Frames of loaded audio
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Current playback position in frames
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn last_access(&self) -> f64 {
        self.last_access
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Record a borrow at `now` (engine-clock seconds)
    #[inline]
    pub fn touch(&mut self, now: f64) {
        self.last_access = now;
        self.access_count += 1;
    }

    /// Restart the idle clock without counting a borrow
    pub(crate) fn mark_idle(&mut self, now: f64) {
        self.last_access = now;
    }

    pub fn memory_bytes(&self) -> u64 {
        (self.storage.len() * std::mem::size_of::<StereoSample>()) as u64 + self.ring.memory_bytes()
    }

    /// Copy interleaved samples into storage
    ///
    /// Mono (`channels == 1`) is duplicated to both sides. Audio past the
    /// buffer capacity is dropped; the return value is the number of frames
    /// actually stored.
    pub fn load_interleaved(&mut self, samples: &[Sample], channels: u16) -> usize {
        let stored = match channels {
            1 => {
                let n = samples.len().min(self.storage.len());
                for (dst, &s) in self.storage.iter_mut().zip(samples.iter()) {
                    *dst = StereoSample::mono(s);
                }
                n
            }
            _ => {
                let frames: &[StereoSample] = bytemuck::cast_slice(
                    &samples[..samples.len() - samples.len() % 2],
                );
                let n = frames.len().min(self.storage.len());
                self.storage[..n].copy_from_slice(&frames[..n]);
                n
            }
        };
        self.storage[stored..].fill(StereoSample::silence());
        self.frames = stored;
        self.rewind();
        stored
    }

    /// Move the playhead back to the start and drop anything queued in the ring
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.ring.clear();
    }

    /// Write frames straight into the ring, bypassing storage
    pub fn write(&mut self, frames: &[StereoSample]) {
        self.ring.write(frames);
    }

    /// Move frames from storage into the ring until it is full
    ///
    /// With `looping`, the cursor wraps to the start when storage runs out.
    /// Returns the number of frames moved.
    pub fn pump(&mut self, looping: bool) -> usize {
        let mut moved = 0;
        while self.ring.free_space() > 0 && self.frames > 0 {
            if self.cursor >= self.frames {
                if !looping {
                    break;
                }
                self.cursor = 0;
            }
            let n = self.ring.free_space().min(self.frames - self.cursor);
            self.ring.write(&self.storage[self.cursor..self.cursor + n]);
            self.cursor += n;
            moved += n;
        }
        moved
    }

    /// Read one block for playback
    ///
    /// Returns `false` on underrun, with `out` filled with silence.
    pub fn read_block(&mut self, out: &mut [StereoSample], looping: bool, now: f64) -> bool {
        self.pump(looping);
        match self.ring.read(out) {
            Some(_) => {
                self.mark_idle(now);
                true
            }
            None => {
                out.fill(StereoSample::silence());
                false
            }
        }
    }

    /// Zero all audio and reset playback state before the buffer is reused
    pub(crate) fn zero(&mut self) {
        self.storage.fill(StereoSample::silence());
        self.ring.clear();
        self.frames = 0;
        self.cursor = 0;
        self.metadata = StemMetadata::default();
    }

    /// Release storage beyond `capacity_frames`
    pub(crate) fn shrink_to(&mut self, capacity_frames: usize) {
        if capacity_frames < self.storage.len() {
            self.storage.truncate(capacity_frames);
            self.storage.shrink_to_fit();
            self.frames = self.frames.min(capacity_frames);
            self.cursor = self.cursor.min(self.frames);
        }
    }
}

impl std::fmt::Debug for StemBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StemBuffer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("capacity_frames", &self.storage.len())
            .field("frames", &self.frames)
            .field("is_active", &self.is_active)
            .field("access_count", &self.access_count)
            .finish()
    }
}
