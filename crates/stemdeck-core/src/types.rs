//! Common types for Stemdeck
//!
//! Fundamental audio types shared by every layer of the engine: stereo
//! samples and buffers, stem identifiers and the source-format tag carried
//! in stem metadata.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Default engine sample rate (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Number of stems in the canonical layout (Vocals, Drums, Bass, Other)
pub const NUM_STEMS: usize = 4;

/// Default audio callback block size in frames
pub const DEFAULT_BLOCK_FRAMES: usize = 128;

/// Largest block the renderer preallocates for
pub const MAX_BLOCK_FRAMES: usize = 2048;

/// Audio sample type
pub type Sample = f32;

/// Stem kinds in canonical order
///
/// Presets and gesture mappings assume this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum StemKind {
    Vocals = 0,
    Drums = 1,
    Bass = 2,
    Other = 3,
}

impl StemKind {
    /// All stem kinds in canonical order
    pub const ALL: [StemKind; NUM_STEMS] = [
        StemKind::Vocals,
        StemKind::Drums,
        StemKind::Bass,
        StemKind::Other,
    ];

    /// Convert from index (0-3)
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(StemKind::Vocals),
            1 => Some(StemKind::Drums),
            2 => Some(StemKind::Bass),
            3 => Some(StemKind::Other),
            _ => None,
        }
    }

    /// Slot index of this stem
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            StemKind::Vocals => "Vocals",
            StemKind::Drums => "Drums",
            StemKind::Bass => "Bass",
            StemKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for StemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Source format of decoded stem audio
///
/// Purely informational: the engine only ever sees decoded float samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    #[default]
    Raw,
}

impl AudioFormat {
    /// Whether the source was lossy-compressed
    pub fn is_compressed(self) -> bool {
        matches!(self, AudioFormat::Mp3)
    }
}

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` keeps the layout `[left, right]` so slices can be viewed as
/// interleaved f32 through bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value in both channels
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// Renderer buffers are created once with `with_capacity` and resized per
/// block with `set_len_from_capacity`, which never allocates.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create an empty buffer with the given capacity (in frames)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Newly exposed frames are silent. Must not exceed capacity.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        if new_len > self.samples.len() {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_kind_roundtrip() {
        for (i, kind) in StemKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(StemKind::from_index(i), Some(*kind));
        }
        assert_eq!(StemKind::from_index(4), None);
    }

    #[test]
    fn test_set_len_from_capacity_does_not_grow_capacity() {
        let mut buf = StereoBuffer::with_capacity(256);
        buf.set_len_from_capacity(128);
        assert_eq!(buf.len(), 128);
        buf.set_len_from_capacity(256);
        assert_eq!(buf.capacity(), 256);
        assert!(buf.iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_format_compressed_flag() {
        assert!(AudioFormat::Mp3.is_compressed());
        assert!(!AudioFormat::Flac.is_compressed());
    }
}
