//! Fixed-capacity stereo ring buffer
//!
//! Overwrite-on-full: a write that doesn't fit evicts the oldest unread
//! frames instead of failing. A read that can't be satisfied in full
//! returns nothing and leaves the buffer untouched, so the caller can
//! render silence for the block.
//!
//! Indices are monotonic `u64` counters reduced modulo capacity on access,
//! which keeps `available()` a plain subtraction.

use crate::types::StereoSample;

pub struct RingBuffer {
    /// Interleaved storage, `capacity` frames (2 × capacity floats)
    data: Vec<StereoSample>,
    read_index: u64,
    write_index: u64,
    /// Frames evicted by overwrite since creation
    overwritten: u64,
}

impl RingBuffer {
    /// Create a ring holding `capacity_frames` stereo frames (minimum 1)
    pub fn new(capacity_frames: usize) -> Self {
        Self {
            data: vec![StereoSample::silence(); capacity_frames.max(1)],
            read_index: 0,
            write_index: 0,
            overwritten: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Unread frames
    #[inline]
    pub fn available(&self) -> usize {
        (self.write_index - self.read_index) as usize
    }

    /// Frames that can be written without evicting anything
    #[inline]
    pub fn free_space(&self) -> usize {
        self.capacity() - self.available()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.available() == self.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Frames lost to overwrite since creation or the last `clear`
    pub fn overwritten_frames(&self) -> u64 {
        self.overwritten
    }

    /// Append frames, evicting the oldest unread frames when full
    pub fn write(&mut self, frames: &[StereoSample]) {
        let capacity = self.capacity();

        // Only the newest `capacity` frames can survive the write
        let skip = frames.len().saturating_sub(capacity);
        let frames = &frames[skip..];

        // Read cursor catches up to keep `available <= capacity`
        let end = self.write_index + (skip + frames.len()) as u64;
        let min_read = end.saturating_sub(capacity as u64);
        if min_read > self.read_index {
            self.overwritten += min_read - self.read_index;
            self.read_index = min_read;
        }
        self.write_index += skip as u64;

        let start = (self.write_index % capacity as u64) as usize;
        let first = frames.len().min(capacity - start);
        self.data[start..start + first].copy_from_slice(&frames[..first]);
        self.data[..frames.len() - first].copy_from_slice(&frames[first..]);
        self.write_index += frames.len() as u64;
    }

    /// Fill `out` with the next `out.len()` frames
    ///
    /// Returns `None` without consuming anything if fewer frames are available.
    pub fn read(&mut self, out: &mut [StereoSample]) -> Option<usize> {
        let count = out.len();
        if count > self.available() {
            return None;
        }

        let capacity = self.capacity();
        let start = (self.read_index % capacity as u64) as usize;
        let first = count.min(capacity - start);
        out[..first].copy_from_slice(&self.data[start..start + first]);
        out[first..].copy_from_slice(&self.data[..count - first]);
        self.read_index += count as u64;
        Some(count)
    }

    /// Drop all unread frames and zero the storage
    pub fn clear(&mut self) {
        self.data.fill(StereoSample::silence());
        self.read_index = 0;
        self.write_index = 0;
        self.overwritten = 0;
    }

    /// Bytes held by the sample storage
    pub fn memory_bytes(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<StereoSample>()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<StereoSample> {
        (start..start + len)
            .map(|i| StereoSample::new(i as f32, -(i as f32)))
            .collect()
    }

    #[test]
    fn test_write_capacity_then_read_capacity_is_identity() {
        let mut ring = RingBuffer::new(64);
        let input = ramp(0, 64);
        ring.write(&input);
        assert!(ring.is_full());

        let mut out = vec![StereoSample::silence(); 64];
        assert_eq!(ring.read(&mut out), Some(64));
        assert_eq!(out, input);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = RingBuffer::new(8);
        let mut out = vec![StereoSample::silence(); 5];

        ring.write(&ramp(0, 5));
        ring.read(&mut out).unwrap();
        ring.write(&ramp(5, 6));

        let mut out = vec![StereoSample::silence(); 6];
        assert_eq!(ring.read(&mut out), Some(6));
        assert_eq!(out, ramp(5, 6));
    }

    #[test]
    fn test_short_read_returns_none_and_consumes_nothing() {
        let mut ring = RingBuffer::new(16);
        ring.write(&ramp(0, 4));

        let mut out = vec![StereoSample::mono(9.0); 8];
        assert_eq!(ring.read(&mut out), None);
        assert_eq!(ring.available(), 4);
        assert!(out.iter().all(|s| *s == StereoSample::mono(9.0)));
    }

    #[test]
    fn test_overwrite_keeps_available_bounded() {
        let mut ring = RingBuffer::new(16);
        ring.write(&ramp(0, 10));
        ring.write(&ramp(10, 10));

        assert!(ring.available() <= ring.capacity());
        assert!(ring.is_full());
        assert_eq!(ring.overwritten_frames(), 4);

        // Oldest frames were evicted; the rest read back in order
        let mut out = vec![StereoSample::silence(); 16];
        assert_eq!(ring.read(&mut out), Some(16));
        assert_eq!(out, ramp(4, 16));
    }

    #[test]
    fn test_write_larger_than_capacity_keeps_newest() {
        let mut ring = RingBuffer::new(8);
        ring.write(&ramp(0, 3));
        ring.write(&ramp(3, 20));

        assert_eq!(ring.available(), 8);
        let mut out = vec![StereoSample::silence(); 8];
        assert_eq!(ring.read(&mut out), Some(8));
        assert_eq!(out, ramp(15, 8));

        // Still usable afterwards
        ring.write(&ramp(100, 2));
        let mut out = vec![StereoSample::silence(); 2];
        assert_eq!(ring.read(&mut out), Some(2));
        assert_eq!(out, ramp(100, 2));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut ring = RingBuffer::new(4);
        ring.write(&ramp(0, 6));
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.overwritten_frames(), 0);
        assert_eq!(ring.free_space(), 4);
    }
}
