//! Lock-free state published by the audio thread
//!
//! The renderer writes these atomics once per block; the control side and
//! UI read them without touching the audio thread. All accesses use
//! `Ordering::Relaxed`: readers only need eventual visibility of each value,
//! not ordering between them. `f32` values are stored as their bit pattern.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

#[inline]
fn load_f32(a: &AtomicU32) -> f32 {
    f32::from_bits(a.load(Ordering::Relaxed))
}

#[inline]
fn store_f32(a: &AtomicU32, value: f32) {
    a.store(value.to_bits(), Ordering::Relaxed);
}

pub struct EngineTelemetry {
    size: usize,
    /// Gain each matrix cell is applying right now (row-major)
    cell_gains: Vec<AtomicU32>,
    underruns: Vec<AtomicU64>,
    positions: Vec<AtomicU64>,
    loaded: Vec<AtomicBool>,
    frames_processed: AtomicU64,
    master_peak: AtomicU32,
    dropped_returns: AtomicU64,
}

impl EngineTelemetry {
    pub fn new(stem_count: usize) -> Self {
        Self {
            size: stem_count,
            cell_gains: (0..stem_count * stem_count)
                .map(|idx| {
                    let diagonal = idx / stem_count.max(1) == idx % stem_count.max(1);
                    AtomicU32::new(if diagonal { 1.0f32 } else { 0.0 }.to_bits())
                })
                .collect(),
            underruns: (0..stem_count).map(|_| AtomicU64::new(0)).collect(),
            positions: (0..stem_count).map(|_| AtomicU64::new(0)).collect(),
            loaded: (0..stem_count).map(|_| AtomicBool::new(false)).collect(),
            frames_processed: AtomicU64::new(0),
            master_peak: AtomicU32::new(0),
            dropped_returns: AtomicU64::new(0),
        }
    }

    pub fn stem_count(&self) -> usize {
        self.size
    }

    /// Live gain of row-major cell `idx` (0 for unknown cells)
    #[inline]
    pub fn cell_gain(&self, idx: usize) -> f32 {
        self.cell_gains.get(idx).map(load_f32).unwrap_or(0.0)
    }

    #[inline]
    pub(crate) fn set_cell_gain(&self, idx: usize, gain: f32) {
        if let Some(a) = self.cell_gains.get(idx) {
            store_f32(a, gain);
        }
    }

    /// Blocks a slot rendered as silence because its ring ran dry
    #[inline]
    pub fn underruns(&self, slot: usize) -> u64 {
        self.underruns
            .get(slot)
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    #[inline]
    pub(crate) fn add_underrun(&self, slot: usize) {
        if let Some(a) = self.underruns.get(slot) {
            a.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Playhead of a slot in frames
    #[inline]
    pub fn position(&self, slot: usize) -> u64 {
        self.positions
            .get(slot)
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    #[inline]
    pub(crate) fn set_position(&self, slot: usize, frames: u64) {
        if let Some(a) = self.positions.get(slot) {
            a.store(frames, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn is_loaded(&self, slot: usize) -> bool {
        self.loaded
            .get(slot)
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    #[inline]
    pub(crate) fn set_loaded(&self, slot: usize, loaded: bool) {
        if let Some(a) = self.loaded.get(slot) {
            a.store(loaded, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn add_frames(&self, frames: u64) {
        self.frames_processed.fetch_add(frames, Ordering::Relaxed);
    }

    /// Peak of the last rendered master block
    #[inline]
    pub fn master_peak(&self) -> f32 {
        load_f32(&self.master_peak)
    }

    #[inline]
    pub(crate) fn set_master_peak(&self, peak: f32) {
        store_f32(&self.master_peak, peak);
    }

    /// Buffers the renderer had to drop because the return queue was full
    #[inline]
    pub fn dropped_returns(&self) -> u64 {
        self.dropped_returns.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn add_dropped_return(&self) {
        self.dropped_returns.fetch_add(1, Ordering::Relaxed);
    }

    /// Plain-data copy for display or serialization
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            frames_processed: self.frames_processed(),
            master_peak: self.master_peak(),
            cell_gains: (0..self.cell_gains.len()).map(|i| self.cell_gain(i)).collect(),
            underruns: (0..self.size).map(|s| self.underruns(s)).collect(),
            positions: (0..self.size).map(|s| self.position(s)).collect(),
            dropped_returns: self.dropped_returns(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub frames_processed: u64,
    pub master_peak: f32,
    pub cell_gains: Vec<f32>,
    pub underruns: Vec<u64>,
    pub positions: Vec<u64>,
    pub dropped_returns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_identity() {
        let t = EngineTelemetry::new(3);
        assert_eq!(t.cell_gain(0), 1.0);
        assert_eq!(t.cell_gain(1), 0.0);
        assert_eq!(t.cell_gain(4), 1.0);
        assert_eq!(t.cell_gain(99), 0.0);
    }

    #[test]
    fn test_f32_roundtrip_and_counters() {
        let t = EngineTelemetry::new(2);
        t.set_cell_gain(1, 0.37);
        t.set_master_peak(0.5);
        t.add_underrun(1);
        t.add_underrun(1);
        t.add_frames(128);
        assert_eq!(t.cell_gain(1), 0.37);
        assert_eq!(t.master_peak(), 0.5);
        assert_eq!(t.underruns(1), 2);
        assert_eq!(t.underruns(5), 0);

        let snap = t.snapshot();
        assert_eq!(snap.frames_processed, 128);
        assert_eq!(snap.cell_gains.len(), 4);
    }
}
