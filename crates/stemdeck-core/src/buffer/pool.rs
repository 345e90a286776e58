//! Stem buffer pool
//!
//! The pool owns every inactive `StemBuffer` and keeps the accounting for
//! the ones on loan. Allocation reuses the first free buffer large enough
//! (first-fit) before touching the allocator, and only fails once the
//! configured memory cap would be exceeded.
//!
//! Ownership follows a simple rule: an allocated buffer is moved out to the
//! caller (and from there to the audio thread) while active, and moved
//! back in by `deallocate`. Maintenance only ever walks the free set, so it
//! can't race the hot path.
//!
//! All timestamps are engine-clock seconds supplied by the caller.

use super::error::{PoolError, PoolResult};
use super::stats::PoolStats;
use super::stem_buffer::{BufferId, StemBuffer};
use crate::config::PoolConfig;
use crate::types::StemKind;
use std::collections::HashMap;

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub destroyed: usize,
    pub defragmented: usize,
}

pub struct BufferPool {
    config: PoolConfig,
    sample_rate: u32,
    ring_frames: usize,
    /// Inactive buffers in first-fit order (oldest returned first)
    free: Vec<Box<StemBuffer>>,
    /// Memory of each buffer currently on loan
    loaned: HashMap<BufferId, u64>,
    next_id: u64,
    total_memory: u64,
    stats: PoolStats,
}

impl BufferPool {
    pub fn new(config: PoolConfig, sample_rate: u32, ring_frames: usize) -> Self {
        Self {
            config,
            sample_rate,
            ring_frames,
            free: Vec::new(),
            loaned: HashMap::new(),
            next_id: 1,
            total_memory: 0,
            stats: PoolStats::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Fraction of the memory cap in use (0-1, may exceed 1 after a config change)
    pub fn memory_pressure(&self) -> f32 {
        if self.config.max_memory_bytes == 0 {
            return 1.0;
        }
        (self.total_memory as f64 / self.config.max_memory_bytes as f64) as f32
    }

    /// Nominal buffer length for a stem kind, ignoring pressure
    pub fn optimal_frames(&self, kind: StemKind) -> usize {
        (self.config.base_seconds.seconds(kind).max(0.0) * self.sample_rate as f32) as usize
    }

    /// Buffer length the next default allocation for `kind` would target
    pub fn target_frames(&self, kind: StemKind) -> usize {
        let optimal = self.optimal_frames(kind);
        if self.memory_pressure() > self.config.pressure_threshold {
            let keep = (1.0 - self.config.pressure_shrink).clamp(0.0, 1.0);
            (optimal as f32 * keep) as usize
        } else {
            optimal
        }
    }

    /// Hand out a buffer of at least `requested_frames` (or the kind's target size)
    ///
    /// The returned buffer is active and silent. Fails with `OutOfMemory`
    /// when nothing in the free set fits and a fresh buffer would exceed the cap.
    pub fn allocate(
        &mut self,
        kind: StemKind,
        requested_frames: Option<usize>,
        now: f64,
    ) -> PoolResult<Box<StemBuffer>> {
        self.stats.requests += 1;
        let target = requested_frames.unwrap_or_else(|| self.target_frames(kind));

        if let Some(pos) = self.free.iter().position(|b| b.capacity_frames() >= target) {
            let mut buffer = self.free.remove(pos);
            buffer.set_kind(kind);
            buffer.set_active(true);
            buffer.touch(now);
            self.loaned.insert(buffer.id(), buffer.memory_bytes());
            self.stats.reuses += 1;
            self.stats.allocations += 1;
            log::debug!("BufferPool: reused {} for {} ({} frames)", buffer.id(), kind, target);
            return Ok(buffer);
        }

        let bytes = StemBuffer::bytes_for(target, self.ring_frames);
        let available = self.config.max_memory_bytes.saturating_sub(self.total_memory);
        if bytes > available {
            log::warn!(
                "BufferPool: cannot allocate {} bytes for {} ({} available)",
                bytes,
                kind,
                available
            );
            return Err(PoolError::OutOfMemory {
                requested: bytes,
                available,
            });
        }

        let id = BufferId(self.next_id);
        self.next_id += 1;
        let mut buffer = Box::new(StemBuffer::new(id, kind, target, self.ring_frames));
        buffer.set_active(true);
        buffer.touch(now);

        self.total_memory += buffer.memory_bytes();
        self.stats.peak_memory = self.stats.peak_memory.max(self.total_memory);
        self.loaned.insert(id, buffer.memory_bytes());
        self.stats.allocations += 1;
        log::debug!("BufferPool: allocated {} for {} ({} frames)", id, kind, target);
        Ok(buffer)
    }

    /// Take a buffer back into the free set
    ///
    /// The audio is zeroed so the next borrower never hears the previous
    /// stem. Memory is kept for reuse rather than released.
    pub fn deallocate(&mut self, mut buffer: Box<StemBuffer>, now: f64) -> PoolResult<()> {
        let id = buffer.id();
        if self.loaned.remove(&id).is_none() {
            return Err(PoolError::UnknownBuffer(id));
        }
        buffer.zero();
        buffer.set_active(false);
        // Idle time counts from the moment the buffer comes back
        buffer.mark_idle(now);
        self.free.push(buffer);
        self.stats.deallocations += 1;
        Ok(())
    }

    /// Destroy pooled buffers idle beyond `max_age_secs` and rarely used
    ///
    /// A buffer survives if either condition fails: recently touched, or
    /// borrowed through `allocate` at least `min_access_count` times over its life.
    pub fn collect_garbage(&mut self, now: f64) -> usize {
        let max_age = self.config.max_age_secs;
        let min_access = self.config.min_access_count;
        let before = self.free.len();
        let mut freed = 0u64;

        self.free.retain(|buffer| {
            let stale = now - buffer.last_access() > max_age;
            let cold = buffer.access_count() < min_access;
            if stale && cold {
                freed += buffer.memory_bytes();
                false
            } else {
                true
            }
        });

        let destroyed = before - self.free.len();
        self.total_memory -= freed;
        self.stats.destroyed += destroyed as u64;
        if destroyed > 0 {
            log::info!("BufferPool: destroyed {} idle buffers ({} bytes)", destroyed, freed);
        }
        destroyed
    }

    /// Shrink oversized pooled buffers back to their kind's nominal size
    ///
    /// Does nothing unless memory pressure is above `defrag_threshold`.
    pub fn defragment(&mut self) -> usize {
        if self.memory_pressure() <= self.config.defrag_threshold {
            return 0;
        }

        let mut shrunk = 0;
        let mut freed = 0u64;
        for i in 0..self.free.len() {
            let optimal = self.optimal_frames(self.free[i].kind());
            let buffer = &mut self.free[i];
            if buffer.capacity_frames() > optimal {
                let before = buffer.memory_bytes();
                buffer.shrink_to(optimal);
                freed += before - buffer.memory_bytes();
                shrunk += 1;
            }
        }

        self.total_memory -= freed;
        self.stats.defragmented += shrunk as u64;
        if shrunk > 0 {
            log::info!("BufferPool: defragmented {} buffers ({} bytes freed)", shrunk, freed);
        }
        shrunk
    }

    /// Garbage collection followed by defragmentation
    pub fn maintain(&mut self, now: f64) -> MaintenanceReport {
        MaintenanceReport {
            destroyed: self.collect_garbage(now),
            defragmented: self.defragment(),
        }
    }

    /// Whether `id` is currently on loan
    pub fn is_loaned(&self, id: BufferId) -> bool {
        self.loaned.contains_key(&id)
    }

    pub fn stats(&self) -> PoolStats {
        let used: u64 = self.loaned.values().sum();
        PoolStats {
            total_buffers: self.loaned.len() + self.free.len(),
            active_buffers: self.loaned.len(),
            pooled_buffers: self.free.len(),
            total_memory: self.total_memory,
            used_memory: used,
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StemSizeTable;

    const RATE: u32 = 1000;
    const RING: usize = 16;

    fn small_config() -> PoolConfig {
        PoolConfig {
            // Room for a handful of 1-2 second buffers at 1kHz
            max_memory_bytes: 80_000,
            max_age_secs: 10.0,
            min_access_count: 3,
            base_seconds: StemSizeTable {
                vocals: 2.0,
                drums: 2.0,
                bass: 1.0,
                other: 1.0,
            },
            ..PoolConfig::default()
        }
    }

    fn pool() -> BufferPool {
        BufferPool::new(small_config(), RATE, RING)
    }

    fn assert_counts_consistent(pool: &BufferPool) {
        let s = pool.stats();
        assert_eq!(s.active_buffers + s.pooled_buffers, s.total_buffers);
    }

    #[test]
    fn test_optimal_sizes_by_kind() {
        let pool = pool();
        assert_eq!(pool.optimal_frames(StemKind::Vocals), 2000);
        assert_eq!(pool.optimal_frames(StemKind::Bass), 1000);
    }

    #[test]
    fn test_counts_consistent_over_sequence() {
        let mut pool = pool();
        let mut held = Vec::new();
        for (i, kind) in StemKind::ALL.iter().cycle().take(6).enumerate() {
            if let Ok(buf) = pool.allocate(*kind, None, i as f64) {
                held.push(buf);
            }
            assert_counts_consistent(&pool);
            if i % 2 == 1 {
                if let Some(buf) = held.pop() {
                    pool.deallocate(buf, i as f64).unwrap();
                }
                assert_counts_consistent(&pool);
            }
        }
        for buf in held {
            pool.deallocate(buf, 10.0).unwrap();
            assert_counts_consistent(&pool);
        }
        pool.collect_garbage(1000.0);
        assert_counts_consistent(&pool);
    }

    #[test]
    fn test_reuse_counts_as_hit() {
        let mut pool = pool();
        let a = pool.allocate(StemKind::Drums, None, 0.0).unwrap();
        let id = a.id();
        pool.deallocate(a, 1.0).unwrap();

        // Bass wants 1000 frames, the free 2000-frame buffer fits
        let b = pool.allocate(StemKind::Bass, None, 2.0).unwrap();
        assert_eq!(b.id(), id);
        assert_eq!(b.kind(), StemKind::Bass);
        assert!(b.is_active());

        let stats = pool.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.reuses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_first_fit_skips_small_buffers() {
        let mut pool = pool();
        let small = pool.allocate(StemKind::Bass, None, 0.0).unwrap();
        let large = pool.allocate(StemKind::Vocals, None, 0.0).unwrap();
        let large_id = large.id();
        pool.deallocate(small, 1.0).unwrap();
        pool.deallocate(large, 1.0).unwrap();

        let got = pool.allocate(StemKind::Drums, None, 2.0).unwrap();
        assert_eq!(got.id(), large_id);
    }

    #[test]
    fn test_out_of_memory() {
        let mut pool = pool();
        let result = pool.allocate(StemKind::Vocals, Some(1_000_000), 0.0);
        match result {
            Err(PoolError::OutOfMemory { requested, available }) => {
                assert!(requested > available);
                assert_eq!(available, 80_000);
            }
            other => panic!("expected OutOfMemory, got {:?}", other.map(|b| b.id())),
        }
        let stats = pool.stats();
        assert_eq!(stats.total_buffers, 0);
        assert_eq!(stats.requests, 1);
    }

    #[test]
    fn test_deallocate_zeroes_audio() {
        let mut pool = pool();
        let mut buf = pool.allocate(StemKind::Other, None, 0.0).unwrap();
        buf.load_interleaved(&[0.8; 200], 2);
        pool.deallocate(buf, 1.0).unwrap();

        let mut again = pool.allocate(StemKind::Other, None, 2.0).unwrap();
        assert_eq!(again.frames(), 0);
        again.load_interleaved(&[], 2);
        let mut out = [crate::types::StereoSample::mono(1.0); 4];
        assert!(!again.read_block(&mut out, true, 3.0));
    }

    #[test]
    fn test_deallocate_unknown_buffer_fails() {
        let mut pool = pool();
        let stray = Box::new(StemBuffer::new(BufferId(99), StemKind::Bass, 10, RING));
        assert_eq!(pool.deallocate(stray, 0.0), Err(PoolError::UnknownBuffer(BufferId(99))));
    }

    #[test]
    fn test_gc_destroys_idle_cold_buffers() {
        let mut pool = pool();
        let buf = pool.allocate(StemKind::Bass, None, 0.0).unwrap();
        pool.deallocate(buf, 1.0).unwrap();

        // Not old enough yet
        assert_eq!(pool.collect_garbage(5.0), 0);
        assert_eq!(pool.collect_garbage(12.0), 1);

        let stats = pool.stats();
        assert_eq!(stats.total_buffers, 0);
        assert_eq!(stats.total_memory, 0);
        assert_eq!(stats.destroyed, 1);
    }

    #[test]
    fn test_gc_keeps_frequently_used_buffers() {
        let mut pool = pool();
        for t in 0..3 {
            let buf = pool.allocate(StemKind::Bass, None, t as f64).unwrap();
            pool.deallocate(buf, t as f64 + 0.5).unwrap();
        }

        assert_eq!(pool.collect_garbage(100.0), 0);
        assert_eq!(pool.stats().pooled_buffers, 1);
    }

    #[test]
    fn test_playback_does_not_shield_buffer_from_gc() {
        let mut pool = pool();
        let mut buf = pool.allocate(StemKind::Bass, None, 0.0).unwrap();
        buf.load_interleaved(&[0.5; 400], 2);
        let mut out = [crate::types::StereoSample::silence(); 4];
        for block in 0..20 {
            buf.read_block(&mut out, true, block as f64 * 0.01);
        }
        assert_eq!(buf.access_count(), 1);
        pool.deallocate(buf, 1.0).unwrap();

        assert_eq!(pool.collect_garbage(100.0), 1);
        assert_eq!(pool.stats().total_buffers, 0);
    }

    #[test]
    fn test_gc_never_touches_active_buffers() {
        let mut pool = pool();
        let _held = pool.allocate(StemKind::Vocals, None, 0.0).unwrap();
        assert_eq!(pool.collect_garbage(1_000.0), 0);
        assert_eq!(pool.stats().active_buffers, 1);
    }

    #[test]
    fn test_pressure_shrinks_default_size() {
        let mut pool = pool();
        let normal = pool.target_frames(StemKind::Vocals);
        // 3 x 2000 frames ~= 48KB + rings, above 70% of 80KB once the third lands
        let mut held = Vec::new();
        while pool.memory_pressure() <= 0.7 {
            held.push(pool.allocate(StemKind::Vocals, None, 0.0).unwrap());
        }
        let shrunk = pool.target_frames(StemKind::Vocals);
        assert!(shrunk < normal);
        assert!(shrunk + 2 >= normal * 7 / 10);
    }

    #[test]
    fn test_defragment_shrinks_oversized_pooled_buffers() {
        let mut pool = pool();
        // Oversized bass buffer pushes pressure above the 0.8 defrag threshold
        let big = pool.allocate(StemKind::Bass, Some(8_500), 0.0).unwrap();
        pool.deallocate(big, 0.0).unwrap();
        assert!(pool.memory_pressure() > 0.8);

        let before = pool.stats().total_memory;
        assert_eq!(pool.defragment(), 1);
        let after = pool.stats().total_memory;
        assert_eq!(before - after, (8_500 - 1_000) * 8);
        assert_eq!(pool.stats().defragmented, 1);
    }

    #[test]
    fn test_defragment_idle_below_threshold() {
        let mut pool = pool();
        let big = pool.allocate(StemKind::Bass, Some(3_000), 0.0).unwrap();
        pool.deallocate(big, 0.0).unwrap();
        assert_eq!(pool.defragment(), 0);
    }

    #[test]
    fn test_peak_memory_tracks_high_water_mark() {
        let mut pool = pool();
        let a = pool.allocate(StemKind::Bass, None, 0.0).unwrap();
        let peak = pool.stats().peak_memory;
        pool.deallocate(a, 0.0).unwrap();
        pool.collect_garbage(100.0);
        assert_eq!(pool.stats().total_memory, 0);
        assert_eq!(pool.stats().peak_memory, peak);
    }
}
