//! Buffer pool statistics

use serde::{Deserialize, Serialize};

/// Snapshot of pool accounting, cheap to copy out to UI collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_buffers: usize,
    /// Buffers on loan (playing or about to play)
    pub active_buffers: usize,
    /// Buffers idle in the free set
    pub pooled_buffers: usize,
    pub total_memory: u64,
    pub peak_memory: u64,
    /// Memory held by active buffers
    pub used_memory: u64,
    pub allocations: u64,
    pub deallocations: u64,
    /// Allocation requests served from the free set
    pub reuses: u64,
    /// All allocation requests, including failed ones
    pub requests: u64,
    pub destroyed: u64,
    pub defragmented: u64,
}

impl PoolStats {
    /// `reuses / requests`, 0 before the first request
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.reuses as f64 / self.requests as f64
        }
    }

    /// `1 - used / total`, 0 for an empty pool
    pub fn fragmentation(&self) -> f64 {
        if self.total_memory == 0 {
            0.0
        } else {
            1.0 - self.used_memory as f64 / self.total_memory as f64
        }
    }
}
