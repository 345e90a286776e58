//! Engine configuration sections
//!
//! Every struct is `#[serde(default)]` so a config file only needs the
//! fields it changes.

use crate::types::{StemKind, DEFAULT_BLOCK_FRAMES, MAX_BLOCK_FRAMES, NUM_STEMS, SAMPLE_RATE};
use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine sample rate in Hz
    pub sample_rate: u32,

    /// Nominal audio callback block size in frames
    pub block_frames: usize,

    /// Largest block the renderer will accept; scratch buffers are sized to this
    pub max_block_frames: usize,

    /// Number of stem slots (matrix dimension N)
    pub stem_count: usize,

    /// Per-stem ring buffer capacity in frames
    pub ring_frames: usize,

    /// Restart stems from the top when their storage runs out
    pub looping: bool,

    /// Longest stem accepted by `load_stem`, in seconds
    pub max_stem_seconds: f64,

    /// Capacity of the control to audio command queue
    pub command_queue_capacity: usize,

    pub pool: PoolConfig,
    pub automation: AutomationConfig,
    pub mixing: MixingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            block_frames: DEFAULT_BLOCK_FRAMES,
            max_block_frames: MAX_BLOCK_FRAMES,
            stem_count: NUM_STEMS,
            ring_frames: 8192,
            looping: true,
            max_stem_seconds: 600.0,
            command_queue_capacity: 1024,
            pool: PoolConfig::default(),
            automation: AutomationConfig::default(),
            mixing: MixingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Block size clamped into what the renderer preallocates for
    pub fn effective_block_frames(&self) -> usize {
        self.block_frames.clamp(1, self.max_block_frames.max(1))
    }

    /// Ring capacity never smaller than two blocks
    pub fn effective_ring_frames(&self) -> usize {
        self.ring_frames.max(self.max_block_frames.max(1) * 2)
    }
}

/// Base buffer length per stem kind, in seconds of audio
///
/// Vocals and drums get longer defaults: they are the stems most often
/// looped, frozen and stuttered, so their buffers see the most reuse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StemSizeTable {
    pub vocals: f32,
    pub drums: f32,
    pub bass: f32,
    pub other: f32,
}

impl Default for StemSizeTable {
    fn default() -> Self {
        Self {
            vocals: 30.0,
            drums: 30.0,
            bass: 20.0,
            other: 20.0,
        }
    }
}

impl StemSizeTable {
    pub fn seconds(&self, kind: StemKind) -> f32 {
        match kind {
            StemKind::Vocals => self.vocals,
            StemKind::Drums => self.drums,
            StemKind::Bass => self.bass,
            StemKind::Other => self.other,
        }
    }
}

/// Buffer pool limits and maintenance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Hard cap on memory held by all stem buffers (active + pooled)
    pub max_memory_bytes: u64,

    /// Memory pressure (0-1) above which default allocation sizes shrink
    pub pressure_threshold: f32,

    /// Fraction removed from default sizes under pressure
    pub pressure_shrink: f32,

    /// Idle time after which a pooled buffer may be destroyed
    pub max_age_secs: f64,

    /// Pooled buffers accessed at least this often are never destroyed by age
    pub min_access_count: u64,

    /// Memory pressure above which oversized pooled buffers are shrunk
    pub defrag_threshold: f32,

    /// Interval between maintenance sweeps
    pub maintenance_interval_secs: f64,

    pub base_seconds: StemSizeTable,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 512 * 1024 * 1024,
            pressure_threshold: 0.7,
            pressure_shrink: 0.3,
            max_age_secs: 300.0,
            min_access_count: 3,
            defrag_threshold: 0.8,
            maintenance_interval_secs: 30.0,
            base_seconds: StemSizeTable::default(),
        }
    }
}

/// Control-rate automation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Evaluation and recording rate in Hz
    pub resolution_hz: f64,

    /// Minimum change between kept samples when recording converts to keyframes
    pub record_threshold: f32,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            resolution_hz: 60.0,
            record_threshold: 0.1,
        }
    }
}

impl AutomationConfig {
    /// Seconds between control ticks
    pub fn tick_interval(&self) -> f64 {
        1.0 / self.resolution_hz.max(1.0)
    }
}

/// Mix-bus and effect-chain smoothing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixingConfig {
    /// Gain and wet/dry ramp time in milliseconds
    pub ramp_ms: f32,

    /// Dry level in parallel effect routing
    pub parallel_dry_gain: f32,
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            ramp_ms: 10.0,
            parallel_dry_gain: 0.7,
        }
    }
}

impl MixingConfig {
    /// Ramp length in frames at the given sample rate (at least one)
    pub fn ramp_frames(&self, sample_rate: u32) -> usize {
        ((self.ramp_ms.max(0.0) / 1000.0 * sample_rate as f32) as usize).max(1)
    }
}
