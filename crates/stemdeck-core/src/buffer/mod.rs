//! Stem buffer storage
//!
//! - [`RingBuffer`]: fixed-capacity stereo ring with overwrite-on-full
//! - [`StemBuffer`]: one stem's decoded audio plus its playback ring
//! - [`BufferPool`]: allocation, reuse, garbage collection and
//!   defragmentation of stem buffers under a memory cap

mod error;
mod pool;
mod ring;
mod stats;
mod stem_buffer;

pub use error::{PoolError, PoolResult};
pub use pool::{BufferPool, MaintenanceReport};
pub use ring::RingBuffer;
pub use stats::PoolStats;
pub use stem_buffer::{BufferId, StemBuffer, StemMetadata};
