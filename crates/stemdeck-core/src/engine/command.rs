//! Lock-free control → audio command queue
//!
//! The control thread pushes [`EngineCommand`]s into an `rtrb` SPSC ring;
//! the renderer pops them at the start of every block. Both sides are
//! wait-free, so a busy control thread can never stall the callback.
//!
//! Stem buffers travel in both directions: `LoadStem` hands a buffer to
//! the audio thread, and a second ring ([`return_channel`]) carries
//! unloaded buffers back so nothing is freed on the audio thread.

use crate::buffer::StemBuffer;
use crate::effect::{EffectKind, EffectParameters, RoutingMode};

/// Default capacity of the command queue
///
/// Applying an effect preset to every stem sends one command per effect
/// per stem plus a full matrix resync, all in one burst.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Commands sent from the control thread to the renderer
pub enum EngineCommand {
    /// Start playing a loaded buffer in a slot, replacing any previous one
    ///
    /// Boxed so the command stays pointer-sized.
    LoadStem {
        slot: usize,
        buffer: Box<StemBuffer>,
    },
    /// Stop a slot and send its buffer back
    UnloadStem { slot: usize },
    /// Hard mute: the slot's contribution drops to zero in the next block
    SetStemMuted { slot: usize, muted: bool },
    /// Move a slot's playhead back to the start
    RewindStem { slot: usize },
    /// Ramp a matrix cell toward a new effective gain
    SetCellGain { source: usize, target: usize, gain: f32 },
    /// Replace one effect's parameters on a slot's rack
    SetEffect {
        slot: usize,
        kind: EffectKind,
        params: EffectParameters,
    },
    /// Switch a slot's routing (rebuilds the rack on change)
    SetRouting { slot: usize, mode: RoutingMode },
    SetLooping(bool),
}

pub type CommandSender = rtrb::Producer<EngineCommand>;
pub type CommandReceiver = rtrb::Consumer<EngineCommand>;

/// Create the command queue (producer for control, consumer for audio)
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    rtrb::RingBuffer::new(capacity.max(1))
}

/// Create the queue that carries finished buffers back to the pool
pub fn return_channel(capacity: usize) -> (rtrb::Producer<Box<StemBuffer>>, rtrb::Consumer<Box<StemBuffer>>) {
    rtrb::RingBuffer::new(capacity.max(1))
}
