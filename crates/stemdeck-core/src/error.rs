//! Engine error types
//!
//! Only caller-side mistakes and resource exhaustion are errors. Underruns
//! and out-of-range parameter values are absorbed where they happen
//! (silence and clamping respectively).

use crate::buffer::PoolError;
use crate::types::StemKind;
use thiserror::Error;

/// Errors surfaced to the control layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Operation on a stem whose effect chain was never initialized
    #[error("Stem not initialized: {0}")]
    StemNotInitialized(StemKind),

    /// Matrix cell outside the N×N grid
    #[error("Unknown matrix cell: {from} -> {to}")]
    UnknownCell { from: usize, to: usize },

    /// Stem slot index outside the engine's stem count
    #[error("Unknown stem slot: {0}")]
    UnknownSlot(usize),

    /// Decoded input rejected by validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The buffer pool refused the request
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The audio thread's command queue is full
    #[error("Command queue full")]
    QueueFull,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
