//! Stemdeck Core - real-time multi-stem mixing engine
//!
//! Plays separated stems (vocals, drums, bass, other) through per-stem
//! effect chains and an N×N routing matrix into a master bus.

pub mod automation;
pub mod buffer;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod events;
pub mod matrix;
pub mod types;

pub use engine::{build_engine, AudioRenderer, StemController, StemInput};
pub use error::{EngineError, EngineResult};
pub use types::*;
