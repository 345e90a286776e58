//! Audio engine - controller, renderer, mix bus
//!
//! The engine is split across two threads:
//! - [`StemController`] (control thread): pool, matrix and effect models,
//!   events, automation ticks
//! - [`AudioRenderer`] (real-time callback): active stem buffers, effect
//!   racks, mix bus
//!
//! They talk only through lock-free rtrb queues (commands one way, spent
//! buffers the other) and the [`EngineTelemetry`] atomics.
//! [`build_engine`] wires a matching pair together.

mod clock;
mod command;
mod controller;
mod mixbus;
mod ramp;
mod renderer;
mod telemetry;

pub use clock::{ClockCommand, ControlClock};
pub use command::{command_channel, return_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use controller::{EngineStatus, StemController, StemInput, StemStatus, TickReport};
pub use mixbus::MixBus;
pub use ramp::GainRamp;
pub use renderer::AudioRenderer;
pub use telemetry::{EngineTelemetry, TelemetrySnapshot};

use crate::config::EngineConfig;
use crate::events::EventBus;
use controller::ControllerParts;
use renderer::RendererParts;
use std::sync::Arc;

/// Construct a connected controller / renderer pair
///
/// Everything the renderer will ever need is allocated here. Hand the
/// renderer to the audio callback and keep the controller on the control
/// side (optionally behind a mutex shared with [`ControlClock`]).
pub fn build_engine(config: &EngineConfig) -> (StemController, AudioRenderer) {
    let capacity = config.command_queue_capacity.max(1);
    let (commands_tx, commands_rx) = command_channel(capacity);
    let (returns_tx, returns_rx) = return_channel(capacity);
    let telemetry = Arc::new(EngineTelemetry::new(config.stem_count));
    let max_block_frames = config.max_block_frames.max(1);

    let renderer = AudioRenderer::new(RendererParts {
        sample_rate: config.sample_rate,
        looping: config.looping,
        stem_count: config.stem_count,
        max_block_frames,
        ramp_frames: config.mixing.ramp_frames(config.sample_rate),
        parallel_dry_gain: config.mixing.parallel_dry_gain,
        commands: commands_rx,
        returns: returns_tx,
        telemetry: Arc::clone(&telemetry),
    });

    let controller = StemController::new(ControllerParts {
        config: config.clone(),
        commands: commands_tx,
        returns: returns_rx,
        telemetry,
        events: EventBus::default(),
    });

    log::info!(
        "Engine built: {} stems at {} Hz, blocks up to {} frames",
        config.stem_count,
        config.sample_rate,
        max_block_frames
    );
    (controller, renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectKind, EffectParameters, RoutingMode};
    use crate::types::{StemKind, StereoBuffer};

    #[test]
    fn test_silent_engine_renders_silence() {
        let (_controller, mut renderer) = build_engine(&EngineConfig::default());
        let mut out = StereoBuffer::silence(128);
        renderer.process(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(renderer.telemetry().frames_processed(), 128);
    }

    #[test]
    fn test_oversized_block_is_padded() {
        let mut config = EngineConfig::default();
        config.max_block_frames = 64;
        let (mut controller, mut renderer) = build_engine(&config);
        controller
            .load_stem(StemInput::new("t", StemKind::Drums, 48000, 1, vec![0.5; 4800]))
            .unwrap();
        let mut out = StereoBuffer::silence(100);
        renderer.process(&mut out);
        assert!((out[63].left - 0.5).abs() < 1e-5);
        assert_eq!(out[80].left, 0.0);
        assert_eq!(renderer.telemetry().frames_processed(), 64);
    }

    #[test]
    fn test_parallel_routing_end_to_end() {
        let mut config = EngineConfig::default();
        config.max_block_frames = 256;
        config.mixing.ramp_ms = 0.0;
        let (mut controller, mut renderer) = build_engine(&config);
        controller
            .load_stem(StemInput::new("t", StemKind::Bass, 48000, 2, vec![0.2; 9600]))
            .unwrap();
        assert!(controller.set_routing_mode(StemKind::Bass, RoutingMode::Parallel).unwrap());
        assert!(!controller.set_routing_mode(StemKind::Bass, RoutingMode::Parallel).unwrap());

        // Parallel dry with no active effects stays at unity
        let mut out = StereoBuffer::silence(128);
        renderer.process(&mut out);
        assert!((out[100].left - 0.2).abs() < 1e-4);

        controller
            .set_effect_parameters(
                StemKind::Bass,
                EffectKind::Compression,
                EffectParameters {
                    enabled: true,
                    intensity: 0.0,
                    ..EffectParameters::default_for(EffectKind::Compression)
                },
            )
            .unwrap();
        renderer.process(&mut out);
        renderer.process(&mut out);
        // 0.7 dry plus a fully wet transparent compressor
        assert!((out[100].left - 0.34).abs() < 0.02);
    }
}
