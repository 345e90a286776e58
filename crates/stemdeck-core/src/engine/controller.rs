//! Control-thread side of the engine
//!
//! [`StemController`] owns everything that may allocate or log: the buffer
//! pool, the matrix model, the effect chain model and the event bus. Each
//! public operation validates against those models first and only then
//! forwards the result to the renderer as an [`EngineCommand`].
//!
//! Time on the control side is the engine clock in seconds, advanced by
//! [`StemController::control_tick`] (driven by the `ControlClock` service or
//! by an offline render loop).

use super::command::{CommandSender, EngineCommand};
use super::telemetry::{EngineTelemetry, TelemetrySnapshot};
use crate::automation::MixingAutomation;
use crate::buffer::{BufferId, BufferPool, MaintenanceReport, PoolError, PoolStats, StemBuffer, StemMetadata};
use crate::config::EngineConfig;
use crate::effect::{
    ChainCost, EffectChainProcessor, EffectKind, EffectParam, EffectParameters, EffectPreset, EffectUpdate,
    GestureKind, GestureMapping, InputAction, RoutingMode,
};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::matrix::{
    CellUpdate, HeuristicAdvisor, MatrixPreset, MatrixStatistics, MixAdvisor, MixingMatrix, Recommendation,
};
use crate::types::{AudioFormat, Sample, StemKind};
use crossbeam::channel::Receiver;
use serde::Serialize;
use std::sync::Arc;

/// Decoded stem audio handed in by the decode / separation collaborator
#[derive(Debug, Clone)]
pub struct StemInput {
    pub track_id: String,
    pub kind: StemKind,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples
    pub samples: Vec<Sample>,
    pub format: AudioFormat,
    /// Separation quality, 0-1
    pub quality: f32,
}

impl StemInput {
    pub fn new(track_id: &str, kind: StemKind, sample_rate: u32, channels: u16, samples: Vec<Sample>) -> Self {
        Self {
            track_id: track_id.to_string(),
            kind,
            sample_rate,
            channels,
            samples,
            format: AudioFormat::Raw,
            quality: 1.0,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    /// Whole frames in `samples` (a trailing partial frame is ignored)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    fn validate(&self, max_seconds: f64) -> EngineResult<()> {
        if !matches!(self.channels, 1 | 2) {
            return Err(EngineError::InvalidInput(format!(
                "{} channels (expected 1 or 2)",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidInput("sample rate is zero".to_string()));
        }
        if self.frames() == 0 {
            return Err(EngineError::InvalidInput("no audio frames".to_string()));
        }
        let duration = self.duration_secs();
        if duration > max_seconds {
            return Err(EngineError::InvalidInput(format!(
                "{:.1}s stem exceeds the {:.1}s limit",
                duration, max_seconds
            )));
        }
        Ok(())
    }
}

/// What one control tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Buffers drained from the audio thread back into the pool
    pub returned_buffers: usize,
    pub cell_updates: usize,
    pub effect_updates: usize,
}

/// Per-stem entry of [`EngineStatus`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StemStatus {
    pub kind: StemKind,
    pub loaded: bool,
    pub buffer_id: Option<BufferId>,
    pub routing: Option<RoutingMode>,
    pub active_effects: Vec<EffectKind>,
    pub cost: ChainCost,
}

/// Everything a UI polls, as plain data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub pool: PoolStats,
    pub hit_rate: f64,
    pub fragmentation: f64,
    pub memory_pressure: f32,
    pub matrix: MatrixStatistics,
    pub recording: bool,
    pub stems: Vec<StemStatus>,
    pub total_cost: ChainCost,
    pub telemetry: TelemetrySnapshot,
}

pub struct StemController {
    config: EngineConfig,
    pool: BufferPool,
    matrix: MixingMatrix,
    effects: EffectChainProcessor,
    events: EventBus,
    commands: CommandSender,
    returns: rtrb::Consumer<Box<StemBuffer>>,
    telemetry: Arc<EngineTelemetry>,
    advisor: Box<dyn MixAdvisor>,
    /// Buffer currently playing in each slot
    loaded: Vec<Option<BufferId>>,
    /// Engine clock, seconds
    clock: f64,
    last_maintenance: f64,
    /// A command was dropped; push full state on the next tick
    needs_resync: bool,
}

/// Everything the controller needs, assembled by `build_engine`
pub(crate) struct ControllerParts {
    pub config: EngineConfig,
    pub commands: CommandSender,
    pub returns: rtrb::Consumer<Box<StemBuffer>>,
    pub telemetry: Arc<EngineTelemetry>,
    pub events: EventBus,
}

impl StemController {
    pub(crate) fn new(parts: ControllerParts) -> Self {
        let config = parts.config;
        let pool = BufferPool::new(
            config.pool.clone(),
            config.sample_rate,
            config.effective_ring_frames(),
        );
        let matrix = MixingMatrix::new(config.stem_count, &config.automation);
        let effects = EffectChainProcessor::new(config.automation.resolution_hz);

        Self {
            pool,
            matrix,
            effects,
            events: parts.events,
            commands: parts.commands,
            returns: parts.returns,
            telemetry: parts.telemetry,
            advisor: Box::new(HeuristicAdvisor::default()),
            loaded: vec![None; config.stem_count],
            clock: 0.0,
            last_maintenance: 0.0,
            needs_resync: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current engine clock in seconds
    pub fn now(&self) -> f64 {
        self.clock
    }

    fn advance_clock(&mut self, now: f64) {
        if now > self.clock {
            self.clock = now;
        }
    }

    fn slot_for(&self, kind: StemKind) -> EngineResult<usize> {
        let slot = kind.index();
        if slot < self.config.stem_count {
            Ok(slot)
        } else {
            Err(EngineError::UnknownSlot(slot))
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Command plumbing
    // ─────────────────────────────────────────────────────────────

    /// Push a command, handing it back if the queue is full
    fn try_send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        match self.commands.push(cmd) {
            Ok(()) => Ok(()),
            Err(rtrb::PushError::Full(cmd)) => {
                log::warn!("StemController: command queue full");
                self.events.publish(EngineEvent::CommandQueueFull);
                Err(cmd)
            }
        }
    }

    /// Push a state command; a dropped one schedules a full resync
    fn send(&mut self, cmd: EngineCommand) -> EngineResult<()> {
        self.try_send(cmd).map_err(|_| {
            self.needs_resync = true;
            EngineError::QueueFull
        })
    }

    fn send_cell(&mut self, update: CellUpdate) -> EngineResult<()> {
        self.send(EngineCommand::SetCellGain {
            source: update.source,
            target: update.target,
            gain: update.gain,
        })
    }

    fn send_effect(&mut self, update: EffectUpdate) -> EngineResult<()> {
        let slot = self.slot_for(update.stem)?;
        self.send(EngineCommand::SetEffect {
            slot,
            kind: update.kind,
            params: update.params,
        })
    }

    /// Push one stem's whole chain (routing first, then every effect)
    fn sync_chain(&mut self, stem: StemKind) -> EngineResult<()> {
        let slot = self.slot_for(stem)?;
        let chain = self.effects.chain(stem)?.clone();
        self.send(EngineCommand::SetRouting {
            slot,
            mode: chain.routing,
        })?;
        for kind in EffectKind::ALL {
            self.send(EngineCommand::SetEffect {
                slot,
                kind,
                params: chain.params(kind),
            })?;
        }
        Ok(())
    }

    /// Push the complete matrix and every initialized chain to the renderer
    pub fn resync(&mut self) -> EngineResult<()> {
        self.needs_resync = false;
        let updates: Vec<CellUpdate> = self.matrix.all_updates().collect();
        for update in updates {
            self.send_cell(update)?;
        }
        for stem in StemKind::ALL {
            if self.effects.is_initialized(stem) && self.slot_for(stem).is_ok() {
                self.sync_chain(stem)?;
            }
        }
        self.send(EngineCommand::SetLooping(self.config.looping))
    }

    // ─────────────────────────────────────────────────────────────
    // Stems
    // ─────────────────────────────────────────────────────────────

    /// Copy decoded audio into a pooled buffer and start it in its slot
    ///
    /// A buffer already playing in the slot is replaced and comes back
    /// through the return queue on a later tick.
    pub fn load_stem(&mut self, input: StemInput) -> EngineResult<BufferId> {
        input.validate(self.config.max_stem_seconds)?;
        let kind = input.kind;
        let slot = self.slot_for(kind)?;
        let frames = input.frames();
        let now = self.now();

        if input.sample_rate != self.config.sample_rate {
            log::warn!(
                "StemController: {} '{}' is {} Hz, engine runs at {} Hz (played unconverted)",
                kind,
                input.track_id,
                input.sample_rate,
                self.config.sample_rate
            );
        }

        // Chain first: a full queue must not strand a buffer on loan
        if self.effects.init_stem(kind) {
            self.sync_chain(kind)?;
        }

        let mut buffer = match self.pool.allocate(kind, Some(frames), now) {
            Ok(buffer) => buffer,
            Err(err) => {
                let requested_bytes = match &err {
                    PoolError::OutOfMemory { requested, .. } => *requested as usize,
                    PoolError::UnknownBuffer(_) => 0,
                };
                self.events.publish(EngineEvent::AllocationFailed { kind, requested_bytes });
                return Err(err.into());
            }
        };

        let stored = buffer.load_interleaved(&input.samples, input.channels);
        buffer.set_metadata(StemMetadata {
            track_id: input.track_id.clone(),
            sample_rate: input.sample_rate,
            channels: input.channels,
            duration_secs: input.duration_secs(),
            byte_length: (input.samples.len() * std::mem::size_of::<Sample>()) as u64,
            format: input.format,
            compressed: input.format.is_compressed(),
            quality: if input.quality.is_nan() { 0.0 } else { input.quality.clamp(0.0, 1.0) },
        });
        let id = buffer.id();

        if let Err(cmd) = self.try_send(EngineCommand::LoadStem { slot, buffer }) {
            if let EngineCommand::LoadStem { buffer, .. } = cmd {
                self.pool.deallocate(buffer, now)?;
            }
            return Err(EngineError::QueueFull);
        }

        self.loaded[slot] = Some(id);
        log::info!(
            "StemController: loaded {} '{}' into {} ({} frames)",
            kind,
            input.track_id,
            id,
            stored
        );
        self.events.publish(EngineEvent::StemLoaded {
            kind,
            buffer_id: id,
            frames: stored,
        });
        Ok(id)
    }

    /// Stop a stem; its buffer returns to the pool on the next tick
    pub fn unload_stem(&mut self, kind: StemKind) -> EngineResult<()> {
        let slot = self.slot_for(kind)?;
        self.send(EngineCommand::UnloadStem { slot })?;
        if self.loaded[slot].take().is_some() {
            log::info!("StemController: unloaded {}", kind);
            self.events.publish(EngineEvent::StemUnloaded { kind });
        }
        Ok(())
    }

    pub fn loaded_buffer(&self, kind: StemKind) -> Option<BufferId> {
        self.loaded.get(kind.index()).copied().flatten()
    }

    /// Hard mute: silent from the next block, no ramp
    pub fn set_stem_muted(&mut self, kind: StemKind, muted: bool) -> EngineResult<()> {
        let slot = self.slot_for(kind)?;
        self.send(EngineCommand::SetStemMuted { slot, muted })
    }

    pub fn rewind_stem(&mut self, kind: StemKind) -> EngineResult<()> {
        let slot = self.slot_for(kind)?;
        self.send(EngineCommand::RewindStem { slot })
    }

    pub fn set_looping(&mut self, looping: bool) -> EngineResult<()> {
        self.config.looping = looping;
        self.send(EngineCommand::SetLooping(looping))
    }

    /// Create a stem's effect chain ahead of loading audio
    pub fn init_stem(&mut self, kind: StemKind) -> EngineResult<bool> {
        self.slot_for(kind)?;
        let created = self.effects.init_stem(kind);
        if created {
            self.sync_chain(kind)?;
        }
        Ok(created)
    }

    // ─────────────────────────────────────────────────────────────
    // Matrix
    // ─────────────────────────────────────────────────────────────

    pub fn matrix(&self) -> &MixingMatrix {
        &self.matrix
    }

    pub fn set_cell_gain(&mut self, source: usize, target: usize, gain: f32) -> EngineResult<()> {
        let update = self.matrix.set_gain(source, target, gain)?;
        self.send_cell(update)
    }

    pub fn set_cell_enabled(&mut self, source: usize, target: usize, enabled: bool) -> EngineResult<()> {
        let update = self.matrix.set_enabled(source, target, enabled)?;
        self.send_cell(update)
    }

    pub fn set_cell_automation(
        &mut self,
        source: usize,
        target: usize,
        automation: Option<MixingAutomation>,
    ) -> EngineResult<()> {
        self.matrix.set_automation(source, target, automation)
    }

    pub fn set_cell_automation_enabled(&mut self, source: usize, target: usize, enabled: bool) -> EngineResult<()> {
        self.matrix.set_automation_enabled(source, target, enabled)
    }

    /// Replace the whole matrix from a preset and push every cell
    pub fn apply_matrix_preset(&mut self, preset: &MatrixPreset) -> EngineResult<bool> {
        let reconnected = self.matrix.apply_preset(preset)?;
        let updates: Vec<CellUpdate> = self.matrix.all_updates().collect();
        for update in updates {
            self.send_cell(update)?;
        }
        self.events.publish(EngineEvent::PresetApplied {
            name: preset.name.clone(),
            reconnected,
        });
        Ok(reconnected)
    }

    /// Apply one of the built-in matrix presets by name
    pub fn apply_builtin_matrix_preset(&mut self, name: &str) -> EngineResult<bool> {
        let preset = MatrixPreset::find_builtin(name)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown matrix preset '{}'", name)))?;
        self.apply_matrix_preset(&preset)
    }

    pub fn start_recording(&mut self) {
        let now = self.now();
        self.matrix.start_recording(now);
    }

    /// Finish a recording; returns how many cells got automation
    pub fn stop_recording(&mut self) -> usize {
        let now = self.now();
        let cells_with_keyframes = self.matrix.stop_recording(now);
        self.events
            .publish(EngineEvent::RecordingFinished { cells_with_keyframes });
        cells_with_keyframes
    }

    pub fn set_advisor(&mut self, advisor: Box<dyn MixAdvisor>) {
        self.advisor = advisor;
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.matrix.recommendations(self.advisor.as_ref())
    }

    /// Apply every gain change a recommendation proposes
    pub fn apply_recommendation(&mut self, recommendation: &Recommendation) -> EngineResult<()> {
        for adj in &recommendation.adjustments {
            self.matrix.set_gain(adj.source, adj.target, adj.gain)?;
            let update = self.matrix.set_enabled(adj.source, adj.target, adj.gain > 0.0)?;
            self.send_cell(update)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────

    pub fn effects(&self) -> &EffectChainProcessor {
        &self.effects
    }

    /// Store (clamped) parameters and ramp the rack toward them
    pub fn set_effect_parameters(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        params: EffectParameters,
    ) -> EngineResult<EffectParameters> {
        self.slot_for(stem)?;
        let update = self.effects.set_effect_parameters(stem, kind, params)?;
        self.send_effect(update)?;
        Ok(update.params)
    }

    pub fn set_effect_parameter(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        param: EffectParam,
        value: f32,
    ) -> EngineResult<EffectParameters> {
        self.slot_for(stem)?;
        let update = self.effects.set_parameter(stem, kind, param, value)?;
        self.send_effect(update)?;
        Ok(update.params)
    }

    pub fn set_effect_enabled(&mut self, stem: StemKind, kind: EffectKind, enabled: bool) -> EngineResult<()> {
        self.slot_for(stem)?;
        let update = self.effects.set_enabled(stem, kind, enabled)?;
        self.send_effect(update)
    }

    /// Switch routing; returns whether the rack had to rebuild
    pub fn set_routing_mode(&mut self, stem: StemKind, mode: RoutingMode) -> EngineResult<bool> {
        let slot = self.slot_for(stem)?;
        let changed = self.effects.set_routing_mode(stem, mode)?;
        if changed {
            self.send(EngineCommand::SetRouting { slot, mode })?;
        }
        Ok(changed)
    }

    /// Rewrite a stem's whole chain from a preset in one burst
    pub fn apply_effect_preset(&mut self, stem: StemKind, preset: &EffectPreset) -> EngineResult<bool> {
        let slot = self.slot_for(stem)?;
        let change = self.effects.apply_preset(stem, preset)?;
        if change.rebuilt {
            self.send(EngineCommand::SetRouting {
                slot,
                mode: change.routing,
            })?;
        }
        for update in change.updates {
            self.send_effect(update)?;
        }
        self.events.publish(EngineEvent::EffectPresetApplied {
            stem,
            name: preset.name.clone(),
            rebuilt: change.rebuilt,
        });
        Ok(change.rebuilt)
    }

    /// Apply one of the built-in effect presets by name
    pub fn apply_builtin_effect_preset(&mut self, stem: StemKind, name: &str) -> EngineResult<bool> {
        let preset = EffectPreset::find_builtin(name)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown effect preset '{}'", name)))?;
        self.apply_effect_preset(stem, &preset)
    }

    pub fn set_parameter_automation(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        param: EffectParam,
        automation: Option<MixingAutomation>,
    ) -> EngineResult<()> {
        self.effects.set_parameter_automation(stem, kind, param, automation)
    }

    pub fn set_gesture_mappings(&mut self, mappings: Vec<GestureMapping>) {
        self.effects.set_mappings(mappings);
    }

    pub fn set_focus(&mut self, stem: StemKind) {
        self.effects.set_focus(stem);
    }

    /// Route one normalized gesture value to effects and matrix cells
    pub fn process_input(&mut self, gesture: GestureKind, value: f32) -> EngineResult<Vec<InputAction>> {
        let actions = self.effects.process_input(gesture, value)?;
        for action in &actions {
            match *action {
                InputAction::Effect(update) => self.send_effect(update)?,
                InputAction::CellGain { source, target, gain } => self.set_cell_gain(source, target, gain)?,
                InputAction::CellToggle { source, target } => {
                    let enabled = self.matrix.cell(source, target)?.enabled;
                    self.set_cell_enabled(source, target, !enabled)?;
                }
            }
        }
        Ok(actions)
    }

    pub fn active_effects(&self, stem: StemKind) -> EngineResult<Vec<EffectKind>> {
        self.effects.active_effects(stem)
    }

    pub fn stem_cost(&self, stem: StemKind) -> EngineResult<ChainCost> {
        self.effects.cost(stem)
    }

    pub fn total_cost(&self) -> ChainCost {
        self.effects.total_cost()
    }

    // ─────────────────────────────────────────────────────────────
    // Periodic work
    // ─────────────────────────────────────────────────────────────

    /// Control-rate housekeeping: reclaim buffers, run automation, record
    pub fn control_tick(&mut self, now: f64) -> TickReport {
        self.advance_clock(now);
        let now = self.clock;
        let mut report = TickReport::default();

        while let Ok(buffer) = self.returns.pop() {
            let id = buffer.id();
            if let Err(err) = self.pool.deallocate(buffer, now) {
                log::warn!("StemController: returned buffer {} rejected: {}", id, err);
            }
            report.returned_buffers += 1;
        }

        if self.needs_resync {
            log::info!("StemController: resyncing renderer after dropped commands");
            if let Err(err) = self.resync() {
                log::warn!("StemController: resync incomplete: {}", err);
            }
        }

        for update in self.matrix.tick(now) {
            if self.send_cell(update).is_ok() {
                report.cell_updates += 1;
            }
        }

        let telemetry = &self.telemetry;
        self.matrix.record_frame(now, |idx| telemetry.cell_gain(idx));

        for update in self.effects.tick(now) {
            if self.send_effect(update).is_ok() {
                report.effect_updates += 1;
            }
        }
        report
    }

    /// Garbage-collect and defragment the pool's free set
    pub fn maintain(&mut self, now: f64) -> MaintenanceReport {
        self.advance_clock(now);
        self.last_maintenance = self.clock;
        let report = self.pool.maintain(self.clock);
        if report.destroyed > 0 || report.defragmented > 0 {
            log::info!(
                "StemController: maintenance destroyed {} and shrank {} buffers",
                report.destroyed,
                report.defragmented
            );
            self.events.publish(EngineEvent::PoolMaintenance {
                destroyed: report.destroyed,
                defragmented: report.defragmented,
            });
        }
        report
    }

    /// Run `maintain` if the configured interval has elapsed
    pub fn maintain_if_due(&mut self, now: f64) -> Option<MaintenanceReport> {
        if now - self.last_maintenance >= self.config.pool.maintenance_interval_secs {
            Some(self.maintain(now))
        } else {
            None
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Telemetry
    // ─────────────────────────────────────────────────────────────

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn telemetry(&self) -> Arc<EngineTelemetry> {
        Arc::clone(&self.telemetry)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        let pool = self.pool.stats();
        let stems = StemKind::ALL
            .iter()
            .filter(|kind| kind.index() < self.config.stem_count)
            .map(|&kind| {
                let chain = self.effects.chain(kind).ok();
                StemStatus {
                    kind,
                    loaded: self.telemetry.is_loaded(kind.index()),
                    buffer_id: self.loaded_buffer(kind),
                    routing: chain.map(|c| c.routing),
                    active_effects: chain.map(|c| c.active_effects()).unwrap_or_default(),
                    cost: chain.map(|c| c.cost()).unwrap_or_default(),
                }
            })
            .collect();

        EngineStatus {
            hit_rate: pool.hit_rate(),
            fragmentation: pool.fragmentation(),
            memory_pressure: self.pool.memory_pressure(),
            pool,
            matrix: self.matrix.statistics(),
            recording: self.matrix.is_recording(),
            stems,
            total_cost: self.effects.total_cost(),
            telemetry: self.telemetry.snapshot(),
        }
    }
}
