//! Control-side effect chain model
//!
//! [`EffectChainProcessor`] holds one [`EffectChainConfig`] per stem and is
//! the only place effect parameters are validated. Every mutation returns
//! the resulting [`EffectUpdate`]s; the owner forwards them to the stem's
//! rack on the audio thread.

use super::gesture::{EffectUpdate, GestureKind, GestureMapping, InputAction, MappingBehavior, MappingTarget, CYCLE_ORDER};
use super::preset::EffectPreset;
use super::{EffectKind, EffectParam, EffectParameters, RoutingMode};
use crate::automation::{AutomationEngine, MixingAutomation};
use crate::error::{EngineError, EngineResult};
use crate::types::{StemKind, NUM_STEMS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Routing plus parameters for every effect kind on one stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectChainConfig {
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default)]
    pub effects: BTreeMap<EffectKind, EffectParameters>,
}

impl Default for EffectChainConfig {
    fn default() -> Self {
        Self {
            routing: RoutingMode::Serial,
            effects: EffectKind::ALL
                .iter()
                .map(|&kind| (kind, EffectParameters::default_for(kind)))
                .collect(),
        }
    }
}

impl EffectChainConfig {
    pub fn params(&self, kind: EffectKind) -> EffectParameters {
        self.effects
            .get(&kind)
            .copied()
            .unwrap_or_else(|| EffectParameters::default_for(kind))
    }

    /// Enabled, non-bypassed effects in serial order
    pub fn active_effects(&self) -> Vec<EffectKind> {
        self.effects
            .iter()
            .filter(|(_, p)| p.is_active())
            .map(|(&kind, _)| kind)
            .collect()
    }

    pub fn cost(&self) -> ChainCost {
        let mut cost = ChainCost::default();
        for kind in self.active_effects() {
            let c = kind.cost();
            cost.cpu_percent += c.cpu_percent;
            cost.latency_ms += c.latency_ms;
            cost.active_effects += 1;
        }
        cost
    }
}

/// Aggregate estimate over active effects
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainCost {
    pub cpu_percent: f32,
    pub latency_ms: f32,
    pub active_effects: usize,
}

impl ChainCost {
    pub fn combine(self, other: ChainCost) -> ChainCost {
        ChainCost {
            cpu_percent: self.cpu_percent + other.cpu_percent,
            latency_ms: self.latency_ms + other.latency_ms,
            active_effects: self.active_effects + other.active_effects,
        }
    }
}

/// What applying an effect preset changed
#[derive(Debug, Clone, PartialEq)]
pub struct PresetChange {
    /// One update per effect kind
    pub updates: Vec<EffectUpdate>,
    pub routing: RoutingMode,
    /// Routing differed from the previous chain
    pub rebuilt: bool,
}

/// Disabled effects left at their defaults cost nothing and are bypassed
fn validate(kind: EffectKind, params: EffectParameters) -> EffectParameters {
    let mut params = params.clamped();
    if !params.enabled && params.is_default_for(kind) {
        params.bypass = true;
    }
    params
}

pub struct EffectChainProcessor {
    chains: [Option<EffectChainConfig>; NUM_STEMS],
    automation: BTreeMap<(StemKind, EffectKind, EffectParam), AutomationEngine>,
    resolution_hz: f64,
    mappings: Vec<GestureMapping>,
    /// Trigger mappings re-arm once their input falls below threshold
    armed: Vec<bool>,
    focus: StemKind,
}

impl EffectChainProcessor {
    pub fn new(resolution_hz: f64) -> Self {
        let mappings = GestureMapping::defaults();
        Self {
            chains: Default::default(),
            automation: BTreeMap::new(),
            resolution_hz,
            armed: vec![true; mappings.len()],
            mappings,
            focus: StemKind::Vocals,
        }
    }

    /// Create a default chain for `stem`; returns false if one already exists
    pub fn init_stem(&mut self, stem: StemKind) -> bool {
        let slot = &mut self.chains[stem.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(EffectChainConfig::default());
        log::debug!("EffectChainProcessor: initialized chain for {}", stem);
        true
    }

    /// Tear down a stem's chain and its parameter automation
    pub fn remove_stem(&mut self, stem: StemKind) -> bool {
        self.automation.retain(|&(s, _, _), _| s != stem);
        self.chains[stem.index()].take().is_some()
    }

    pub fn is_initialized(&self, stem: StemKind) -> bool {
        self.chains[stem.index()].is_some()
    }

    pub fn chain(&self, stem: StemKind) -> EngineResult<&EffectChainConfig> {
        self.chains[stem.index()]
            .as_ref()
            .ok_or(EngineError::StemNotInitialized(stem))
    }

    fn chain_mut(&mut self, stem: StemKind) -> EngineResult<&mut EffectChainConfig> {
        self.chains[stem.index()]
            .as_mut()
            .ok_or(EngineError::StemNotInitialized(stem))
    }

    fn store(&mut self, stem: StemKind, kind: EffectKind, params: EffectParameters) -> EngineResult<EffectUpdate> {
        let params = validate(kind, params);
        self.chain_mut(stem)?.effects.insert(kind, params);
        Ok(EffectUpdate { stem, kind, params })
    }

    /// Replace an effect's parameters (clamped, auto-bypassed when idle)
    pub fn set_effect_parameters(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        params: EffectParameters,
    ) -> EngineResult<EffectUpdate> {
        self.store(stem, kind, params)
    }

    /// Write one numeric parameter
    pub fn set_parameter(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        param: EffectParam,
        value: f32,
    ) -> EngineResult<EffectUpdate> {
        let mut params = self.chain(stem)?.params(kind);
        params.set(param, value);
        self.store(stem, kind, params)
    }

    /// Turn an effect on or off; turning on also clears bypass
    pub fn set_enabled(&mut self, stem: StemKind, kind: EffectKind, enabled: bool) -> EngineResult<EffectUpdate> {
        let mut params = self.chain(stem)?.params(kind);
        params.enabled = enabled;
        if enabled {
            params.bypass = false;
        }
        self.store(stem, kind, params)
    }

    pub fn routing_mode(&self, stem: StemKind) -> EngineResult<RoutingMode> {
        Ok(self.chain(stem)?.routing)
    }

    /// Returns whether the topology changed (and the rack must rebuild)
    pub fn set_routing_mode(&mut self, stem: StemKind, mode: RoutingMode) -> EngineResult<bool> {
        let chain = self.chain_mut(stem)?;
        if chain.routing == mode {
            return Ok(false);
        }
        chain.routing = mode;
        log::debug!("EffectChainProcessor: {} routing -> {:?}", stem, mode);
        Ok(true)
    }

    /// Rewrite every effect of a stem from a preset
    pub fn apply_preset(&mut self, stem: StemKind, preset: &EffectPreset) -> EngineResult<PresetChange> {
        let target = preset.to_config();
        let chain = self.chain_mut(stem)?;
        let rebuilt = chain.routing != target.routing;

        let mut next = EffectChainConfig {
            routing: target.routing,
            effects: BTreeMap::new(),
        };
        let mut updates = Vec::with_capacity(target.effects.len());
        for (&kind, &params) in &target.effects {
            let params = validate(kind, params);
            next.effects.insert(kind, params);
            updates.push(EffectUpdate { stem, kind, params });
        }
        *chain = next;

        log::info!(
            "EffectChainProcessor: applied preset '{}' to {}{}",
            preset.name,
            stem,
            if rebuilt { " (routing changed)" } else { "" }
        );
        Ok(PresetChange {
            updates,
            routing: target.routing,
            rebuilt,
        })
    }

    pub fn active_effects(&self, stem: StemKind) -> EngineResult<Vec<EffectKind>> {
        Ok(self.chain(stem)?.active_effects())
    }

    pub fn cost(&self, stem: StemKind) -> EngineResult<ChainCost> {
        Ok(self.chain(stem)?.cost())
    }

    /// Summed cost of every initialized chain
    pub fn total_cost(&self) -> ChainCost {
        self.chains
            .iter()
            .flatten()
            .map(EffectChainConfig::cost)
            .fold(ChainCost::default(), ChainCost::combine)
    }

    /// Attach (`Some`) or detach (`None`) automation on one effect parameter
    pub fn set_parameter_automation(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        param: EffectParam,
        automation: Option<MixingAutomation>,
    ) -> EngineResult<()> {
        self.chain(stem)?;
        let key = (stem, kind, param);
        match automation {
            Some(mut automation) => {
                automation.normalize();
                let resolution_hz = self.resolution_hz;
                self.automation
                    .entry(key)
                    .or_insert_with(|| AutomationEngine::new(resolution_hz))
                    .set_automation(automation);
            }
            None => {
                self.automation.remove(&key);
            }
        }
        Ok(())
    }

    pub fn has_parameter_automation(&self, stem: StemKind, kind: EffectKind, param: EffectParam) -> bool {
        self.automation.contains_key(&(stem, kind, param))
    }

    /// Run parameter automation; one update per effect that moved
    pub fn tick(&mut self, now: f64) -> Vec<EffectUpdate> {
        let mut moved: BTreeMap<(StemKind, EffectKind), EffectParameters> = BTreeMap::new();
        for (&(stem, kind, param), engine) in self.automation.iter_mut() {
            let Some(value) = engine.tick(now) else {
                continue;
            };
            let Some(chain) = self.chains[stem.index()].as_mut() else {
                continue;
            };
            let params = chain
                .effects
                .entry(kind)
                .or_insert_with(|| EffectParameters::default_for(kind));
            if (params.get(param) - value).abs() > f32::EPSILON {
                params.set(param, value);
                moved.insert((stem, kind), *params);
            }
        }
        moved
            .into_iter()
            .map(|((stem, kind), params)| EffectUpdate { stem, kind, params })
            .collect()
    }

    pub fn mappings(&self) -> &[GestureMapping] {
        &self.mappings
    }

    pub fn set_mappings(&mut self, mappings: Vec<GestureMapping>) {
        self.armed = vec![true; mappings.len()];
        self.mappings = mappings;
    }

    pub fn focus(&self) -> StemKind {
        self.focus
    }

    /// Stem that mappings without an explicit stem act on
    pub fn set_focus(&mut self, stem: StemKind) {
        self.focus = stem;
    }

    /// Feed one normalized gesture value through the mapping table
    ///
    /// Fails without touching any chain or trigger state if a matching
    /// effect mapping points at an uninitialized stem.
    pub fn process_input(&mut self, gesture: GestureKind, value: f32) -> EngineResult<Vec<InputAction>> {
        for mapping in self.mappings.iter().filter(|m| m.gesture == gesture) {
            if let MappingTarget::Effect(_) = mapping.target {
                self.chain(mapping.stem.unwrap_or(self.focus))?;
            }
        }

        let mut actions = Vec::new();
        for idx in 0..self.mappings.len() {
            let mapping = &self.mappings[idx];
            if mapping.gesture != gesture {
                continue;
            }
            let Some(scaled) = mapping.scale(value) else {
                self.armed[idx] = true;
                continue;
            };
            if mapping.behavior.is_trigger() {
                if !self.armed[idx] {
                    continue;
                }
                self.armed[idx] = false;
            }

            let behavior = mapping.behavior;
            let parameter = mapping.parameter;
            let target = mapping.target;
            let stem = mapping.stem.unwrap_or(self.focus);
            let mapped = mapping.map(scaled);

            match target {
                MappingTarget::Cell { source, target } => {
                    actions.push(if behavior.is_trigger() {
                        InputAction::CellToggle { source, target }
                    } else {
                        InputAction::CellGain {
                            source,
                            target,
                            gain: mapped,
                        }
                    });
                }
                MappingTarget::Effect(kind) => {
                    let updates = self.apply_behavior(stem, kind, behavior, parameter, mapped)?;
                    actions.extend(updates.into_iter().map(InputAction::Effect));
                }
            }
        }
        Ok(actions)
    }

    fn apply_behavior(
        &mut self,
        stem: StemKind,
        kind: EffectKind,
        behavior: MappingBehavior,
        parameter: EffectParam,
        value: f32,
    ) -> EngineResult<Vec<EffectUpdate>> {
        let current = self.chain(stem)?.params(kind);
        let written = |param: EffectParam| {
            let mut p = current;
            p.set(param, value);
            p.enabled = true;
            p.bypass = false;
            p
        };
        let update = match behavior {
            MappingBehavior::Intensity => self.store(stem, kind, written(EffectParam::Intensity))?,
            MappingBehavior::ParameterSweep => self.store(stem, kind, written(parameter))?,
            MappingBehavior::WetDry => self.store(stem, kind, written(EffectParam::Wetness))?,
            MappingBehavior::Toggle => self.set_enabled(stem, kind, !current.enabled)?,
            MappingBehavior::CycleNext => return self.cycle_next(stem),
        };
        Ok(vec![update])
    }

    /// Disable the enabled effect in the cycle list and enable its successor
    fn cycle_next(&mut self, stem: StemKind) -> EngineResult<Vec<EffectUpdate>> {
        let chain = self.chain(stem)?;
        let current = CYCLE_ORDER.iter().position(|&k| chain.params(k).enabled);
        let next = match current {
            Some(i) => CYCLE_ORDER[(i + 1) % CYCLE_ORDER.len()],
            None => CYCLE_ORDER[0],
        };

        let mut updates = Vec::with_capacity(2);
        if let Some(i) = current {
            updates.push(self.set_enabled(stem, CYCLE_ORDER[i], false)?);
        }
        updates.push(self.set_enabled(stem, next, true)?);
        Ok(updates)
    }
}
