//! Effect chain presets
//!
//! A preset is a named, complete chain configuration: routing mode plus
//! parameters for every effect it lists. Effects a preset leaves out fall
//! back to their defaults when applied, so applying a preset always
//! rewrites the whole chain.

use super::chain::EffectChainConfig;
use super::{EffectKind, EffectParameters, RoutingMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectPreset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default)]
    pub effects: BTreeMap<EffectKind, EffectParameters>,
}

impl EffectPreset {
    pub fn new(name: &str, description: &str, routing: RoutingMode) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            routing,
            effects: BTreeMap::new(),
        }
    }

    /// Enable `kind` with the given wetness / intensity / params
    pub fn with_effect(mut self, kind: EffectKind, wetness: f32, intensity: f32, param1: f32, param2: f32) -> Self {
        self.effects.insert(
            kind,
            EffectParameters {
                enabled: true,
                wetness,
                intensity,
                param1,
                param2,
                bypass: false,
            }
            .clamped(),
        );
        self
    }

    /// Parameters this preset assigns to `kind`
    pub fn params(&self, kind: EffectKind) -> EffectParameters {
        self.effects
            .get(&kind)
            .map(|p| p.clamped())
            .unwrap_or_else(|| EffectParameters::default_for(kind))
    }

    /// The full chain this preset describes
    pub fn to_config(&self) -> EffectChainConfig {
        let mut config = EffectChainConfig {
            routing: self.routing,
            ..EffectChainConfig::default()
        };
        for kind in EffectKind::ALL {
            config.effects.insert(kind, self.params(kind));
        }
        config
    }

    /// Snapshot a chain as a preset (only non-default effects are listed)
    pub fn from_config(name: &str, config: &EffectChainConfig) -> Self {
        let mut preset = Self::new(name, "", config.routing);
        for (&kind, params) in &config.effects {
            if params.enabled || !params.is_default_for(kind) {
                preset.effects.insert(kind, *params);
            }
        }
        preset
    }

    /// Acoustic-space presets, from dry and tight to huge and layered
    ///
    /// They differ in compression amount, reverb size and damping, and
    /// filter character. Stadium runs parallel so the slapback and the
    /// tail sit on top of the untouched stem.
    pub fn builtin() -> Vec<EffectPreset> {
        use EffectKind::*;
        vec![
            EffectPreset::new("studio", "Dry and controlled, short bright room", RoutingMode::Serial)
                .with_effect(Compression, 1.0, 0.3, 0.2, 0.3)
                .with_effect(Reverb, 0.12, 0.2, 0.3, 0.6),
            EffectPreset::new("club", "Punchy compression, warm low-passed room", RoutingMode::Serial)
                .with_effect(Compression, 1.0, 0.6, 0.1, 0.2)
                .with_effect(Filter, 1.0, 0.15, 0.0, 0.2)
                .with_effect(Reverb, 0.2, 0.45, 0.6, 0.8),
            EffectPreset::new("hall", "Gentle dynamics, long dark tail", RoutingMode::Serial)
                .with_effect(Compression, 1.0, 0.2, 0.4, 0.6)
                .with_effect(Reverb, 0.35, 0.8, 0.7, 1.0),
            EffectPreset::new("stadium", "Heavy glue, slapback echo and a huge tail", RoutingMode::Parallel)
                .with_effect(Compression, 1.0, 0.7, 0.05, 0.4)
                .with_effect(Filter, 1.0, 0.2, 1.0, 0.1)
                .with_effect(Delay, 0.25, 0.3, 0.1, 0.0)
                .with_effect(Reverb, 0.45, 0.95, 0.5, 1.0),
        ]
    }

    pub fn find_builtin(name: &str) -> Option<EffectPreset> {
        Self::builtin().into_iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_distinct_spaces() {
        let presets = EffectPreset::builtin();
        let names: Vec<_> = presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["studio", "club", "hall", "stadium"]);

        let sizes: Vec<f32> = presets.iter().map(|p| p.params(EffectKind::Reverb).intensity).collect();
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(
            EffectPreset::find_builtin("stadium").map(|p| p.routing),
            Some(RoutingMode::Parallel)
        );
    }

    #[test]
    fn test_unlisted_effects_use_defaults() {
        let preset = EffectPreset::find_builtin("studio").unwrap();
        let config = preset.to_config();
        assert_eq!(config.effects.len(), EffectKind::ALL.len());
        assert_eq!(
            config.effects[&EffectKind::Flanger],
            EffectParameters::default_for(EffectKind::Flanger)
        );
        assert!(config.effects[&EffectKind::Compression].enabled);
    }

    #[test]
    fn test_config_snapshot_roundtrip() {
        let preset = EffectPreset::find_builtin("club").unwrap();
        let back = EffectPreset::from_config("club", &preset.to_config());
        assert_eq!(back.effects, preset.effects);
        assert_eq!(back.routing, preset.routing);
    }

    #[test]
    fn test_yaml_and_json_roundtrip() {
        for preset in EffectPreset::builtin() {
            let yaml = serde_yaml::to_string(&preset).unwrap();
            let from_yaml: EffectPreset = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(from_yaml, preset);

            let json = serde_json::to_string(&preset).unwrap();
            let from_json: EffectPreset = serde_json::from_str(&json).unwrap();
            assert_eq!(from_json, preset);
        }
    }
}
