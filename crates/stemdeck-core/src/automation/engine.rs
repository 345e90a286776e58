//! Control-rate automation playback
//!
//! An `AutomationEngine` drives a single scalar parameter. It is ticked by
//! the control clock (not the audio callback) and emits a new target value
//! at most once per resolution interval; the consumer turns that into a
//! ramp on the audio side.

use super::MixingAutomation;

/// Fraction of the tick interval tolerated as clock jitter
const TICK_JITTER: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct AutomationEngine {
    automation: Option<MixingAutomation>,
    resolution_hz: f64,
    running: bool,
    /// Engine time at which the current run started
    origin: Option<f64>,
    last_tick: Option<f64>,
    last_value: Option<f32>,
}

impl AutomationEngine {
    pub fn new(resolution_hz: f64) -> Self {
        Self {
            automation: None,
            resolution_hz: resolution_hz.max(1.0),
            running: false,
            origin: None,
            last_tick: None,
            last_value: None,
        }
    }

    /// Install keyframes; starts running if the automation is enabled
    ///
    /// Playback restarts from the top on the next tick.
    pub fn set_automation(&mut self, automation: MixingAutomation) {
        self.running = automation.enabled && !automation.keyframes.is_empty();
        self.automation = Some(automation);
        self.origin = None;
        self.last_tick = None;
    }

    /// Pause or resume evaluation, keeping the keyframes
    pub fn set_enabled(&mut self, enabled: bool) {
        if let Some(automation) = &mut self.automation {
            automation.enabled = enabled;
            self.running = enabled && !automation.keyframes.is_empty();
            if !enabled {
                self.origin = None;
                self.last_tick = None;
            }
        }
    }

    /// Discard keyframes and stop
    pub fn clear(&mut self) {
        self.automation = None;
        self.running = false;
        self.origin = None;
        self.last_tick = None;
        self.last_value = None;
    }

    pub fn automation(&self) -> Option<&MixingAutomation> {
        self.automation.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Most recent value emitted by `tick`
    pub fn last_value(&self) -> Option<f32> {
        self.last_value
    }

    /// Value of the installed automation at absolute time `now`
    pub fn evaluate(&self, now: f64) -> Option<f32> {
        self.automation.as_ref().and_then(|a| a.evaluate(now))
    }

    /// Advance to `now`; returns a value when one is due
    pub fn tick(&mut self, now: f64) -> Option<f32> {
        if !self.running {
            return None;
        }
        let interval = 1.0 / self.resolution_hz;
        if let Some(last) = self.last_tick {
            if now - last < interval * (1.0 - TICK_JITTER) {
                return None;
            }
        }
        let origin = *self.origin.get_or_insert(now);
        self.last_tick = Some(now);

        let value = self.evaluate(now - origin)?;
        self.last_value = Some(value);
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{CurveKind, MixingKeyframe};

    fn triangle() -> MixingAutomation {
        MixingAutomation::new(
            CurveKind::Linear,
            2.0,
            vec![
                MixingKeyframe::new(0.0, 0.0),
                MixingKeyframe::new(0.5, 1.0),
                MixingKeyframe::new(1.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_triangle_midpoints() {
        let mut engine = AutomationEngine::new(60.0);
        engine.set_automation(triangle());
        assert!((engine.evaluate(0.5).unwrap() - 0.5).abs() < 1e-5);
        assert!((engine.evaluate(1.5).unwrap() - 0.5).abs() < 1e-5);
        assert!((engine.evaluate(1.0).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_tick_respects_resolution() {
        let mut engine = AutomationEngine::new(10.0);
        engine.set_automation(triangle());

        assert_eq!(engine.tick(100.0), Some(0.0));
        // Too soon
        assert_eq!(engine.tick(100.02), None);
        let v = engine.tick(100.5).unwrap();
        assert!((v - 0.5).abs() < 1e-5);
        assert_eq!(engine.last_value(), Some(v));
    }

    #[test]
    fn test_disable_keeps_keyframes() {
        let mut engine = AutomationEngine::new(60.0);
        engine.set_automation(triangle());
        engine.set_enabled(false);

        assert!(!engine.is_running());
        assert_eq!(engine.tick(1.0), None);
        assert_eq!(engine.automation().map(|a| a.keyframes.len()), Some(3));

        engine.set_enabled(true);
        assert!(engine.is_running());
        assert!(engine.tick(2.0).is_some());
    }

    #[test]
    fn test_clear_discards_keyframes() {
        let mut engine = AutomationEngine::new(60.0);
        engine.set_automation(triangle());
        engine.clear();
        assert!(engine.automation().is_none());
        assert_eq!(engine.evaluate(0.5), None);
        assert_eq!(engine.tick(0.5), None);
    }

    #[test]
    fn test_disabled_automation_does_not_start() {
        let mut engine = AutomationEngine::new(60.0);
        let mut automation = triangle();
        automation.enabled = false;
        engine.set_automation(automation);
        assert!(!engine.is_running());
    }
}
