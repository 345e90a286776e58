//! Recording live matrix gains into automation
//!
//! While recording, every cell's live gain is sampled at the automation
//! resolution. On stop, each cell's stream is thinned by change detection
//! and the survivors become that cell's keyframes.

use crate::automation::{CurveKind, MixingAutomation, MixingKeyframe};

pub struct MatrixRecorder {
    started_at: f64,
    interval: f64,
    last_sample: Option<f64>,
    /// Per cell (row-major): (engine time, gain)
    samples: Vec<Vec<(f64, f32)>>,
}

impl MatrixRecorder {
    pub fn new(cell_count: usize, started_at: f64, resolution_hz: f64) -> Self {
        Self {
            started_at,
            interval: 1.0 / resolution_hz.max(1.0),
            last_sample: None,
            samples: vec![Vec::new(); cell_count],
        }
    }

    /// Whether a new sample frame is due at `now`
    pub fn is_due(&self, now: f64) -> bool {
        match self.last_sample {
            None => true,
            Some(last) => now - last >= self.interval * 0.75,
        }
    }

    /// Record one frame of live gains, one per cell
    pub fn push_frame(&mut self, now: f64, gains: impl Iterator<Item = f32>) {
        for (cell, gain) in self.samples.iter_mut().zip(gains) {
            cell.push((now, gain));
        }
        self.last_sample = Some(now);
    }

    pub fn frames_recorded(&self) -> usize {
        self.samples.first().map(|s| s.len()).unwrap_or(0)
    }

    /// Convert the recording into per-cell automations
    ///
    /// Cells whose gain never moved by more than `threshold` get `None`.
    pub fn finish(self, stopped_at: f64, threshold: f32) -> Vec<Option<MixingAutomation>> {
        let duration = stopped_at - self.started_at;
        self.samples
            .iter()
            .map(|stream| {
                if duration <= 0.0 {
                    return None;
                }
                let keyframes = thin_to_keyframes(stream, self.started_at, duration, threshold);
                (keyframes.len() >= 2)
                    .then(|| MixingAutomation::new(CurveKind::Linear, duration, keyframes))
            })
            .collect()
    }
}

/// Keep the first sample and every sample that moved more than `threshold`
/// away from the last kept one
pub fn thin_to_keyframes(
    stream: &[(f64, f32)],
    started_at: f64,
    duration: f64,
    threshold: f32,
) -> Vec<MixingKeyframe> {
    let mut keyframes: Vec<MixingKeyframe> = Vec::new();
    let mut last_kept: Option<f32> = None;
    for &(time, value) in stream {
        let keep = match last_kept {
            None => true,
            Some(prev) => (value - prev).abs() > threshold,
        };
        if keep {
            let t = ((time - started_at) / duration) as f32;
            keyframes.push(MixingKeyframe::new(t, value));
            last_kept = Some(value);
        }
    }
    keyframes
}
