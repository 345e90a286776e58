//! Mix recommendations
//!
//! The matrix exposes its statistics; an advisor turns them into ranked
//! suggestions with concrete gain changes. Advisors are swappable behind
//! [`MixAdvisor`]; the built-in one is a deterministic heuristic.

use super::cell::{MixingMatrixCell, MAX_CELL_GAIN};
use crate::types::StemKind;
use serde::{Deserialize, Serialize};

/// Aggregate view of the matrix used by advisors and the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStatistics {
    pub size: usize,
    pub enabled_cells: usize,
    pub automated_cells: usize,
    /// Mean effective gain over all N×N cells
    pub average_gain: f32,
    /// `max(0, 1 - variance)` of the effective gains
    pub balance: f32,
    /// Total effective gain arriving at each target stem
    pub target_levels: Vec<f32>,
}

impl MatrixStatistics {
    pub fn from_cells(size: usize, cells: &[MixingMatrixCell]) -> Self {
        let gains: Vec<f32> = cells.iter().map(|c| c.effective_gain()).collect();
        let n = gains.len().max(1) as f32;
        let average_gain = gains.iter().sum::<f32>() / n;
        let variance = gains
            .iter()
            .map(|g| (g - average_gain) * (g - average_gain))
            .sum::<f32>()
            / n;

        let mut target_levels = vec![0.0; size];
        for cell in cells {
            if let Some(level) = target_levels.get_mut(cell.target) {
                *level += cell.effective_gain();
            }
        }

        Self {
            size,
            enabled_cells: cells.iter().filter(|c| c.enabled).count(),
            automated_cells: cells.iter().filter(|c| c.automation.is_some()).count(),
            average_gain,
            balance: (1.0 - variance).max(0.0),
            target_levels,
        }
    }
}

/// A concrete gain change an advisor proposes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainAdjustment {
    pub source: usize,
    pub target: usize,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub message: String,
    /// Higher first
    pub priority: f32,
    pub adjustments: Vec<GainAdjustment>,
}

/// Produces recommendations from matrix state
pub trait MixAdvisor: Send {
    fn recommend(&self, stats: &MatrixStatistics, cells: &[MixingMatrixCell]) -> Vec<Recommendation>;
}

/// Rule-based advisor over the matrix's own statistics
#[derive(Debug, Clone)]
pub struct HeuristicAdvisor {
    /// Target level below which a stem counts as under-leveled
    pub min_target_level: f32,
    /// Average gain above which the whole mix is considered hot
    pub hot_average: f32,
    /// Fewer enabled cells than this suggests adding a cross route
    pub min_enabled_cells: usize,
    /// Gain used for a suggested cross-stem route
    pub cross_route_gain: f32,
}

impl Default for HeuristicAdvisor {
    fn default() -> Self {
        Self {
            min_target_level: 0.5,
            hot_average: 0.6,
            min_enabled_cells: 5,
            cross_route_gain: 0.2,
        }
    }
}

fn stem_label(index: usize) -> String {
    StemKind::from_index(index)
        .map(|k| k.name().to_string())
        .unwrap_or_else(|| format!("Stem {}", index + 1))
}

impl MixAdvisor for HeuristicAdvisor {
    fn recommend(&self, stats: &MatrixStatistics, cells: &[MixingMatrixCell]) -> Vec<Recommendation> {
        let mut out = Vec::new();
        let find = |s: usize, t: usize| cells.iter().find(|c| c.source == s && c.target == t);

        // Under-leveled stems: raise the diagonal so the bus reaches the minimum
        for (target, &level) in stats.target_levels.iter().enumerate() {
            if level >= self.min_target_level {
                continue;
            }
            let current = find(target, target).map(|c| c.effective_gain()).unwrap_or(0.0);
            let gain = (current + self.min_target_level - level).min(MAX_CELL_GAIN);
            out.push(Recommendation {
                message: format!("Boost {}: its bus is at {:.0}%", stem_label(target), level * 100.0),
                priority: 1.0 + (self.min_target_level - level),
                adjustments: vec![GainAdjustment { source: target, target, gain }],
            });
        }

        // Sparse routing: suggest the first disabled cross route
        if stats.enabled_cells < self.min_enabled_cells {
            let candidate = cells.iter().find(|c| !c.is_diagonal() && !c.enabled);
            if let Some(cell) = candidate {
                out.push(Recommendation {
                    message: format!(
                        "Add a light {} -> {} send for glue",
                        stem_label(cell.source),
                        stem_label(cell.target)
                    ),
                    priority: 0.5,
                    adjustments: vec![GainAdjustment {
                        source: cell.source,
                        target: cell.target,
                        gain: self.cross_route_gain,
                    }],
                });
            }
        }

        // Hot mix: scale every enabled cell back toward unity sum
        if stats.average_gain > self.hot_average {
            let scale = self.hot_average / stats.average_gain;
            out.push(Recommendation {
                message: format!("Mix is running hot (average gain {:.2})", stats.average_gain),
                priority: 0.8 + (stats.average_gain - self.hot_average),
                adjustments: cells
                    .iter()
                    .filter(|c| c.enabled)
                    .map(|c| GainAdjustment {
                        source: c.source,
                        target: c.target,
                        gain: c.gain * scale,
                    })
                    .collect(),
            });
        }

        if stats.balance < 0.5 {
            out.push(Recommendation {
                message: format!("Gains are unbalanced (balance {:.2})", stats.balance),
                priority: 0.3,
                adjustments: Vec::new(),
            });
        }

        out.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixPreset;

    fn identity_cells() -> Vec<MixingMatrixCell> {
        MatrixPreset::identity(4).cells
    }

    #[test]
    fn test_identity_statistics() {
        let stats = MatrixStatistics::from_cells(4, &identity_cells());
        assert_eq!(stats.enabled_cells, 4);
        assert!((stats.average_gain - 0.25).abs() < 1e-6);
        // Four ones and twelve zeros: variance 0.1875
        assert!((stats.balance - 0.8125).abs() < 1e-5);
        assert!(stats.target_levels.iter().all(|l| (l - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_balance_floors_at_zero() {
        let mut cells = identity_cells();
        for c in cells.iter_mut().filter(|c| c.is_diagonal()) {
            c.gain = 2.0;
        }
        cells[1].enabled = true;
        cells[1].gain = 0.0;
        let stats = MatrixStatistics::from_cells(4, &cells);
        assert!(stats.balance >= 0.0);
    }

    #[test]
    fn test_boosts_quiet_stem() {
        let mut cells = identity_cells();
        let bass = StemKind::Bass.index();
        let idx = bass * 4 + bass;
        cells[idx].gain = 0.1;

        let stats = MatrixStatistics::from_cells(4, &cells);
        let recs = HeuristicAdvisor::default().recommend(&stats, &cells);

        let boost = &recs[0];
        assert!(boost.message.contains("Bass"));
        assert_eq!(boost.adjustments[0].source, bass);
        assert!((boost.adjustments[0].gain - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_sparse_matrix_suggests_cross_route() {
        let cells = identity_cells();
        let stats = MatrixStatistics::from_cells(4, &cells);
        let recs = HeuristicAdvisor::default().recommend(&stats, &cells);
        let route = recs
            .iter()
            .find(|r| r.message.contains("send"))
            .expect("cross route suggestion");
        let adj = route.adjustments[0];
        assert_ne!(adj.source, adj.target);
        assert!((adj.gain - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_ranked_by_priority() {
        let mut cells = identity_cells();
        cells[0].gain = 0.0;
        let stats = MatrixStatistics::from_cells(4, &cells);
        let recs = HeuristicAdvisor::default().recommend(&stats, &cells);
        assert!(recs.windows(2).all(|w| w[0].priority >= w[1].priority));
    }
}
