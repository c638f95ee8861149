//! Concentration-aware next-track sampling.
//!
//! The selector reads a probability distribution from the runtime graph and
//! adapts its policy to how concentrated that distribution is, measured by
//! the Gini-style index `G = 1 - Σ p²`:
//!
//! - `G ≤ gini_low`: the distribution already has a clear favorite; sample
//!   weighted as-is (exploitation).
//! - `gini_low < G < gini_high`: sharpen the distribution with an exponent
//!   `α = 1.1 + (1 - ratio)·0.7` and sample weighted from the result.
//! - `G ≥ gini_high`: the distribution is flat; sample uniformly from the
//!   top-K sharpened entries so rare edges still get airtime without the
//!   pick degenerating into pure noise.
//!
//! The selector is stateless: it never mutates the runtime graph and holds
//! nothing between calls.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use crate::base_graph::TrackId;
use crate::runtime_graph::RuntimeGraph;

const DEFAULT_GINI_LOW: f64 = 0.35;
const DEFAULT_GINI_HIGH: f64 = 0.6;
const DEFAULT_TOP_K: i64 = 10;

/// Distribution-aware sampler over runtime-graph probabilities.
#[derive(Debug, Clone)]
pub struct Selector {
    gini_low: f64,
    gini_high: f64,
    #[allow(dead_code)] // Kept configurable alongside the gini band.
    top_k: i64,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector {
    /// Selector with the default policy band.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gini_low: DEFAULT_GINI_LOW,
            gini_high: DEFAULT_GINI_HIGH,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Selector with explicit parameters. Invalid values fall back to the
    /// defaults: the band bounds must sit in `(0, 1)` with
    /// `gini_low < gini_high`, and `top_k` must be positive.
    #[must_use]
    pub fn with_parameters(gini_high: f64, gini_low: f64, top_k: i64) -> Self {
        let top_k = if top_k <= 0 { DEFAULT_TOP_K } else { top_k };
        let mut gini_low = if gini_low <= 0.0 || gini_low >= 1.0 {
            DEFAULT_GINI_LOW
        } else {
            gini_low
        };
        let mut gini_high = if gini_high <= 0.0 || gini_high >= 1.0 {
            DEFAULT_GINI_HIGH
        } else {
            gini_high
        };
        if gini_high <= gini_low {
            gini_high = DEFAULT_GINI_HIGH;
            gini_low = DEFAULT_GINI_LOW;
        }

        Self {
            gini_low,
            gini_high,
            top_k,
        }
    }

    /// Picks the next track from `from`'s distribution, or `None` when the
    /// distribution is empty.
    #[must_use]
    pub fn next(&self, from: TrackId, runtime: &RuntimeGraph) -> Option<TrackId> {
        let probs = runtime.get_edges(from);
        if probs.is_empty() {
            return None;
        }

        let gini = compute_gini(&probs);
        if gini <= self.gini_low {
            return select_weighted(&probs);
        }

        let ratio = ((gini - self.gini_low) / (self.gini_high - self.gini_low)).clamp(0.0, 1.0);
        let alpha = 1.1 + (1.0 - ratio) * 0.7;

        let mut sharpened: HashMap<TrackId, f64> = probs
            .iter()
            .map(|(&id, &p)| (id, p.powf(alpha)))
            .collect();
        let sum: f64 = sharpened.values().sum();
        for value in sharpened.values_mut() {
            *value /= sum;
        }

        if gini >= self.gini_high {
            let k = compute_top_k(probs.len(), ratio);
            return select_top_k(&sharpened, k);
        }

        select_weighted(&sharpened)
    }
}

/// Concentration index `1 - Σ p²`: 0 for a single certain outcome, close to
/// 1 for a flat distribution over many outcomes.
#[must_use]
pub fn compute_gini(probs: &HashMap<TrackId, f64>) -> f64 {
    let sum_squares: f64 = probs.values().map(|p| p * p).sum();
    1.0 - sum_squares
}

/// Size of the uniform pool used in the flat-distribution regime.
///
/// Scales between `K_min = max(3, ⌈0.05·N⌉)` and
/// `K_max = max(K_min + 1, ⌈0.30·N⌉)` with the band ratio; ratios outside
/// `[0, 1]` clamp to the bounds.
#[must_use]
pub fn compute_top_k(n: usize, ratio: f64) -> usize {
    let n = n as f64;
    let k_min = 3.0f64.max((n * 0.05).ceil());
    let k_max = (k_min + 1.0).max((n * 0.3).ceil());
    // NaN would sail through f64::clamp; treat it as the conservative end.
    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    let k = (k_min + ratio * (k_max - k_min)).round();
    k.clamp(k_min, k_max) as usize
}

/// Cumulative weighted draw in map iteration order. On degenerate input
/// (all-zero probabilities) the last iterated id wins, matching the
/// contract that a non-empty distribution always yields a pick.
fn select_weighted(probs: &HashMap<TrackId, f64>) -> Option<TrackId> {
    let f = thread_rng().gen::<f64>();
    let mut cumulative = 0.0;
    let mut last = None;
    for (&id, &p) in probs {
        cumulative += p;
        last = Some(id);
        if f < cumulative {
            return Some(id);
        }
    }
    last
}

/// Uniform draw among the `k` largest entries by probability.
fn select_top_k(probs: &HashMap<TrackId, f64>, k: usize) -> Option<TrackId> {
    let mut items: Vec<(TrackId, f64)> = probs.iter().map(|(&id, &p)| (id, p)).collect();
    items.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(k.min(items.len()));
    items.choose(&mut thread_rng()).map(|&(id, _)| id)
}
