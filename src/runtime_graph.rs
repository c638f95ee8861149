//! In-memory probability engine derived from the base graph.
//!
//! The runtime graph snapshots base weights at build time and layers
//! volatile state on top: short-lived cooldowns (time-decayed), pending
//! penalties, and pending bonuses. Distributions handed to the selector are
//! computed from the *fined* weight of each edge:
//!
//! ```text
//! fined[to] = max(0, weight - cooldown_score - penalty)
//! ```
//!
//! where the cooldown score is the stored value (clamped into `(0, 1]`)
//! decayed by `exp(-Δt/τ)` with τ = 180 seconds.
//!
//! Pending penalties and bonuses are *not* applied to the base graph here;
//! the orchestrator folds them in when it rebuilds, which is what makes the
//! volatile/persistent split cheap to mutate on every feedback event.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::base_graph::{BaseGraph, EdgeMap, TrackId};

/// Time constant of the exponential cooldown decay, in seconds.
const COOLDOWN_DECAY_TAU_SECS: f64 = 180.0;

/// A cooldown as stored: the subtractive value and when it was recorded.
#[derive(Debug, Clone, Copy)]
struct CooldownEntry {
    value: f64,
    started_at: Instant,
}

#[derive(Debug)]
struct RuntimeState {
    edges: EdgeMap,
    cooldowns: HashMap<TrackId, HashMap<TrackId, CooldownEntry>>,
    penalties: EdgeMap,
    bonuses: EdgeMap,
    build_version: i64,
    build_reason: String,
    built_at: Instant,
    diff_count: f64,
}

/// Working transition graph: base-weight snapshot plus volatile modifiers.
///
/// Thread-safe behind a single read/write lock; every map handed out is an
/// independent copy.
#[derive(Debug)]
pub struct RuntimeGraph {
    state: RwLock<RuntimeState>,
}

impl Default for RuntimeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeGraph {
    /// Creates an empty runtime graph at build version 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RuntimeState {
                edges: EdgeMap::new(),
                cooldowns: HashMap::new(),
                penalties: EdgeMap::new(),
                bonuses: EdgeMap::new(),
                build_version: 0,
                build_reason: String::new(),
                built_at: Instant::now(),
                diff_count: 0.0,
            }),
        }
    }

    /// Rebuilds the weight snapshot from `base`.
    ///
    /// Deep-copies the base edges, resets the diff counter, stamps the build
    /// time, and records `version` and `reason`. Cooldowns, penalties and
    /// bonuses survive a local rebuild; the orchestrator-level rebuild
    /// replaces the whole graph instead, which is what drops them.
    pub fn rebuild_from_base(&self, base: &BaseGraph, version: i64, reason: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.edges = base.get_edges();
        state.build_version = version;
        state.build_reason = reason.to_string();
        state.built_at = Instant::now();
        state.diff_count = 0.0;
        log::debug!(
            "runtime graph rebuilt: version={version} reason={reason:?} rows={}",
            state.edges.len()
        );
    }

    /// Normalized next-track distribution for `from`.
    ///
    /// Empty when `from` has no outgoing edges or every fined weight is
    /// zero; otherwise the probabilities sum to 1.
    #[must_use]
    pub fn get_edges(&self, from: TrackId) -> HashMap<TrackId, f64> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(row) = state.edges.get(&from) else {
            return HashMap::new();
        };

        let cooldowns = state.cooldowns.get(&from);
        let penalties = state.penalties.get(&from);
        if cooldowns.map_or(true, HashMap::is_empty) && penalties.map_or(true, HashMap::is_empty) {
            return normalize(row.clone());
        }

        let mut fined = HashMap::with_capacity(row.len());
        for (&to, &weight) in row {
            let cooldown = cooldowns
                .and_then(|c| c.get(&to))
                .map_or(0.0, |entry| {
                    decayed_cooldown(entry.value, entry.started_at.elapsed().as_secs_f64())
                });
            let penalty = penalties.and_then(|p| p.get(&to)).copied().unwrap_or(0.0);
            fined.insert(to, (weight - cooldown - penalty).max(0.0));
        }
        normalize(fined)
    }

    /// Strengthens the edge `from → to` by `amount` and records it in the
    /// bonus ledger for the next rebuild. The global row is kept in sync
    /// with the base graph's convention.
    pub fn reinforce(&self, from: TrackId, to: TrackId, amount: f64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state.edges.entry(from).or_default().entry(to).or_insert(0.0) += amount;
        *state.edges.entry(0).or_default().entry(to).or_insert(0.0) += amount;
        *state.bonuses.entry(from).or_default().entry(to).or_insert(0.0) += amount;
        state.diff_count += 1.0;
    }

    /// Accumulates a pending penalty of `amount` on `from → to`.
    pub fn penalty(&self, from: TrackId, to: TrackId, amount: f64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state
            .penalties
            .entry(from)
            .or_default()
            .entry(to)
            .or_insert(0.0) += amount;
        state.diff_count += 1.0;
    }

    /// Places a cooldown on `from → to`. Values outside `(0, 1]` clamp to
    /// 1.0; the decay clock starts now.
    pub fn add_cooldown(&self, from: TrackId, to: TrackId, value: f64) {
        let value = if value <= 0.0 || value > 1.0 { 1.0 } else { value };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.cooldowns.entry(from).or_default().insert(
            to,
            CooldownEntry {
                value,
                started_at: Instant::now(),
            },
        );
        state.diff_count += 1.0;
    }

    /// Copy of the pending-penalty ledger (for rebuild folding).
    #[must_use]
    pub fn pending_penalties(&self) -> EdgeMap {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.penalties.clone()
    }

    /// Copy of the pending-bonus ledger (for rebuild folding).
    #[must_use]
    pub fn pending_bonuses(&self) -> EdgeMap {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.bonuses.clone()
    }

    /// Raw stored cooldown values, without decay applied.
    #[must_use]
    pub fn cooldowns(&self) -> EdgeMap {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .cooldowns
            .iter()
            .map(|(&from, row)| {
                (
                    from,
                    row.iter().map(|(&to, entry)| (to, entry.value)).collect(),
                )
            })
            .collect()
    }

    /// Volatile mutations since the last build.
    #[must_use]
    pub fn diff_count(&self) -> f64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.diff_count
    }

    /// Monotonic build counter; the initial build is version 0.
    #[must_use]
    pub fn build_version(&self) -> i64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.build_version
    }

    /// Reason string recorded at the last build.
    #[must_use]
    pub fn build_reason(&self) -> String {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.build_reason.clone()
    }

    /// Time elapsed since the last build.
    #[must_use]
    pub fn age(&self) -> Duration {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.built_at.elapsed()
    }
}

/// Cooldown score after `elapsed_secs` seconds: the stored value decayed by
/// `exp(-Δt/τ)`.
fn decayed_cooldown(value: f64, elapsed_secs: f64) -> f64 {
    value * (-elapsed_secs / COOLDOWN_DECAY_TAU_SECS).exp()
}

/// Scales `weights` into probabilities. Empty when the total mass is zero.
fn normalize(weights: HashMap<TrackId, f64>) -> HashMap<TrackId, f64> {
    let sum: f64 = weights.values().sum();
    if sum <= 0.0 {
        return HashMap::new();
    }
    weights.into_iter().map(|(id, w)| (id, w / sum)).collect()
}
