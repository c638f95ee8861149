//! Persistent transition memory.
//!
//! The base graph is the long-lived record of track-to-track transitions.
//! It is pure data: integer-stepped weights, no probabilities, no playback
//! logic. The orchestrator reinforces and penalizes edges here, the catalog
//! serializes the whole map, and the runtime graph snapshots it at build
//! time.
//!
//! Row `0` is the global popularity row: every reinforcement also bumps
//! `edges[0][to]`, which gives the selector something to sample from when
//! no track is currently playing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Identifier of a track. `0` is reserved: it means "no current track" and
/// doubles as the global-root row key in the graph.
pub type TrackId = i64;

/// Nested `from → (to → weight)` mapping shared by the graph layers and the
/// catalog.
pub type EdgeMap = HashMap<TrackId, HashMap<TrackId, f64>>;

/// Long-term weighted transition memory.
///
/// Thread-safe: a single read/write lock guards the nested map. Every
/// collection handed out is an independent copy, so callers can mutate
/// results freely without touching internal state.
#[derive(Debug, Default)]
pub struct BaseGraph {
    edges: RwLock<EdgeMap>,
}

impl BaseGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            edges: RwLock::new(EdgeMap::new()),
        }
    }

    /// Records one observed transition `from → to`.
    ///
    /// Increments both `edges[from][to]` and the global row `edges[0][to]`
    /// by 1, creating rows as needed.
    pub fn reinforce(&self, from: TrackId, to: TrackId) {
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        *edges.entry(from).or_default().entry(to).or_insert(0.0) += 1.0;
        *edges.entry(0).or_default().entry(to).or_insert(0.0) += 1.0;
    }

    /// Weakens the transition `from → to` by 1, floored at zero.
    ///
    /// The global row is decremented symmetrically. A no-op when `from` has
    /// no outgoing edges at all.
    pub fn penalty(&self, from: TrackId, to: TrackId) {
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        if !edges.contains_key(&from) {
            return;
        }
        if let Some(row) = edges.get_mut(&from) {
            if let Some(weight) = row.get_mut(&to) {
                if *weight > 0.0 {
                    *weight -= 1.0;
                }
            }
        }
        if let Some(global) = edges.get_mut(&0) {
            if let Some(weight) = global.get_mut(&to) {
                if *weight > 0.0 {
                    *weight -= 1.0;
                }
            }
        }
    }

    /// Returns a copy of the outgoing edges of `id`, empty if there are none.
    #[must_use]
    pub fn get_edges_for_id(&self, id: TrackId) -> HashMap<TrackId, f64> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        edges.get(&id).cloned().unwrap_or_default()
    }

    /// Returns a deep copy of the whole nested mapping.
    #[must_use]
    pub fn get_edges(&self) -> EdgeMap {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        edges.clone()
    }

    /// Atomically replaces the graph contents with a deep copy of `edges`.
    /// `None` clears the graph.
    pub fn set_edges(&self, edges: Option<EdgeMap>) {
        let mut guard = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        *guard = edges.unwrap_or_default();
    }

    /// Every `from` key currently present, in arbitrary order.
    #[must_use]
    pub fn get_all_ids(&self) -> Vec<TrackId> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        edges.keys().copied().collect()
    }
}
