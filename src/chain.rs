//! Bidirectional playback history.
//!
//! The chain knows nothing about graphs or scoring: it is the navigation
//! record the orchestrator consults before asking the selector for a fresh
//! pick. `current == 0` means nothing is playing. The learning-freeze flag
//! is raised on back/forward navigation so replayed history does not count
//! as fresh feedback.
//!
//! Not thread-safe on its own; the orchestrator serializes access under its
//! state lock. Serializable so the session can survive restarts.

use serde::{Deserialize, Serialize};

use crate::base_graph::TrackId;

/// Back stack, current track, forward stack, and the learning-freeze flag.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackChain {
    /// Past tracks, oldest first. Never contains `0`.
    pub back_stack: Vec<TrackId>,
    /// Currently playing track; `0` means none.
    pub current: TrackId,
    /// Tracks re-enterable after going back; top of stack is the most
    /// recently left.
    pub forward_stack: Vec<TrackId>,
    /// While set, feedback is ignored.
    pub learning_frozen: bool,
}

impl PlaybackChain {
    /// An empty chain with nothing playing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to `id`: the current track (if any) is pushed into history
    /// and the forward stack is discarded.
    pub fn next(&mut self, id: TrackId) -> TrackId {
        if self.current != 0 {
            self.back_stack.push(self.current);
        }
        self.current = id;
        self.forward_stack.clear();
        self.current
    }

    /// Steps back into history. `None` when there is no history or nothing
    /// is playing; the state is left untouched in that case.
    pub fn back(&mut self) -> Option<TrackId> {
        if self.back_stack.is_empty() || self.current == 0 {
            return None;
        }
        self.forward_stack.push(self.current);
        self.current = self.back_stack.pop()?;
        Some(self.current)
    }

    /// Re-enters the most recently left track, if any.
    pub fn forward(&mut self) -> Option<TrackId> {
        let id = self.forward_stack.pop()?;
        if self.current != 0 {
            self.back_stack.push(self.current);
        }
        self.current = id;
        Some(self.current)
    }

    /// Stops counting feedback. Idempotent.
    pub fn freeze_learning(&mut self) {
        self.learning_frozen = true;
    }

    /// Resumes counting feedback. Idempotent.
    pub fn unfreeze_learning(&mut self) {
        self.learning_frozen = false;
    }
}
