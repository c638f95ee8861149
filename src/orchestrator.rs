//! Coordination of the graph memory, selector and playback chain.
//!
//! The orchestrator owns one album's worth of engine state and is the only
//! component that mutates it. It exposes the narrow control surface the
//! facade consumes — advance, back, feedback — and runs two background
//! watchers that decide when the runtime graph should be rebuilt:
//!
//! - the **age watcher** ticks every 60 seconds and rebuilds once the
//!   runtime graph is older than [`OrchestratorConfig::max_runtime_graph_age`];
//! - the **diff watcher** wakes on feedback signals and rebuilds once the
//!   accumulated volatile mutations exceed
//!   [`OrchestratorConfig::max_runtime_graph_diff`].
//!
//! A rebuild folds the runtime graph's pending penalties and bonuses into
//! the base graph, notifies the embedder (so it can persist the base
//! graph), and atomically publishes a fresh runtime graph. Watcher
//! generations are tied to a lifecycle token that is replaced on every
//! rebuild and cancelled on shutdown.
//!
//! After [`Orchestrator::shutdown`] every public operation returns its
//! neutral value and no further state mutation occurs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, info};

use crate::base_graph::{BaseGraph, TrackId};
use crate::chain::PlaybackChain;
use crate::runtime_graph::RuntimeGraph;
use crate::selector::Selector;

/// Capacity of the diff and rebuild signal channels.
const SIGNAL_CAPACITY: usize = 5;
/// How often the age watcher inspects the runtime graph.
const AGE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

const REBUILD_REASON_INITIAL: &str = "initial build";
const REBUILD_REASON_AGE: &str = "time to live is up";
const REBUILD_REASON_DIFF: &str = "diff limit exceeded";

/// Rebuild thresholds for the background watchers.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum runtime-graph age before the age watcher rebuilds.
    pub max_runtime_graph_age: Duration,
    /// Maximum accumulated volatile mutations before the diff watcher
    /// rebuilds.
    pub max_runtime_graph_diff: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_runtime_graph_age: Duration::from_secs(60 * 60),
            max_runtime_graph_diff: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    ShutDown,
}

struct OrchState {
    chain: PlaybackChain,
    phase: Phase,
}

/// One generation of background workers. Cancellation is the dropped
/// sender: workers observe the disconnect in their select and exit.
struct Lifecycle {
    cancel_tx: Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    fn cancel_and_join(self) {
        drop(self.cancel_tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

struct Shared {
    base: Arc<BaseGraph>,
    runtime: RwLock<Arc<RuntimeGraph>>,
    selector: Selector,
    config: OrchestratorConfig,
    state: RwLock<OrchState>,
    build_version: AtomicI64,
    diff_tx: Sender<()>,
    diff_rx: Receiver<()>,
    rebuild_tx: Mutex<Option<Sender<()>>>,
    rebuild_rx: Receiver<()>,
    lifecycle: Mutex<Option<Lifecycle>>,
    rebuild_flight: Mutex<()>,
}

impl Shared {
    /// Snapshot of the currently published runtime graph. The slot is the
    /// linearization point for rebuilds: readers see either the old or the
    /// new graph, never torn state.
    fn load_runtime(&self) -> Arc<RuntimeGraph> {
        Arc::clone(&self.runtime.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The rebuild protocol. Single-flight; holds the orchestrator state
    /// lock for the duration, so public operations observe either the state
    /// before the rebuild or after it.
    fn rebuild(self: &Arc<Self>, reason: &str) {
        let _flight = self
            .rebuild_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.phase == Phase::ShutDown {
            return;
        }

        // Fold the volatile ledgers into persistent memory.
        let current = self.load_runtime();
        let mut folded = false;
        for (from, row) in current.pending_penalties() {
            for (to, amount) in row {
                let units = amount.round() as i64;
                for _ in 0..units {
                    self.base.penalty(from, to);
                }
                folded |= units > 0;
            }
        }
        for (from, row) in current.pending_bonuses() {
            for (to, amount) in row {
                let units = amount.round() as i64;
                for _ in 0..units {
                    self.base.reinforce(from, to);
                }
                folded |= units > 0;
            }
        }

        // Let the embedder know the base graph is worth persisting.
        if folded {
            let tx = self.rebuild_tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = tx.as_ref() {
                let _ = tx.try_send(());
            }
        }

        // Retire the current watcher generation. Watchers never take the
        // state lock, so joining them here cannot deadlock.
        if let Some(lifecycle) = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            lifecycle.cancel_and_join();
        }

        // Publish the fresh graph and start the next generation.
        let version = self.build_version.fetch_add(1, Ordering::SeqCst) + 1;
        let fresh = RuntimeGraph::new();
        fresh.rebuild_from_base(&self.base, version, reason);
        *self.runtime.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);

        *self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(spawn_workers(self));

        info!("runtime graph rebuilt: version={version} reason={reason:?} folded={folded}");
        drop(state);
    }
}

/// Long-lived coordinator for one album.
pub struct Orchestrator {
    inner: Arc<Shared>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Orchestrator over fresh components with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default(), None, None, None, None)
    }

    /// Orchestrator over the given components with default thresholds.
    /// `None` arguments are replaced by fresh defaults.
    #[must_use]
    pub fn with_components(
        base: Option<Arc<BaseGraph>>,
        runtime: Option<RuntimeGraph>,
        selector: Option<Selector>,
        chain: Option<PlaybackChain>,
    ) -> Self {
        Self::with_config(OrchestratorConfig::default(), base, runtime, selector, chain)
    }

    /// Fully parameterized constructor. Spawns the background watchers and
    /// starts in the running state.
    #[must_use]
    pub fn with_config(
        config: OrchestratorConfig,
        base: Option<Arc<BaseGraph>>,
        runtime: Option<RuntimeGraph>,
        selector: Option<Selector>,
        chain: Option<PlaybackChain>,
    ) -> Self {
        let base = base.unwrap_or_else(|| Arc::new(BaseGraph::new()));
        let runtime = runtime.unwrap_or_else(|| {
            let fresh = RuntimeGraph::new();
            fresh.rebuild_from_base(&base, 0, REBUILD_REASON_INITIAL);
            fresh
        });
        let selector = selector.unwrap_or_default();
        let chain = chain.unwrap_or_default();

        let (diff_tx, diff_rx) = bounded(SIGNAL_CAPACITY);
        let (rebuild_tx, rebuild_rx) = bounded(SIGNAL_CAPACITY);

        let inner = Arc::new(Shared {
            build_version: AtomicI64::new(runtime.build_version()),
            runtime: RwLock::new(Arc::new(runtime)),
            base,
            selector,
            config,
            state: RwLock::new(OrchState {
                chain,
                phase: Phase::Running,
            }),
            diff_tx,
            diff_rx,
            rebuild_tx: Mutex::new(Some(rebuild_tx)),
            rebuild_rx,
            lifecycle: Mutex::new(None),
            rebuild_flight: Mutex::new(()),
        });

        *inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(spawn_workers(&inner));

        debug!("orchestrator started");
        Self { inner }
    }

    /// Advances playback. The forward stack wins when non-empty (and
    /// freezes learning, since that is replayed history); otherwise the
    /// selector picks from the current track's distribution. `None` when
    /// shut down or no candidate exists.
    pub fn play_next(&self) -> Option<TrackId> {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if state.phase == Phase::ShutDown {
            return None;
        }

        if let Some(id) = state.chain.forward() {
            state.chain.freeze_learning();
            debug!("advance served from forward stack: {id}");
            return Some(id);
        }

        let from = state.chain.current;
        let runtime = self.inner.load_runtime();
        let to = self.inner.selector.next(from, &runtime)?;
        state.chain.next(to);
        debug!("advance generated: {from} -> {to}");
        Some(to)
    }

    /// Steps back into history and freezes learning. `None` when shut down
    /// or there is nothing to go back to.
    pub fn play_back(&self) -> Option<TrackId> {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if state.phase == Phase::ShutDown {
            return None;
        }

        let id = state.chain.back()?;
        state.chain.freeze_learning();
        debug!("stepped back to {id}");
        Some(id)
    }

    /// Applies listener feedback for the transition `from → to`.
    ///
    /// `listened / duration` decides the outcome: a third of the track or
    /// more reinforces the edge; an early skip (under 10%) penalizes it
    /// hard and cools it down; anything between penalizes it lightly.
    /// Ignored while shut down or learning is frozen.
    pub fn process_feedback(&self, from: TrackId, to: TrackId, listened: f64, duration: f64) {
        let state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if state.phase == Phase::ShutDown || state.chain.learning_frozen {
            return;
        }

        let progress = if duration > 0.0 {
            listened / duration
        } else {
            0.0
        };

        let runtime = self.inner.load_runtime();
        if progress >= 0.33 {
            debug!("feedback {from}->{to}: listened (progress {progress:.2})");
            runtime.reinforce(from, to, 1.0);
        } else if progress < 0.1 {
            debug!("feedback {from}->{to}: hard skip (progress {progress:.2})");
            runtime.penalty(from, to, 2.0);
            runtime.add_cooldown(from, to, 0.2);
        } else {
            debug!("feedback {from}->{to}: soft skip (progress {progress:.2})");
            runtime.penalty(from, to, 1.0);
            runtime.add_cooldown(from, to, 0.1);
        }

        // Fire-and-forget: a full channel already has wakeups pending.
        let _ = self.inner.diff_tx.try_send(());
    }

    /// Explicitly rebuilds the runtime graph with the given reason.
    pub fn rebuild_runtime(&self, reason: &str) {
        self.inner.rebuild(reason);
    }

    /// Notification stream with one signal per rebuild that folded volatile
    /// state into the base graph. Reads as closed after shutdown.
    #[must_use]
    pub fn rebuild_events(&self) -> Receiver<()> {
        self.inner.rebuild_rx.clone()
    }

    /// Live handle to the base graph, or `None` after shutdown.
    #[must_use]
    pub fn base_graph(&self) -> Option<Arc<BaseGraph>> {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match state.phase {
            Phase::Running => Some(Arc::clone(&self.inner.base)),
            Phase::ShutDown => None,
        }
    }

    /// Handle to the currently published runtime graph, or `None` after
    /// shutdown.
    #[must_use]
    pub fn runtime_graph(&self) -> Option<Arc<RuntimeGraph>> {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match state.phase {
            Phase::Running => Some(self.inner.load_runtime()),
            Phase::ShutDown => None,
        }
    }

    /// Snapshot of the playback chain, or `None` after shutdown.
    #[must_use]
    pub fn playback_chain(&self) -> Option<PlaybackChain> {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match state.phase {
            Phase::Running => Some(state.chain.clone()),
            Phase::ShutDown => None,
        }
    }

    /// Replaces the playback chain (session restore at startup). Ignored
    /// after shutdown.
    pub fn restore_chain(&self, chain: PlaybackChain) {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if state.phase == Phase::Running {
            state.chain = chain;
        }
    }

    /// Stops the background workers, drains pending signals, closes the
    /// rebuild stream and transitions to the terminal state. Idempotent;
    /// every public operation afterwards returns its neutral value.
    pub fn shutdown(&self) {
        {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if state.phase == Phase::ShutDown {
                return;
            }
            state.phase = Phase::ShutDown;
        }

        if let Some(lifecycle) = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            lifecycle.cancel_and_join();
        }

        while self.inner.diff_rx.try_recv().is_ok() {}
        self.inner
            .rebuild_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        while self.inner.rebuild_rx.try_recv().is_ok() {}

        info!("orchestrator shut down");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_workers(shared: &Arc<Shared>) -> Lifecycle {
    let (cancel_tx, cancel_rx) = bounded::<()>(0);

    let age = {
        let weak = Arc::downgrade(shared);
        let cancel = cancel_rx.clone();
        thread::spawn(move || age_watcher(&weak, &cancel))
    };
    let diff = {
        let weak = Arc::downgrade(shared);
        let diffs = shared.diff_rx.clone();
        thread::spawn(move || diff_watcher(&weak, &cancel_rx, &diffs))
    };

    Lifecycle {
        cancel_tx,
        workers: vec![age, diff],
    }
}

/// Rebuilds must not run on a watcher thread: the protocol joins the
/// watchers, and a thread cannot join itself.
fn spawn_rebuild(shared: &Arc<Shared>, reason: &'static str) {
    let weak = Arc::downgrade(shared);
    thread::spawn(move || {
        if let Some(shared) = weak.upgrade() {
            shared.rebuild(reason);
        }
    });
}

fn age_watcher(shared: &Weak<Shared>, cancel: &Receiver<()>) {
    let ticker = tick(AGE_CHECK_INTERVAL);
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(ticker) -> _ => {
                let Some(shared) = shared.upgrade() else { return };
                let runtime = shared.load_runtime();
                if runtime.age() > shared.config.max_runtime_graph_age {
                    debug!("runtime graph past max age, scheduling rebuild");
                    spawn_rebuild(&shared, REBUILD_REASON_AGE);
                }
            }
        }
    }
}

fn diff_watcher(shared: &Weak<Shared>, cancel: &Receiver<()>, diffs: &Receiver<()>) {
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(diffs) -> msg => {
                if msg.is_err() {
                    return;
                }
                let Some(shared) = shared.upgrade() else { return };
                let runtime = shared.load_runtime();
                if runtime.diff_count() > shared.config.max_runtime_graph_diff {
                    debug!("runtime graph past diff limit, scheduling rebuild");
                    spawn_rebuild(&shared, REBUILD_REASON_DIFF);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One cold-start edge `0 → 1`. Further edges are reinforced and
    /// rebuilt in as tests need them, so every advance stays deterministic
    /// (reinforcing ahead of time would pollute the global row).
    fn seeded_orchestrator() -> (Arc<BaseGraph>, Orchestrator) {
        let base = Arc::new(BaseGraph::new());
        base.reinforce(0, 1);
        let orch = Orchestrator::with_components(Some(Arc::clone(&base)), None, None, None);
        (base, orch)
    }

    #[test]
    fn test_new_initializes_running_components() {
        let orch = Orchestrator::new();
        assert!(orch.base_graph().is_some());
        assert!(orch.playback_chain().is_some());
        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert_eq!(runtime.build_version(), 0);
        assert_eq!(runtime.build_reason(), "initial build");
        orch.shutdown();
    }

    #[test]
    fn test_play_next_on_empty_graph_is_none() {
        let orch = Orchestrator::new();
        assert_eq!(orch.play_next(), None);
        orch.shutdown();
    }

    #[test]
    fn test_play_next_walks_single_edges_deterministically() {
        let (base, orch) = seeded_orchestrator();
        assert_eq!(orch.play_next(), Some(1));

        base.reinforce(1, 2);
        orch.rebuild_runtime("edge added");
        assert_eq!(orch.play_next(), Some(2));
        // No edges out of 2.
        assert_eq!(orch.play_next(), None);

        let chain = orch.playback_chain().expect("chain while running");
        assert_eq!(chain.current, 2);
        assert_eq!(chain.back_stack, vec![1]);
        orch.shutdown();
    }

    #[test]
    fn test_play_back_freezes_learning_and_forward_replays() {
        let (base, orch) = seeded_orchestrator();
        orch.play_next();
        base.reinforce(1, 2);
        orch.rebuild_runtime("edge added");
        orch.play_next();

        assert_eq!(orch.play_back(), Some(1));
        let chain = orch.playback_chain().expect("chain while running");
        assert!(chain.learning_frozen, "back navigation should freeze learning");
        assert_eq!(chain.forward_stack, vec![2]);

        // The forward stack wins over the selector.
        assert_eq!(orch.play_next(), Some(2));
        orch.shutdown();
    }

    #[test]
    fn test_generated_advance_leaves_learning_unfrozen() {
        let (_base, orch) = seeded_orchestrator();
        orch.play_next();
        let chain = orch.playback_chain().expect("chain while running");
        assert!(!chain.learning_frozen);
        orch.shutdown();
    }

    #[test]
    fn test_play_back_without_history_is_none() {
        let (_base, orch) = seeded_orchestrator();
        assert_eq!(orch.play_back(), None);
        orch.play_next();
        assert_eq!(orch.play_back(), None);
        orch.shutdown();
    }

    #[test]
    fn test_feedback_listen_reinforces_runtime() {
        let orch = Orchestrator::new();
        orch.process_feedback(1, 2, 5.0, 10.0);

        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert_eq!(runtime.diff_count(), 1.0);
        assert_eq!(runtime.pending_bonuses()[&1][&2], 1.0);
        assert!(runtime.pending_penalties().is_empty());
        orch.shutdown();
    }

    #[test]
    fn test_feedback_hard_skip_penalizes_and_cools() {
        let orch = Orchestrator::new();
        orch.process_feedback(2, 3, 0.5, 10.0);

        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert_eq!(runtime.diff_count(), 2.0);
        assert_eq!(runtime.pending_penalties()[&2][&3], 2.0);
        assert_eq!(runtime.cooldowns()[&2][&3], 0.2);
        orch.shutdown();
    }

    #[test]
    fn test_feedback_soft_skip_penalizes_lightly() {
        let orch = Orchestrator::new();
        orch.process_feedback(3, 4, 2.0, 10.0);

        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert_eq!(runtime.diff_count(), 2.0);
        assert_eq!(runtime.pending_penalties()[&3][&4], 1.0);
        assert_eq!(runtime.cooldowns()[&3][&4], 0.1);
        orch.shutdown();
    }

    #[test]
    fn test_feedback_ignored_while_learning_frozen() {
        let (base, orch) = seeded_orchestrator();
        orch.play_next();
        base.reinforce(1, 2);
        orch.rebuild_runtime("edge added");
        orch.play_next();
        orch.play_back(); // freezes learning

        orch.process_feedback(1, 2, 10.0, 10.0);
        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert_eq!(runtime.diff_count(), 0.0);
        orch.shutdown();
    }

    #[test]
    fn test_feedback_with_zero_duration_counts_as_hard_skip() {
        let orch = Orchestrator::new();
        orch.process_feedback(1, 2, 5.0, 0.0);

        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert_eq!(runtime.pending_penalties()[&1][&2], 2.0);
        orch.shutdown();
    }

    #[test]
    fn test_explicit_rebuild_bumps_version_monotonically() {
        let (_base, orch) = seeded_orchestrator();
        for expected in 1..=3 {
            orch.rebuild_runtime("test rebuild");
            let runtime = orch.runtime_graph().expect("runtime graph while running");
            assert_eq!(runtime.build_version(), expected);
            assert_eq!(runtime.build_reason(), "test rebuild");
        }
        orch.shutdown();
    }

    #[test]
    fn test_rebuild_folds_penalties_into_base_graph() {
        let base = Arc::new(BaseGraph::new());
        for _ in 0..3 {
            base.reinforce(1, 2);
        }
        let orch = Orchestrator::with_components(Some(Arc::clone(&base)), None, None, None);

        // Two hard-skip penalty units against 1 -> 2.
        orch.process_feedback(1, 2, 0.0, 10.0);
        orch.rebuild_runtime("fold test");

        assert_eq!(base.get_edges_for_id(1)[&2], 1.0);
        // The new runtime graph starts with a clean volatile slate.
        let runtime = orch.runtime_graph().expect("runtime graph while running");
        assert!(runtime.pending_penalties().is_empty());
        assert_eq!(runtime.diff_count(), 0.0);
        orch.shutdown();
    }

    #[test]
    fn test_rebuild_folds_bonuses_into_base_graph() {
        let base = Arc::new(BaseGraph::new());
        base.reinforce(1, 2);
        let orch = Orchestrator::with_components(Some(Arc::clone(&base)), None, None, None);

        orch.process_feedback(1, 2, 9.0, 10.0);
        orch.rebuild_runtime("fold test");

        assert_eq!(base.get_edges_for_id(1)[&2], 2.0);
        orch.shutdown();
    }

    #[test]
    fn test_rebuild_emits_event_only_when_state_folded() {
        let (_base, orch) = seeded_orchestrator();
        let events = orch.rebuild_events();

        // Nothing volatile: no notification.
        orch.rebuild_runtime("idle rebuild");
        assert!(events.try_recv().is_err());

        orch.process_feedback(1, 2, 9.0, 10.0);
        orch.rebuild_runtime("fold rebuild");
        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
        orch.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent_and_neutralizes_operations() {
        let (_base, orch) = seeded_orchestrator();
        orch.shutdown();
        orch.shutdown();

        assert_eq!(orch.play_next(), None);
        assert_eq!(orch.play_back(), None);
        assert!(orch.base_graph().is_none());
        assert!(orch.runtime_graph().is_none());
        assert!(orch.playback_chain().is_none());

        orch.process_feedback(1, 2, 9.0, 10.0); // must not panic or mutate

        let events = orch.rebuild_events();
        assert!(
            events.recv().is_err(),
            "rebuild stream should read as closed after shutdown"
        );
    }

    #[test]
    fn test_rebuild_after_shutdown_is_noop() {
        let (_base, orch) = seeded_orchestrator();
        orch.shutdown();
        orch.rebuild_runtime("too late");
        assert!(orch.runtime_graph().is_none());
    }

    #[test]
    fn test_restore_chain_replaces_navigation_state() {
        let (_base, orch) = seeded_orchestrator();
        let mut chain = PlaybackChain::new();
        chain.next(7);
        chain.next(8);
        orch.restore_chain(chain.clone());

        assert_eq!(orch.playback_chain(), Some(chain));
        orch.shutdown();
    }

    #[test]
    fn test_concurrent_navigation_and_feedback() {
        use std::thread;

        let base = Arc::new(BaseGraph::new());
        base.reinforce(0, 1);
        base.reinforce(0, 2);
        base.reinforce(1, 3);
        base.reinforce(2, 4);
        let orch = Arc::new(Orchestrator::with_components(Some(base), None, None, None));

        let mut handles = Vec::new();
        for worker in 0..4 {
            let orch = Arc::clone(&orch);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    match (worker + i) % 3 {
                        0 => {
                            orch.play_next();
                        }
                        1 => {
                            orch.play_back();
                        }
                        _ => orch.process_feedback(1, 3, f64::from(i % 10), 10.0),
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        assert!(orch.base_graph().is_some());
        assert!(orch.runtime_graph().is_some());
        orch.shutdown();
    }
}
