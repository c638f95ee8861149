//! Embedding facade.
//!
//! `App` is what a player UI talks to. It wires the store, catalog and
//! orchestrator together, restores persisted state at startup, and keeps
//! persistence flowing while the engine runs:
//!
//! - the playback session is saved (best-effort) after every successful
//!   navigation;
//! - an embedder thread consumes the orchestrator's rebuild notifications
//!   and saves the base graph whenever a rebuild folded volatile state.
//!
//! Construction is strict (bad arguments fail fast), but loading is
//! permissive: missing or undecodable persisted state degrades to empty.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Result};
use log::{debug, error, info};

use crate::base_graph::{BaseGraph, TrackId};
use crate::catalog::{Catalog, StoreCatalog};
use crate::config::EngineConfig;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::selector::Selector;
use crate::song::{Album, Song};
use crate::store::Store;

/// One album's engine plus its persistence collaborators.
pub struct App {
    store: Arc<Store>,
    catalog: StoreCatalog,
    orch: Arc<Orchestrator>,
    album_id: i64,
    embedder: Option<JoinHandle<()>>,
}

impl App {
    /// Opens the library at `db_path` and starts the engine for
    /// `album_id` with default tuning.
    ///
    /// # Errors
    ///
    /// Fails on an empty path, a negative album id, or a store that cannot
    /// be opened. Missing persisted state is not an error.
    pub fn new(db_path: &Path, album_id: i64) -> Result<Self> {
        Self::with_config(db_path, album_id, EngineConfig::default())
    }

    /// [`App::new`] with explicit engine tuning.
    pub fn with_config(db_path: &Path, album_id: i64, config: EngineConfig) -> Result<Self> {
        if album_id < 0 {
            bail!("album id must not be negative, got {album_id}");
        }

        let store = Arc::new(Store::open(db_path)?);
        store.start_backup(config.backup_interval());
        let catalog = StoreCatalog::new(Arc::clone(&store));

        let edges = catalog.load_base_graph_edges(album_id)?;
        let base = Arc::new(BaseGraph::new());
        if !edges.is_empty() {
            base.set_edges(Some(edges));
        }
        let session = catalog.load_playback_session()?;

        let selector = Selector::with_parameters(config.gini_high, config.gini_low, config.top_k);
        let orch_config = OrchestratorConfig {
            max_runtime_graph_age: config.max_runtime_graph_age(),
            max_runtime_graph_diff: config.max_runtime_graph_diff,
        };
        let orch = Arc::new(Orchestrator::with_config(
            orch_config,
            Some(Arc::clone(&base)),
            None,
            Some(selector),
            Some(session),
        ));

        let embedder = spawn_embedder(&orch, catalog.clone(), album_id);

        info!(
            "encore started: album {album_id}, library at {}",
            db_path.display()
        );
        Ok(Self {
            store,
            catalog,
            orch,
            album_id,
            embedder: Some(embedder),
        })
    }

    /// Advances playback; persists the session on success.
    pub fn play_next(&self) -> Option<TrackId> {
        let id = self.orch.play_next();
        if id.is_some() {
            self.persist_session();
        }
        id
    }

    /// Steps back in history; persists the session on success.
    pub fn play_back(&self) -> Option<TrackId> {
        let id = self.orch.play_back();
        if id.is_some() {
            self.persist_session();
        }
        id
    }

    /// Forwards listener feedback to the engine.
    pub fn process_feedback(&self, from: TrackId, to: TrackId, listened: f64, duration: f64) {
        self.orch.process_feedback(from, to, listened, duration);
    }

    /// Every song record in the library.
    pub fn list_songs(&self) -> Result<Vec<Song>> {
        self.catalog.list_songs()
    }

    /// Every album record in the library.
    pub fn list_albums(&self) -> Result<Vec<Album>> {
        self.catalog.list_albums()
    }

    /// The engine coordinator, for embedders needing direct access.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orch
    }

    /// The persistence facade, for library management (adding songs and
    /// albums).
    #[must_use]
    pub fn catalog(&self) -> &StoreCatalog {
        &self.catalog
    }

    /// Album this engine instance is responsible for.
    #[must_use]
    pub fn album_id(&self) -> i64 {
        self.album_id
    }

    /// Shuts the engine down, persists the final base graph and session,
    /// and stops the background tasks.
    pub fn close(mut self) {
        self.shutdown_internal();
    }

    fn persist_session(&self) {
        if let Some(chain) = self.orch.playback_chain() {
            if let Err(err) = self.catalog.save_playback_session(&chain) {
                error!("failed to persist playback session: {err:#}");
            }
        }
    }

    fn shutdown_internal(&mut self) {
        // Final saves while the orchestrator still hands out state.
        if let Some(base) = self.orch.base_graph() {
            if let Err(err) = self.catalog.save_base_graph(self.album_id, &base) {
                error!("failed to persist base graph on close: {err:#}");
            }
        }
        self.persist_session();

        self.orch.shutdown();
        if let Some(handle) = self.embedder.take() {
            let _ = handle.join();
        }
        self.store.close();
        debug!("encore app closed");
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown_internal();
    }
}

fn spawn_embedder(
    orch: &Arc<Orchestrator>,
    catalog: StoreCatalog,
    album_id: i64,
) -> JoinHandle<()> {
    let events = orch.rebuild_events();
    let weak = Arc::downgrade(orch);
    thread::spawn(move || {
        while events.recv().is_ok() {
            let Some(orch) = weak.upgrade() else { return };
            let Some(base) = orch.base_graph() else { return };
            match catalog.save_base_graph(album_id, &base) {
                Ok(()) => debug!("base graph persisted for album {album_id}"),
                Err(err) => error!("failed to persist base graph for album {album_id}: {err:#}"),
            }
        }
    })
}
