//! Persistence facade between the store and the engine.
//!
//! The catalog gives the facade and the orchestrator's embedder one
//! contract for loading and saving engine state without tying either to a
//! concrete storage layout. The key schema:
//!
//! - `song/<id>` — JSON [`Song`] record
//! - `album/<id>` — JSON [`Album`] record
//! - `graph/<albumID>` — binary dump of the base-graph edge map
//! - `session/playback` — JSON [`PlaybackChain`] record
//!
//! Loads are permissive: a missing key or an undecodable value degrades to
//! the empty value for that key instead of failing startup. Losing a
//! session or a graph is an inconvenience; refusing to start is a bug.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;

use crate::base_graph::{BaseGraph, EdgeMap};
use crate::chain::PlaybackChain;
use crate::song::{Album, Song};
use crate::store::Store;

const SESSION_KEY: &str = "session/playback";

/// Load/save contract consumed by the facade and the embedder task.
pub trait Catalog {
    /// Edges of the album's base graph; empty when never saved.
    fn load_base_graph_edges(&self, album_id: i64) -> Result<EdgeMap>;
    /// Last saved playback chain; empty when never saved.
    fn load_playback_session(&self) -> Result<PlaybackChain>;
    /// Persists the album's base graph.
    fn save_base_graph(&self, album_id: i64, graph: &BaseGraph) -> Result<()>;
    /// Persists the playback chain.
    fn save_playback_session(&self, chain: &PlaybackChain) -> Result<()>;
    /// Every album record in the library.
    fn list_albums(&self) -> Result<Vec<Album>>;
    /// Every song record in the library.
    fn list_songs(&self) -> Result<Vec<Song>>;
}

/// [`Catalog`] implementation over the key/value [`Store`].
#[derive(Clone)]
pub struct StoreCatalog {
    store: Arc<Store>,
}

impl StoreCatalog {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persists a song record under `song/<id>`.
    pub fn save_song(&self, song: &Song) -> Result<()> {
        let data = serde_json::to_vec(song).context("failed to encode song")?;
        self.store.set(&format!("song/{}", song.id), &data)
    }

    /// Persists an album record under `album/<id>`.
    pub fn save_album(&self, album: &Album) -> Result<()> {
        let data = serde_json::to_vec(album).context("failed to encode album")?;
        self.store.set(&format!("album/{}", album.id), &data)
    }

    /// Reads one song record, `None` when absent.
    pub fn get_song(&self, id: i64) -> Result<Option<Song>> {
        let Some(data) = self.store.get(&format!("song/{id}"))? else {
            return Ok(None);
        };
        Ok(serde_json::from_slice(&data)
            .map_err(|err| warn!("undecodable song/{id} record: {err}"))
            .ok())
    }

    /// Reads one album record, `None` when absent.
    pub fn get_album(&self, id: i64) -> Result<Option<Album>> {
        let Some(data) = self.store.get(&format!("album/{id}"))? else {
            return Ok(None);
        };
        Ok(serde_json::from_slice(&data)
            .map_err(|err| warn!("undecodable album/{id} record: {err}"))
            .ok())
    }
}

impl Catalog for StoreCatalog {
    fn load_base_graph_edges(&self, album_id: i64) -> Result<EdgeMap> {
        let Some(data) = self.store.get(&format!("graph/{album_id}"))? else {
            return Ok(EdgeMap::new());
        };
        match bincode::deserialize(&data) {
            Ok(edges) => Ok(edges),
            Err(err) => {
                warn!("undecodable graph/{album_id} value, starting empty: {err}");
                Ok(EdgeMap::new())
            }
        }
    }

    fn load_playback_session(&self) -> Result<PlaybackChain> {
        let Some(data) = self.store.get(SESSION_KEY)? else {
            return Ok(PlaybackChain::new());
        };
        match serde_json::from_slice(&data) {
            Ok(chain) => Ok(chain),
            Err(err) => {
                warn!("undecodable playback session, starting empty: {err}");
                Ok(PlaybackChain::new())
            }
        }
    }

    fn save_base_graph(&self, album_id: i64, graph: &BaseGraph) -> Result<()> {
        let data = bincode::serialize(&graph.get_edges()).context("failed to encode base graph")?;
        self.store.set(&format!("graph/{album_id}"), &data)
    }

    fn save_playback_session(&self, chain: &PlaybackChain) -> Result<()> {
        let data = serde_json::to_vec(chain).context("failed to encode playback session")?;
        self.store.set(SESSION_KEY, &data)
    }

    fn list_albums(&self) -> Result<Vec<Album>> {
        let mut albums = Vec::new();
        for (key, value) in self.store.list("album/")? {
            match serde_json::from_slice(&value) {
                Ok(album) => albums.push(album),
                Err(err) => warn!("skipping undecodable {key}: {err}"),
            }
        }
        Ok(albums)
    }

    fn list_songs(&self) -> Result<Vec<Song>> {
        let mut songs = Vec::new();
        for (key, value) in self.store.list("song/")? {
            match serde_json::from_slice(&value) {
                Ok(song) => songs.push(song),
                Err(err) => warn!("skipping undecodable {key}: {err}"),
            }
        }
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn temp_catalog() -> (TempDir, StoreCatalog) {
        let dir = TempDir::new().expect("temp dir");
        let store =
            Arc::new(Store::open(&dir.path().join("catalog.db")).expect("store should open"));
        (dir, StoreCatalog::new(store))
    }

    #[test]
    fn test_base_graph_round_trip() {
        let (_dir, catalog) = temp_catalog();

        let graph = BaseGraph::new();
        graph.reinforce(1, 2);
        graph.reinforce(1, 2);
        graph.reinforce(2, 3);
        catalog.save_base_graph(7, &graph).expect("save should succeed");

        let edges = catalog.load_base_graph_edges(7).expect("load should succeed");
        assert_eq!(edges, graph.get_edges());
    }

    #[test]
    fn test_load_missing_graph_is_empty() {
        let (_dir, catalog) = temp_catalog();
        let edges = catalog.load_base_graph_edges(99).expect("load should succeed");
        assert!(edges.is_empty());
    }

    #[test]
    fn test_load_corrupt_graph_degrades_to_empty() {
        let (_dir, catalog) = temp_catalog();
        catalog
            .store
            .set("graph/3", b"definitely not bincode")
            .expect("set");

        let edges = catalog.load_base_graph_edges(3).expect("load should not fail");
        assert!(edges.is_empty());
    }

    #[test]
    fn test_playback_session_round_trip() {
        let (_dir, catalog) = temp_catalog();

        let mut chain = PlaybackChain::new();
        chain.next(1);
        chain.next(2);
        chain.back();
        chain.freeze_learning();
        catalog.save_playback_session(&chain).expect("save");

        let loaded = catalog.load_playback_session().expect("load");
        assert_eq!(loaded, chain);
    }

    #[test]
    fn test_load_missing_session_is_empty_chain() {
        let (_dir, catalog) = temp_catalog();
        let chain = catalog.load_playback_session().expect("load");
        assert_eq!(chain, PlaybackChain::new());
    }

    #[test]
    fn test_load_corrupt_session_degrades_to_empty_chain() {
        let (_dir, catalog) = temp_catalog();
        catalog.store.set("session/playback", b"{oops").expect("set");

        let chain = catalog.load_playback_session().expect("load should not fail");
        assert_eq!(chain, PlaybackChain::new());
    }

    #[test]
    fn test_songs_and_albums_listing() {
        let (_dir, catalog) = temp_catalog();

        let album = Album {
            id: 1,
            title: "Kind of Blue".to_string(),
            songs: 2,
        };
        catalog.save_album(&album).expect("save album");
        for (id, title) in [(1, "So What"), (2, "Blue in Green")] {
            catalog
                .save_song(&Song {
                    id,
                    title: title.to_string(),
                    album_id: 1,
                    duration_secs: 300.0,
                })
                .expect("save song");
        }

        let albums = catalog.list_albums().expect("list albums");
        assert_eq!(albums, vec![album]);

        let songs = catalog.list_songs().expect("list songs");
        assert_eq!(songs.len(), 2);
        assert_eq!(catalog.get_song(1).expect("get").map(|s| s.title), Some("So What".to_string()));
        assert_eq!(catalog.get_album(1).expect("get").map(|a| a.songs), Some(2));
    }

    #[test]
    fn test_graph_dump_preserves_float_weights() {
        let (_dir, catalog) = temp_catalog();

        let graph = BaseGraph::new();
        let mut edges = EdgeMap::new();
        edges.insert(1, HashMap::from([(2, 0.5), (3, 12.25)]));
        graph.set_edges(Some(edges.clone()));
        catalog.save_base_graph(0, &graph).expect("save");

        assert_eq!(catalog.load_base_graph_edges(0).expect("load"), edges);
    }
}
