//! Entity records exposed to the embedding application.
//!
//! The engine core treats tracks as opaque identifiers; these records exist
//! for the facade's listing surface and for the catalog's persistence of
//! library metadata.

use serde::{Deserialize, Serialize};

use crate::base_graph::TrackId;

/// A track as stored in the library.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: TrackId,
    pub title: String,
    /// Album this track belongs to.
    pub album_id: i64,
    /// Track length in seconds; feedback progress is measured against it.
    pub duration_secs: f64,
}

/// An album: the unit one orchestrator is responsible for.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub title: String,
    /// Number of tracks in the album.
    pub songs: i64,
}
