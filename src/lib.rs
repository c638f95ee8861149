//! Adaptive next-track recommendations learned from listening behavior.
//!
//! Encore keeps a per-album graph of track-to-track transitions, reinforces
//! an edge every time the listener finishes a track, penalizes it when the
//! track gets skipped, and picks the next track by sampling the resulting
//! probability distribution. Recently skipped edges are cooled down for a
//! few minutes; rare edges still get the occasional chance so the library
//! keeps getting explored.
//!
//! ## Core Modules
//!
//! - [`base_graph`] - Persistent weighted transition memory
//! - [`runtime_graph`] - In-memory probability engine with volatile modifiers
//! - [`selector`] - Concentration-aware next-track sampling
//! - [`chain`] - Back/forward navigation history
//! - [`orchestrator`] - Lifecycle, feedback and background rebuilds
//!
//! ### Supporting Modules
//!
//! - [`store`] - Key/value persistence with periodic backups
//! - [`catalog`] - (De)serialization of engine state over the store
//! - [`song`] - Track and album records
//! - [`config`] - Data directory and engine tuning
//! - [`app`] - Embedding facade wiring everything together
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use encore::app::App;
//!
//! let app = App::new(std::path::Path::new("library.db"), 0)?;
//!
//! // Advance playback; `None` means the graph has nothing to offer yet.
//! if let Some(track) = app.play_next() {
//!     println!("now playing track {track}");
//! }
//!
//! // The listener finished 154 of 200 seconds before moving on.
//! app.process_feedback(1, 2, 154.0, 200.0);
//!
//! app.close();
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## How Selection Works
//!
//! The engine keeps two graphs. The *base graph* is the persistent record:
//! every completed listen bumps an integer edge weight. The *runtime graph*
//! is rebuilt from it in the background and carries the short-lived state —
//! cooldowns that decay over ~3 minutes and penalties waiting to be folded
//! back into the base graph. The selector reads a normalized distribution
//! from the runtime graph and adapts: concentrated distributions are
//! sampled as-is, flat ones are sharpened and sampled from their top
//! entries.
//!
//! ## Error Handling
//!
//! Construction fails fast on bad arguments (empty database path, negative
//! album id). Everything recoverable degrades instead of erroring: missing
//! persisted state loads as empty, an exhausted distribution returns
//! `None`, operations after shutdown return neutral values.
//!
//! ## Concurrency
//!
//! All engine types are safe to share across threads. The orchestrator
//! publishes each rebuilt runtime graph atomically, so selection never
//! observes a half-built graph, and its shutdown is idempotent.

pub mod app;
pub mod base_graph;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod orchestrator;
pub mod runtime_graph;
pub mod selector;
pub mod song;
pub mod store;

pub use app::App;
pub use base_graph::{BaseGraph, EdgeMap, TrackId};
pub use chain::PlaybackChain;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use runtime_graph::RuntimeGraph;
pub use selector::Selector;
