//! Automatic artist and genre radio over a music catalog.
//!
//! Given a seed, an artist or a genre, Onde assembles an ordered,
//! deduplicated queue of tracks that favors popular and recent work, falls
//! back gracefully when the seed has too few tracks, and can keep extending
//! the queue ("load more") without repeating anything already delivered.
//!
//! Core modules:
//! - [`radio`] - Sessions, the generation pipeline and the caller surface
//! - [`gather`] - Tiered candidate retrieval
//! - [`algorithm`] - Popularity and recency scoring
//! - [`popularity`] - Play-count resolution
//! - [`dedup`] - Exclusion tracking
//! - [`shuffle`] - Head-preserving shuffle
//!
//! ### Supporting Modules
//!
//! - [`catalog`] - Collaborator traits for the catalog and play telemetry
//! - [`db`] - SQLite implementation of those traits
//! - [`track`] - Track data model
//! - [`config`] - Data directory and configuration file handling
//! - [`cli`] / [`completion`] - Command-line definitions
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use onde::db::SqliteStore;
//! use onde::radio::{GenerationOptions, RadioGenerator, RadioSeed, RadioSession};
//!
//! let store = SqliteStore::open(onde::config::get_db_path()?)?;
//! let generator = RadioGenerator::new(&store, &store);
//!
//! let mut session = RadioSession::new();
//! let queue = session.start(&generator, RadioSeed::genre("Louange"), GenerationOptions::default())?;
//! println!("Generated queue with {} tracks", queue.len());
//!
//! let more = session.extend(&generator)?;
//! println!("Loaded {} more", more.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Ranking
//!
//! ```text
//! score = (prioritize_popular ? plays : 0) * 10 - (prioritize_recent ? age_days : 0)
//! ```
//!
//! Higher scores come first; ties go to the newer track, then the smaller id.
//!
//! ## Error Handling
//!
//! Collaborator calls return `anyhow::Result`. A radio that cannot reach its
//! catalog simply yields no tracks; a radio that cannot reach play telemetry
//! ranks by recency alone and flags the result as degraded. Only session
//! misuse surfaces as a [`radio::RadioError`].

pub mod algorithm;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod dedup;
pub mod gather;
pub mod popularity;
pub mod radio;
pub mod shuffle;
pub mod track;
