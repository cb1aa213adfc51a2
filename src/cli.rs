//! # Command-Line Interface Module
//!
//! Clap definitions for the `onde` binary.
//!
//! ## Examples
//!
//! ```bash
//! onde init-db
//! onde import catalog.json
//! onde play track-17 --times 3
//! onde artist artist-42 --name "Chorale Saint-Paul" --more 2
//! onde genre Louange --limit 20 --no-shuffle
//! ```

use crate::track::TrackStatus;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "onde")]
#[command(about = "Onde: automatic artist and genre radio queues over a music catalog")]
#[command(version)]
pub struct Args {
    /// Catalog database to use instead of the configured one
    #[arg(long, global = true, env = "ONDE_DB")]
    pub db: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "ONDE_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the catalog database
    InitDb {
        /// Delete every track and play event first
        #[arg(long)]
        force: bool,
    },

    /// Import tracks from a JSON array file
    ///
    /// Each entry needs at least `id`, `title`, `artist_id` and
    /// `created_at` (RFC 3339). Existing tracks with the same id are replaced.
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List approved tracks, newest first
    List {
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Change the moderation status of a track
    Moderate {
        track_id: String,
        /// approved, pending or rejected
        status: TrackStatus,
    },

    /// Record play events for a track
    Play {
        track_id: String,
        #[arg(long, default_value = "1")]
        times: u32,
    },

    /// Start a radio seeded by an artist
    Artist {
        artist_id: String,
        /// Display name of the artist (defaults to the id)
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        radio: RadioFlags,
    },

    /// Start a radio seeded by a genre
    Genre {
        genre: String,
        #[command(flatten)]
        radio: RadioFlags,
    },

    /// Generate shell completions
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by the radio commands.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RadioFlags {
    /// Tracks in the initial queue
    #[arg(long)]
    pub limit: Option<usize>,

    /// Number of "load more" rounds after the initial queue
    #[arg(long, default_value = "0")]
    pub more: u32,

    /// Tracks requested by each "load more" round
    #[arg(long)]
    pub extend_limit: Option<usize>,

    /// Keep the ranked order
    #[arg(long)]
    pub no_shuffle: bool,

    /// Ignore play counts when ranking
    #[arg(long)]
    pub no_popular: bool,

    /// Ignore track age when ranking
    #[arg(long)]
    pub no_recent: bool,

    /// Shuffle seed, for reproducible queues
    #[arg(long)]
    pub seed: Option<u64>,
}
