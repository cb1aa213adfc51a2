//! # Onde
//!
//! Command-line front end over the radio library: manage a local SQLite
//! catalog, record plays, and print artist or genre radio queues.
//!
//! ```bash
//! RUST_LOG=debug onde genre Louange --more 1
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use log::info;
use onde::catalog::{CatalogAccessor, TrackFilter};
use onde::cli::{self, RadioFlags};
use onde::completion;
use onde::config::RuntimeConfig;
use onde::db::SqliteStore;
use onde::radio::{GenerationOptions, RadioGenerator, RadioSeed, RadioSession};
use onde::track::Track;
use std::fs;

/// Main entry point for the Onde application.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug onde genre Jazz` - tier-by-tier decisions
/// - `RUST_LOG=onde::algorithm=trace onde genre Jazz` - per-track scores
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    if let cli::Command::Completion { shell } = args.command {
        let mut cmd = cli::Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let config = RuntimeConfig::resolve(args.config.as_deref(), args.db)?;
    info!("Using catalog at {}", config.db_path.display());
    let mut store = SqliteStore::open(&config.db_path)?;

    match args.command {
        cli::Command::InitDb { force } => {
            if force {
                store.reset()?;
            }
            println!(
                "Catalog ready at {} ({} tracks)",
                config.db_path.display(),
                store.count_tracks()?
            );
        }
        cli::Command::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let tracks: Vec<Track> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of tracks", file.display()))?;
            let imported = store.insert_tracks(&tracks)?;
            println!("Imported {imported} tracks");
        }
        cli::Command::List { limit } => {
            let tracks = store.query_tracks(&TrackFilter::approved(), limit, 0)?;
            for track in &tracks {
                println!("{}  {track}", track.id);
            }
        }
        cli::Command::Moderate { track_id, status } => {
            if !store.set_status(&track_id, status)? {
                anyhow::bail!("No track with id '{track_id}'");
            }
            println!("{track_id} is now {status}");
        }
        cli::Command::Play { track_id, times } => {
            if store.get_track(&track_id)?.is_none() {
                anyhow::bail!("No track with id '{track_id}'");
            }
            let now = Utc::now();
            for _ in 0..times {
                store.record_play(&track_id, now)?;
            }
            println!("Recorded {times} play(s) of {track_id}");
        }
        cli::Command::Artist { artist_id, name, radio } => {
            let display_name = name.unwrap_or_else(|| artist_id.clone());
            run_radio(&store, &config, RadioSeed::artist(artist_id, display_name), &radio);
        }
        cli::Command::Genre { genre, radio } => {
            run_radio(&store, &config, RadioSeed::genre(genre), &radio);
        }
        cli::Command::Completion { .. } => unreachable!("handled before opening the catalog"),
    }

    Ok(())
}

/// Start a radio, extend it `flags.more` times and print every batch.
fn run_radio(store: &SqliteStore, config: &RuntimeConfig, seed: RadioSeed, flags: &RadioFlags) {
    let mut tuning = config.radio.clone();
    if let Some(extend_limit) = flags.extend_limit {
        tuning.extend_limit = extend_limit.max(1);
    }
    let generator = RadioGenerator::with_tuning(store, store, tuning);

    let mut options = GenerationOptions::from_tuning(generator.tuning());
    if let Some(limit) = flags.limit {
        options.limit = limit.max(1);
    }
    options.shuffle &= !flags.no_shuffle;
    options.prioritize_popular &= !flags.no_popular;
    options.prioritize_recent &= !flags.no_recent;

    let mut session = flags.seed.map_or_else(RadioSession::new, RadioSession::with_seed);

    println!("{seed}");
    let first = match session.start(&generator, seed, options) {
        Ok(tracks) => tracks,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    if first.is_empty() {
        println!("No tracks available.");
        return;
    }
    print_batch(&first, 0);
    if session.popularity_degraded() {
        eprintln!("warning: play counts unavailable, ranked by recency only");
    }

    for round in 1..=flags.more {
        match session.extend(&generator) {
            Ok(more) if more.is_empty() => {
                println!("-- no more tracks --");
                break;
            }
            Ok(more) => {
                println!("-- more ({round}) --");
                print_batch(&more, session.queue().len() - more.len());
            }
            Err(e) => {
                eprintln!("{e}");
                break;
            }
        }
    }
}

fn print_batch(tracks: &[Track], offset: usize) {
    for (i, track) in tracks.iter().enumerate() {
        println!("{:>3}. {track}", offset + i + 1);
    }
}
