//! # Radio Sessions
//!
//! A radio turns a seed (an artist or a genre) into an ordered queue of
//! tracks and can keep extending it without ever repeating itself.
//!
//! ## Pipeline
//!
//! ```text
//! gather (tier by tier) -> score -> dedup -> partial shuffle -> queue
//! ```
//!
//! [`RadioGenerator`] runs one pass of the pipeline and is stateless between
//! calls. [`RadioSession`] owns the delivered queue and the state machine:
//!
//! ```text
//! Idle/Stopped --start--> Generating --> Ready --extend--> Extending --> Ready
//!       any state --stop--> Stopped
//! ```
//!
//! A generation step is all-or-nothing: the queue only changes once the whole
//! pipeline for that call has succeeded. Catalog failures are logged and
//! reported to the caller as an empty result.
//!
//! [`RadioStation`] is the caller-facing surface holding at most one session.
//!
//! ```no_run
//! use onde::db::SqliteStore;
//! use onde::radio::{RadioGenerator, RadioStation};
//!
//! let store = SqliteStore::open("catalog.db")?;
//! let mut station = RadioStation::new(RadioGenerator::new(&store, &store));
//! let first = station.start_artist_radio("artist-42", "Chorale Saint-Paul");
//! let more = station.extend_radio()?;
//! station.stop_radio();
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::algorithm::ScoringContext;
use crate::catalog::{CatalogAccessor, PlayTelemetry};
use crate::config::RadioTuning;
use crate::dedup::ExclusionSet;
use crate::gather::{CandidateGatherer, Gathered};
use crate::shuffle::partial_shuffle;
use crate::track::{Track, TrackId};
use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// What a radio is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    Artist,
    Genre,
}

/// Immutable anchor of a radio session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioSeed {
    pub kind: SeedKind,
    /// Artist identifier or genre name.
    pub value: String,
    pub display_name: String,
}

impl RadioSeed {
    #[must_use]
    pub fn artist(artist_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: SeedKind::Artist,
            value: artist_id.into(),
            display_name: display_name.into(),
        }
    }

    #[must_use]
    pub fn genre(genre: impl Into<String>) -> Self {
        let genre = genre.into();
        Self {
            kind: SeedKind::Genre,
            display_name: genre.clone(),
            value: genre,
        }
    }
}

impl fmt::Display for RadioSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SeedKind::Artist => write!(f, "artist radio '{}'", self.display_name),
            SeedKind::Genre => write!(f, "genre radio '{}'", self.display_name),
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub limit: usize,
    /// Tracks that must not be admitted by this call.
    pub exclude_ids: HashSet<TrackId>,
    pub prioritize_popular: bool,
    pub prioritize_recent: bool,
    pub shuffle: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from_tuning(&RadioTuning::default())
    }
}

impl GenerationOptions {
    /// Start options derived from the configured tuning.
    #[must_use]
    pub fn from_tuning(tuning: &RadioTuning) -> Self {
        Self {
            limit: tuning.default_limit,
            exclude_ids: HashSet::new(),
            prioritize_popular: tuning.prioritize_popular,
            prioritize_recent: tuning.prioritize_recent,
            shuffle: tuning.shuffle,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Result of one pipeline pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub tracks: Vec<Track>,
    /// Ranking used zero play counts because telemetry was unreachable.
    pub popularity_degraded: bool,
}

/// Runs the gather, score, dedup and shuffle pipeline against a catalog.
#[derive(Debug, Clone)]
pub struct RadioGenerator<C, T> {
    catalog: C,
    telemetry: T,
    tuning: RadioTuning,
}

impl<C: CatalogAccessor, T: PlayTelemetry> RadioGenerator<C, T> {
    pub fn new(catalog: C, telemetry: T) -> Self {
        Self::with_tuning(catalog, telemetry, RadioTuning::default())
    }

    pub fn with_tuning(catalog: C, telemetry: T, tuning: RadioTuning) -> Self {
        Self {
            catalog,
            telemetry,
            tuning,
        }
    }

    #[must_use]
    pub const fn tuning(&self) -> &RadioTuning {
        &self.tuning
    }

    /// Head size kept in rank order by the partial shuffle.
    #[must_use]
    pub const fn head_size(&self, kind: SeedKind) -> usize {
        match kind {
            SeedKind::Artist => self.tuning.artist_head,
            SeedKind::Genre => self.tuning.genre_head,
        }
    }

    /// One full pipeline pass.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalog query fails. Telemetry failures are
    /// absorbed and flagged on the result instead.
    pub fn generate<R>(&self, seed: &RadioSeed, options: &GenerationOptions, rng: &mut R) -> Result<Generation>
    where
        R: Rng + ?Sized,
    {
        let scoring = ScoringContext::new(options.prioritize_popular, options.prioritize_recent, Utc::now());
        let gatherer = CandidateGatherer::new(&self.catalog, &self.telemetry, &self.tuning, scoring);
        let mut exclusion = ExclusionSet::from(options.exclude_ids.clone());

        let Gathered {
            mut tracks,
            tiers,
            popularity_degraded,
        } = match seed.kind {
            SeedKind::Artist => gatherer.gather_artist(&seed.value, options.limit, &mut exclusion)?,
            SeedKind::Genre => gatherer.gather_genre(&seed.value, options.limit, &mut exclusion)?,
        };
        debug!("{seed}: tiers {tiers:?} produced {} tracks", tracks.len());

        if options.shuffle {
            partial_shuffle(&mut tracks, self.head_size(seed.kind), rng);
        }

        Ok(Generation {
            tracks,
            popularity_degraded,
        })
    }
}

/// Lifecycle of a [`RadioSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RadioState {
    #[default]
    Idle,
    Generating,
    Ready,
    Extending,
    Stopped,
}

impl RadioState {
    /// A pipeline is running for the session.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Generating | Self::Extending)
    }
}

/// Session misuse. Empty results are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("a radio generation is already in flight for this session")]
    Busy,
    #[error("cannot {operation} a radio session in state {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: RadioState,
    },
}

/// Caller-owned radio state: the seed, the delivered queue and what can no
/// longer be delivered.
#[derive(Debug, Clone)]
pub struct RadioSession {
    seed: Option<RadioSeed>,
    options: GenerationOptions,
    queue: Vec<Track>,
    delivered: HashSet<TrackId>,
    state: RadioState,
    popularity_degraded: bool,
    rng: StdRng,
}

impl Default for RadioSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioSession {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A session whose shuffles are reproducible.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            seed: None,
            options: GenerationOptions::default(),
            queue: Vec::new(),
            delivered: HashSet::new(),
            state: RadioState::Idle,
            popularity_degraded: false,
            rng,
        }
    }

    #[must_use]
    pub const fn state(&self) -> RadioState {
        self.state
    }

    #[must_use]
    pub const fn seed(&self) -> Option<&RadioSeed> {
        self.seed.as_ref()
    }

    /// Everything delivered so far, in delivery order.
    #[must_use]
    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    #[must_use]
    pub fn has_delivered(&self, id: &str) -> bool {
        self.delivered.contains(id)
    }

    /// Whether the most recent successful generation ranked without play
    /// counts.
    #[must_use]
    pub const fn popularity_degraded(&self) -> bool {
        self.popularity_degraded
    }

    /// Start a radio. Valid from `Idle` or `Stopped`.
    ///
    /// Returns the new queue. An empty result leaves the session `Idle`:
    /// there was nothing to play, or the catalog could not be reached.
    ///
    /// # Errors
    ///
    /// [`RadioError::Busy`] if a generation is in flight, and
    /// [`RadioError::InvalidTransition`] if the session is already `Ready`.
    pub fn start<C, T>(
        &mut self,
        generator: &RadioGenerator<C, T>,
        seed: RadioSeed,
        options: GenerationOptions,
    ) -> Result<Vec<Track>, RadioError>
    where
        C: CatalogAccessor,
        T: PlayTelemetry,
    {
        match self.state {
            RadioState::Idle | RadioState::Stopped => {}
            state if state.is_in_flight() => return Err(RadioError::Busy),
            state => {
                return Err(RadioError::InvalidTransition {
                    operation: "start",
                    state,
                })
            }
        }

        info!("Starting {seed}");
        self.state = RadioState::Generating;
        let outcome = generator.generate(&seed, &options, &mut self.rng);

        let generation = match outcome {
            Ok(generation) if !generation.tracks.is_empty() => generation,
            Ok(_) => {
                info!("{seed} found no tracks");
                self.state = RadioState::Idle;
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!("{seed} could not be generated: {e:#}");
                self.state = RadioState::Idle;
                return Ok(Vec::new());
            }
        };

        self.delivered = generation.tracks.iter().map(|track| track.id.clone()).collect();
        self.queue = generation.tracks.clone();
        self.popularity_degraded = generation.popularity_degraded;
        self.seed = Some(seed);
        self.options = options;
        self.state = RadioState::Ready;
        Ok(generation.tracks)
    }

    /// Append up to the configured extend limit of new tracks.
    ///
    /// # Errors
    ///
    /// See [`RadioSession::extend_with_limit`].
    pub fn extend<C, T>(&mut self, generator: &RadioGenerator<C, T>) -> Result<Vec<Track>, RadioError>
    where
        C: CatalogAccessor,
        T: PlayTelemetry,
    {
        self.extend_with_limit(generator, generator.tuning().extend_limit)
    }

    /// Append up to `limit` tracks never delivered by this session. Returns
    /// only the newly appended tracks; an exhausted radio returns none and
    /// stays `Ready`.
    ///
    /// # Errors
    ///
    /// [`RadioError::Busy`] if a generation is in flight, and
    /// [`RadioError::InvalidTransition`] unless the session is `Ready`.
    pub fn extend_with_limit<C, T>(
        &mut self,
        generator: &RadioGenerator<C, T>,
        limit: usize,
    ) -> Result<Vec<Track>, RadioError>
    where
        C: CatalogAccessor,
        T: PlayTelemetry,
    {
        let seed = match (self.state, &self.seed) {
            (RadioState::Ready, Some(seed)) => seed.clone(),
            (state, _) if state.is_in_flight() => return Err(RadioError::Busy),
            (state, _) => {
                return Err(RadioError::InvalidTransition {
                    operation: "extend",
                    state,
                })
            }
        };

        let mut options = self.options.clone().with_limit(limit);
        options.exclude_ids.extend(self.delivered.iter().cloned());

        debug!("Extending {seed} by up to {limit} tracks ({} delivered)", self.delivered.len());
        self.state = RadioState::Extending;
        let outcome = generator.generate(&seed, &options, &mut self.rng);
        self.state = RadioState::Ready;

        let generation = match outcome {
            Ok(generation) => generation,
            Err(e) => {
                warn!("Extending {seed} failed, queue unchanged: {e:#}");
                return Ok(Vec::new());
            }
        };
        if generation.tracks.is_empty() {
            info!("{seed} is exhausted");
            return Ok(Vec::new());
        }

        for track in &generation.tracks {
            let fresh = self.delivered.insert(track.id.clone());
            debug_assert!(fresh, "track {} delivered twice", track.id);
        }
        self.queue.extend(generation.tracks.iter().cloned());
        self.popularity_degraded = generation.popularity_degraded;
        Ok(generation.tracks)
    }

    /// Forget the seed and the queue. Valid from any state.
    pub fn stop(&mut self) {
        if let Some(seed) = self.seed.take() {
            info!("Stopping {seed} after {} tracks", self.queue.len());
        }
        self.queue.clear();
        self.delivered.clear();
        self.options = GenerationOptions::default();
        self.popularity_degraded = false;
        self.state = RadioState::Stopped;
    }
}

/// Caller-facing radio controls. Starting a radio replaces the current one.
#[derive(Debug)]
pub struct RadioStation<C, T> {
    generator: RadioGenerator<C, T>,
    session: RadioSession,
    defaults: GenerationOptions,
}

impl<C: CatalogAccessor, T: PlayTelemetry> RadioStation<C, T> {
    pub fn new(generator: RadioGenerator<C, T>) -> Self {
        Self::with_session(generator, RadioSession::new())
    }

    /// Use a prepared session, e.g. one with a fixed shuffle seed.
    pub fn with_session(generator: RadioGenerator<C, T>, session: RadioSession) -> Self {
        let defaults = GenerationOptions::from_tuning(generator.tuning());
        Self {
            generator,
            session,
            defaults,
        }
    }

    /// Replace the options used by subsequent `start_*` calls.
    pub fn set_defaults(&mut self, defaults: GenerationOptions) {
        self.defaults = defaults;
    }

    #[must_use]
    pub const fn session(&self) -> &RadioSession {
        &self.session
    }

    pub fn start_artist_radio(&mut self, artist_id: &str, display_name: &str) -> Vec<Track> {
        self.start(RadioSeed::artist(artist_id, display_name))
    }

    pub fn start_genre_radio(&mut self, genre: &str) -> Vec<Track> {
        self.start(RadioSeed::genre(genre))
    }

    fn start(&mut self, seed: RadioSeed) -> Vec<Track> {
        self.session.stop();
        match self.session.start(&self.generator, seed, self.defaults.clone()) {
            Ok(tracks) => tracks,
            // stop() leaves the session Stopped, so start cannot be refused.
            Err(e) => {
                warn!("Radio start refused: {e}");
                Vec::new()
            }
        }
    }

    /// Newly appended tracks only.
    ///
    /// # Errors
    ///
    /// [`RadioError::InvalidTransition`] when no radio is playing.
    pub fn extend_radio(&mut self) -> Result<Vec<Track>, RadioError> {
        self.session.extend(&self.generator)
    }

    pub fn stop_radio(&mut self) {
        self.session.stop();
    }
}
