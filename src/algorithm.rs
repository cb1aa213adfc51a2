//! Track ranking for radio queues.
//!
//! Scores candidates from aggregate play counts and track age. Everything in
//! this module is a pure function of its inputs: two calls with the same
//! tracks, counts and clock produce the same ordering.

use crate::popularity::PlayCounts;
use crate::track::Track;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// One play is worth this many days of freshness.
pub const POPULARITY_WEIGHT: f64 = 10.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Caller-selected weighting for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringContext {
    pub prioritize_popular: bool,
    pub prioritize_recent: bool,
    /// Reference instant for track ages, fixed for the whole call.
    pub now: DateTime<Utc>,
}

impl ScoringContext {
    #[must_use]
    pub const fn new(prioritize_popular: bool, prioritize_recent: bool, now: DateTime<Utc>) -> Self {
        Self {
            prioritize_popular,
            prioritize_recent,
            now,
        }
    }
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self::new(true, true, Utc::now())
    }
}

/// A candidate together with the inputs and result of its scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTrack {
    pub track: Track,
    pub plays: u64,
    pub score: f64,
}

/// Fractional age of a track in days. Tracks dated in the future are 0 days old.
#[must_use]
pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now.signed_duration_since(created_at);
    #[allow(clippy::cast_precision_loss)]
    let days = age.num_seconds() as f64 / SECONDS_PER_DAY;
    days.max(0.0)
}

/// ```text
/// score = (popular ? plays : 0) * 10 - (recent ? age_days : 0)
/// ```
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use onde::algorithm::{score_track, ScoringContext};
///
/// let now = Utc::now();
/// let context = ScoringContext::new(true, true, now);
/// let score = score_track(now - Duration::days(3), 2, &context);
/// assert!((score - 17.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn score_track(created_at: DateTime<Utc>, plays: u64, context: &ScoringContext) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let popularity = if context.prioritize_popular { plays as f64 } else { 0.0 };
    let recency = if context.prioritize_recent {
        age_in_days(created_at, context.now)
    } else {
        0.0
    };
    popularity * POPULARITY_WEIGHT - recency
}

/// Radio ordering: higher score first, then newer, then by identifier.
#[must_use]
pub fn compare_scored(a: &ScoredTrack, b: &ScoredTrack) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.track.created_at.cmp(&a.track.created_at))
        .then_with(|| a.track.id.cmp(&b.track.id))
}

/// Score every candidate and sort them best first.
#[must_use]
pub fn rank_tracks(tracks: Vec<Track>, counts: &PlayCounts, context: &ScoringContext) -> Vec<ScoredTrack> {
    let mut ranked: Vec<ScoredTrack> = tracks
        .into_iter()
        .map(|track| {
            let plays = counts.get(&track.id);
            let score = score_track(track.created_at, plays, context);
            log::trace!("Scored `{}' at {score:.3} ({plays} plays)", track.id);
            ScoredTrack { track, plays, score }
        })
        .collect();
    ranked.sort_by(compare_scored);
    ranked
}

/// Order by play count alone, ties newest first then by identifier.
pub fn sort_by_plays(tracks: &mut [Track], counts: &PlayCounts) {
    tracks.sort_by(|a, b| {
        counts
            .get(&b.id)
            .cmp(&counts.get(&a.id))
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}
