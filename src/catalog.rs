//! Collaborator interfaces consumed by the radio.
//!
//! The radio never owns catalog data. It reads tracks through a
//! [`CatalogAccessor`] and aggregate play counts through a [`PlayTelemetry`]
//! store. [`crate::db::SqliteStore`] implements both; tests substitute fakes.

use crate::track::{Track, TrackId, TrackStatus};
use anyhow::Result;
use std::collections::HashMap;

/// Selection applied by [`CatalogAccessor::query_tracks`].
///
/// Every field narrows the result. Results are always ordered newest first,
/// ties broken by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pub artist_id: Option<String>,
    pub genre: Option<String>,
    /// Restrict to these identifiers.
    pub ids: Option<Vec<TrackId>>,
    pub status: TrackStatus,
}

impl TrackFilter {
    /// All approved tracks.
    #[must_use]
    pub fn approved() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_artist(artist_id: impl Into<String>) -> Self {
        Self {
            artist_id: Some(artist_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_genre(genre: impl Into<String>) -> Self {
        Self {
            genre: Some(genre.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_ids(ids: Vec<TrackId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }
}

/// Read-only query surface over the track catalog.
pub trait CatalogAccessor {
    /// Fetch at most `limit` tracks matching `filter`, newest first, skipping
    /// the first `offset` matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be queried.
    fn query_tracks(&self, filter: &TrackFilter, limit: usize, offset: usize) -> Result<Vec<Track>>;
}

/// Aggregate view over the append-only play event log.
pub trait PlayTelemetry {
    /// Play counts for the given tracks. Tracks without plays may be absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the telemetry store cannot be queried.
    fn count_plays_by_track(&self, track_ids: &[TrackId]) -> Result<HashMap<TrackId, u64>>;

    /// Play counts for every track that has been played at least once.
    ///
    /// # Errors
    ///
    /// Returns an error if the telemetry store cannot be queried.
    fn count_plays_global(&self) -> Result<HashMap<TrackId, u64>>;
}

impl<C: CatalogAccessor + ?Sized> CatalogAccessor for &C {
    fn query_tracks(&self, filter: &TrackFilter, limit: usize, offset: usize) -> Result<Vec<Track>> {
        (**self).query_tracks(filter, limit, offset)
    }
}

impl<T: PlayTelemetry + ?Sized> PlayTelemetry for &T {
    fn count_plays_by_track(&self, track_ids: &[TrackId]) -> Result<HashMap<TrackId, u64>> {
        (**self).count_plays_by_track(track_ids)
    }

    fn count_plays_global(&self) -> Result<HashMap<TrackId, u64>> {
        (**self).count_plays_global()
    }
}
