//! Play-count lookup for ranking.
//!
//! Popularity is an optimization signal, never a correctness requirement: a
//! failing telemetry store degrades every count to zero instead of aborting
//! the radio.

use crate::catalog::PlayTelemetry;
use crate::track::TrackId;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Play counts resolved for one generation call. Never cached across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayCounts {
    counts: HashMap<TrackId, u64>,
    degraded: bool,
}

impl PlayCounts {
    #[must_use]
    pub fn new(counts: HashMap<TrackId, u64>) -> Self {
        Self { counts, degraded: false }
    }

    /// All-zero counts standing in for an unreachable telemetry store.
    #[must_use]
    pub fn degraded() -> Self {
        Self { counts: HashMap::new(), degraded: true }
    }

    /// Play count of `id`, zero when telemetry has never seen it.
    #[must_use]
    pub fn get(&self, id: &str) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Whether these counts are a zero fallback for a failed telemetry query.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Tracks with at least one play, most played first, ties by identifier.
    #[must_use]
    pub fn ranked(&self) -> Vec<(TrackId, u64)> {
        let mut ranked: Vec<(TrackId, u64)> = self
            .counts
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(id, &count)| (id.clone(), count))
            .collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| b.cmp(a).then_with(|| a_id.cmp(b_id)));
        ranked
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Batches track identifiers into a single telemetry query.
#[derive(Debug, Clone, Copy)]
pub struct PopularityResolver<'a, T: ?Sized> {
    telemetry: &'a T,
}

impl<'a, T: PlayTelemetry + ?Sized> PopularityResolver<'a, T> {
    pub const fn new(telemetry: &'a T) -> Self {
        Self { telemetry }
    }

    /// Counts for exactly the requested tracks. Identifiers the store returns
    /// but were not asked for are dropped.
    pub fn resolve(&self, track_ids: &[TrackId]) -> PlayCounts {
        if track_ids.is_empty() {
            return PlayCounts::default();
        }

        match self.telemetry.count_plays_by_track(track_ids) {
            Ok(counts) => {
                let wanted: HashSet<&str> = track_ids.iter().map(String::as_str).collect();
                let counts: HashMap<TrackId, u64> = counts
                    .into_iter()
                    .filter(|(id, _)| wanted.contains(id.as_str()))
                    .collect();
                debug!("Resolved play counts for {}/{} tracks", counts.len(), track_ids.len());
                PlayCounts::new(counts)
            }
            Err(e) => {
                warn!("Play telemetry unavailable, ranking without popularity: {e:#}");
                PlayCounts::degraded()
            }
        }
    }

    /// Counts across the whole catalog, for the global fallback tier.
    pub fn resolve_global(&self) -> PlayCounts {
        match self.telemetry.count_plays_global() {
            Ok(counts) => PlayCounts::new(counts),
            Err(e) => {
                warn!("Global play telemetry unavailable, falling back to recency: {e:#}");
                PlayCounts::degraded()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::FakeTelemetry;

    fn ids(raw: &[&str]) -> Vec<TrackId> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_missing_tracks_count_as_zero() {
        let telemetry = FakeTelemetry::new(&[("a", 5)]);
        let counts = PopularityResolver::new(&telemetry).resolve(&ids(&["a", "b"]));

        assert_eq!(counts.get("a"), 5);
        assert_eq!(counts.get("b"), 0);
        assert!(!counts.is_degraded());
    }

    #[test]
    fn test_failure_degrades_to_zero() {
        let telemetry = FakeTelemetry { fail: true, ..FakeTelemetry::new(&[("a", 5)]) };
        let resolver = PopularityResolver::new(&telemetry);

        let counts = resolver.resolve(&ids(&["a"]));
        assert_eq!(counts.get("a"), 0);
        assert!(counts.is_degraded());
        assert!(resolver.resolve_global().is_degraded());
    }

    #[test]
    fn test_result_restricted_to_requested_ids() {
        struct Chatty;
        impl PlayTelemetry for Chatty {
            fn count_plays_by_track(&self, _: &[TrackId]) -> anyhow::Result<HashMap<TrackId, u64>> {
                Ok([("a".to_string(), 1), ("zzz".to_string(), 9)].into_iter().collect())
            }
            fn count_plays_global(&self) -> anyhow::Result<HashMap<TrackId, u64>> {
                Ok(HashMap::new())
            }
        }
        let counts = PopularityResolver::new(&Chatty).resolve(&ids(&["a"]));
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("zzz"), 0);
    }

    #[test]
    fn test_empty_request_skips_query() {
        let telemetry = FakeTelemetry { fail: true, ..FakeTelemetry::default() };
        let counts = PopularityResolver::new(&telemetry).resolve(&[]);
        assert!(counts.is_empty());
        assert!(!counts.is_degraded());
    }

    #[test]
    fn test_ranked_orders_by_count_then_id() {
        let counts = PlayCounts::new(
            [("b", 3), ("a", 3), ("c", 9), ("z", 0)]
                .into_iter()
                .map(|(id, n)| (id.to_string(), n))
                .collect(),
        );
        let ranked = counts.ranked();
        let order: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
