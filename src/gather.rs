//! Multi-tier candidate retrieval.
//!
//! Artist radio runs three tiers: the seed artist's own newest tracks, then
//! tracks from other artists sharing the artist's genres, then the globally
//! most played tracks. Genre radio runs the genre tier and the global tier.
//! Tiers run strictly in order and later tiers are skipped as soon as the
//! limit is reached.
//!
//! Every admission goes through the call's [`ExclusionSet`], so a track never
//! appears twice and nothing the session already delivered comes back.

use crate::algorithm::{self, ScoringContext};
use crate::catalog::{CatalogAccessor, PlayTelemetry, TrackFilter};
use crate::config::RadioTuning;
use crate::dedup::ExclusionSet;
use crate::popularity::PopularityResolver;
use crate::track::{Track, TrackId};
use anyhow::{Context, Result};
use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;

/// Identifiers per catalog query when materializing globally popular tracks.
const ID_BATCH: usize = 200;

/// Which retrieval pass admitted a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    SeedArtist,
    GenreAffinity,
    Genre,
    GlobalFallback,
}

/// Admitted tracks of one generation call, in rank order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gathered {
    pub tracks: Vec<Track>,
    /// Tiers that ran, in order, with how many tracks each admitted.
    pub tiers: Vec<(Tier, usize)>,
    /// Set when ranking fell back to zero play counts.
    pub popularity_degraded: bool,
}

impl Gathered {
    fn remaining(&self, limit: usize) -> usize {
        limit.saturating_sub(self.tracks.len())
    }

    fn record(&mut self, tier: Tier, admitted: usize) {
        debug!("{tier:?} tier admitted {admitted} tracks ({} total)", self.tracks.len());
        self.tiers.push((tier, admitted));
    }

    /// Whether `tier` ran during this call.
    #[must_use]
    pub fn ran(&self, tier: Tier) -> bool {
        self.tiers.iter().any(|(t, _)| *t == tier)
    }
}

/// Distinct genres of the seed artist's most recent tracks.
#[derive(Debug, Clone, Default)]
struct GenreAffinity {
    genres: BTreeSet<String>,
    inspected: usize,
    sample: usize,
}

impl GenreAffinity {
    fn new(sample: usize) -> Self {
        Self {
            sample,
            ..Self::default()
        }
    }

    fn observe(&mut self, track: &Track) {
        if self.is_saturated() {
            return;
        }
        self.inspected += 1;
        if let Some(genre) = track.genre() {
            self.genres.insert(genre.to_string());
        }
    }

    fn is_saturated(&self) -> bool {
        self.inspected >= self.sample
    }
}

/// Gathers candidates for one generation call.
pub struct CandidateGatherer<'a, C: ?Sized, T: ?Sized> {
    catalog: &'a C,
    popularity: PopularityResolver<'a, T>,
    tuning: &'a RadioTuning,
    scoring: ScoringContext,
}

impl<'a, C, T> CandidateGatherer<'a, C, T>
where
    C: CatalogAccessor + ?Sized,
    T: PlayTelemetry + ?Sized,
{
    pub fn new(catalog: &'a C, telemetry: &'a T, tuning: &'a RadioTuning, scoring: ScoringContext) -> Self {
        Self {
            catalog,
            popularity: PopularityResolver::new(telemetry),
            tuning,
            scoring,
        }
    }

    /// Artist radio: seed artist, then genre affinity, then global fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if any catalog query fails. Nothing admitted so far is
    /// returned in that case.
    pub fn gather_artist(&self, artist_id: &str, limit: usize, exclusion: &mut ExclusionSet) -> Result<Gathered> {
        let mut gathered = Gathered::default();
        if limit == 0 {
            return Ok(gathered);
        }

        let affinity = self
            .seed_artist_tier(artist_id, limit, exclusion, &mut gathered)
            .with_context(|| format!("Seed artist tier failed for artist '{artist_id}'"))?;
        if gathered.remaining(limit) == 0 {
            return Ok(gathered);
        }

        if affinity.genres.is_empty() {
            debug!("Artist '{artist_id}' has no genre affinity, skipping affinity tier");
        } else {
            self.affinity_tier(artist_id, &affinity.genres, limit, exclusion, &mut gathered)
                .context("Genre affinity tier failed")?;
            if gathered.remaining(limit) == 0 {
                return Ok(gathered);
            }
        }

        self.global_tier(limit, exclusion, &mut gathered)
            .context("Global fallback tier failed")?;
        Ok(gathered)
    }

    /// Genre radio: best-scored tracks of the genre, then global fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if any catalog query fails.
    pub fn gather_genre(&self, genre: &str, limit: usize, exclusion: &mut ExclusionSet) -> Result<Gathered> {
        let mut gathered = Gathered::default();
        if limit == 0 {
            return Ok(gathered);
        }

        let filter = TrackFilter::by_genre(genre);
        let candidates = self
            .collect_fresh(&filter, limit.saturating_mul(2), exclusion, |_| true)
            .with_context(|| format!("Genre tier failed for genre '{genre}'"))?;
        let admitted = self.admit_scored(candidates, limit, exclusion, &mut gathered);
        gathered.record(Tier::Genre, admitted);
        if gathered.remaining(limit) == 0 {
            return Ok(gathered);
        }

        self.global_tier(limit, exclusion, &mut gathered)
            .context("Global fallback tier failed")?;
        Ok(gathered)
    }

    /// Admit the artist's newest tracks up to the artist quota while sampling
    /// their genres.
    fn seed_artist_tier(
        &self,
        artist_id: &str,
        limit: usize,
        exclusion: &mut ExclusionSet,
        gathered: &mut Gathered,
    ) -> Result<GenreAffinity> {
        let quota = self.tuning.artist_quota(limit);
        let mut affinity = GenreAffinity::new(self.tuning.affinity_sample);
        let mut admitted = 0;
        let filter = TrackFilter::by_artist(artist_id);
        let page_size = quota.max(self.tuning.affinity_sample);

        self.scan(&filter, page_size, |track| {
            affinity.observe(&track);
            if admitted < quota && exclusion.admit(track, &mut gathered.tracks) {
                admitted += 1;
            }
            let affinity_needed = quota < limit && !affinity.is_saturated();
            if admitted >= quota && !affinity_needed {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        debug!(
            "Artist '{artist_id}' affinity from {} tracks: {:?}",
            affinity.inspected, affinity.genres
        );
        gathered.record(Tier::SeedArtist, admitted);
        Ok(affinity)
    }

    /// Score and admit other artists' tracks from the affinity genres.
    fn affinity_tier(
        &self,
        artist_id: &str,
        genres: &BTreeSet<String>,
        limit: usize,
        exclusion: &mut ExclusionSet,
        gathered: &mut Gathered,
    ) -> Result<()> {
        let wanted = gathered.remaining(limit).saturating_mul(2);
        let mut seen: HashSet<TrackId> = HashSet::new();
        let mut candidates = Vec::new();

        for genre in genres {
            let filter = TrackFilter::by_genre(genre.as_str());
            let fresh = self.collect_fresh(&filter, wanted, exclusion, |track| track.artist_id != artist_id)?;
            candidates.extend(fresh.into_iter().filter(|track| seen.insert(track.id.clone())));
        }

        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        candidates.truncate(wanted);

        let admitted = self.admit_scored(candidates, limit, exclusion, gathered);
        gathered.record(Tier::GenreAffinity, admitted);
        Ok(())
    }

    /// Most played tracks first, then the rest of the catalog newest first.
    fn global_tier(&self, limit: usize, exclusion: &mut ExclusionSet, gathered: &mut Gathered) -> Result<()> {
        let before = gathered.tracks.len();
        let counts = self.popularity.resolve_global();
        gathered.popularity_degraded |= counts.is_degraded();

        let ranked: Vec<(TrackId, u64)> = counts
            .ranked()
            .into_iter()
            .filter(|(id, _)| !exclusion.contains(id))
            .collect();

        // Rounds end on a play-count boundary so that tracks tied at the cut
        // are fetched together and ordered by age before admission. Each
        // query still carries at most ID_BATCH ids.
        let mut popular = Vec::new();
        let mut cursor = 0;
        while cursor < ranked.len() && popular.len() < gathered.remaining(limit) {
            let mut end = (cursor + ID_BATCH).min(ranked.len());
            while end < ranked.len() && ranked[end].1 == ranked[end - 1].1 {
                end += 1;
            }
            for chunk in ranked[cursor..end].chunks(ID_BATCH) {
                let batch: Vec<TrackId> = chunk.iter().map(|(id, _)| id.clone()).collect();
                popular.extend(self.catalog.query_tracks(&TrackFilter::by_ids(batch), chunk.len(), 0)?);
            }
            cursor = end;
        }
        algorithm::sort_by_plays(&mut popular, &counts);
        exclusion.admit_until(popular, &mut gathered.tracks, limit);

        if gathered.remaining(limit) > 0 {
            let page_size = gathered.remaining(limit).max(1);
            self.scan(&TrackFilter::approved(), page_size, |track| {
                exclusion.admit(track, &mut gathered.tracks);
                if gathered.tracks.len() >= limit {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })?;
        }

        let admitted = gathered.tracks.len() - before;
        gathered.record(Tier::GlobalFallback, admitted);
        Ok(())
    }

    /// Rank `candidates` and admit the best until `limit`.
    fn admit_scored(
        &self,
        candidates: Vec<Track>,
        limit: usize,
        exclusion: &mut ExclusionSet,
        gathered: &mut Gathered,
    ) -> usize {
        let ids: Vec<TrackId> = candidates.iter().map(|track| track.id.clone()).collect();
        let counts = self.popularity.resolve(&ids);
        gathered.popularity_degraded |= counts.is_degraded();

        let ranked = algorithm::rank_tracks(candidates, &counts, &self.scoring);
        exclusion.admit_until(ranked.into_iter().map(|scored| scored.track), &mut gathered.tracks, limit)
    }

    /// Up to `wanted` tracks matching `filter` and `keep`, newest first, that
    /// are not excluded. Pages past excluded tracks.
    fn collect_fresh<F>(
        &self,
        filter: &TrackFilter,
        wanted: usize,
        exclusion: &ExclusionSet,
        keep: F,
    ) -> Result<Vec<Track>>
    where
        F: Fn(&Track) -> bool,
    {
        let mut fresh = Vec::new();
        if wanted == 0 {
            return Ok(fresh);
        }

        self.scan(filter, wanted, |track| {
            if !exclusion.contains(&track.id) && keep(&track) {
                fresh.push(track);
            }
            if fresh.len() >= wanted {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(fresh)
    }

    /// Feed matching tracks to `visit`, page by page, until it breaks or the
    /// catalog runs out.
    fn scan<F>(&self, filter: &TrackFilter, page_size: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(Track) -> ControlFlow<()>,
    {
        let page_size = page_size.max(1);
        let mut offset = 0;

        loop {
            let page = self.catalog.query_tracks(filter, page_size, offset)?;
            let fetched = page.len();
            offset += fetched;

            for track in page {
                if visit(track).is_break() {
                    return Ok(());
                }
            }
            if fetched < page_size {
                return Ok(());
            }
        }
    }
}
