//! Exclusion tracking across tiers and across "load more" calls.

use crate::track::{Track, TrackId};
use std::collections::HashSet;

/// Identifiers that may no longer be admitted.
///
/// Owned by a single generation call: it starts as a copy of everything the
/// session has already delivered and grows with every admission. The session
/// only adopts the result once the whole call has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: HashSet<TrackId>,
}

impl ExclusionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Admit `track` into `queue` unless it is excluded. Returns whether it was
    /// admitted.
    pub fn admit(&mut self, track: Track, queue: &mut Vec<Track>) -> bool {
        if self.ids.insert(track.id.clone()) {
            queue.push(track);
            true
        } else {
            false
        }
    }

    /// Admit candidates in order until `queue` holds `limit` tracks.
    /// Returns how many were admitted.
    pub fn admit_until<I>(&mut self, candidates: I, queue: &mut Vec<Track>, limit: usize) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let before = queue.len();
        for track in candidates {
            if queue.len() >= limit {
                break;
            }
            self.admit(track, queue);
        }
        queue.len() - before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<HashSet<TrackId>> for ExclusionSet {
    fn from(ids: HashSet<TrackId>) -> Self {
        Self { ids }
    }
}

impl FromIterator<TrackId> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = TrackId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
