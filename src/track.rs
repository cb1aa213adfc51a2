//! Catalog track representation.
//!
//! Tracks are read-only from the radio's point of view: they come out of a
//! [`CatalogAccessor`](crate::catalog::CatalogAccessor) and are handed back to
//! callers untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique catalog identifier of a track.
pub type TrackId = String;

/// Moderation state of a track. Only [`TrackStatus::Approved`] tracks are ever
/// visible to a radio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    #[default]
    Approved,
    Pending,
    Rejected,
}

impl TrackStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Self::Approved),
            "pending" => Ok(Self::Pending),
            "rejected" => Ok(Self::Rejected),
            other => anyhow::bail!("Unknown track status: '{other}'. Use approved, pending or rejected"),
        }
    }
}

/// How a track, and its display metadata, is stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist_id: String,
    /// Display name of the artist. May be empty when profile lookup failed.
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Cover locator, opaque to the radio.
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Audio locator, opaque to the radio.
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub status: TrackStatus,
}

impl Track {
    /// Genre of the track, if it carries a non-blank one.
    #[must_use]
    pub fn genre(&self) -> Option<&str> {
        self.genre
            .as_deref()
            .map(str::trim)
            .filter(|genre| !genre.is_empty())
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == TrackStatus::Approved
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let artist = if self.artist_name.is_empty() {
            self.artist_id.as_str()
        } else {
            self.artist_name.as_str()
        };
        write!(f, "{artist} - {}", self.title)?;
        if let Some(genre) = self.genre() {
            write!(f, " [{genre}]")?;
        }
        Ok(())
    }
}
