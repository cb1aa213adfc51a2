//! SQLite catalog and play log.
//!
//! [`SqliteStore`] is the reference implementation of both collaborator
//! traits. The schema is two tables: `tracks` (catalog rows with a moderation
//! status) and `plays` (one row per play event, append only).

use crate::catalog::{CatalogAccessor, PlayTelemetry, TrackFilter};
use crate::track::{Track, TrackId, TrackStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, trace};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracks (
    id            TEXT    PRIMARY KEY,
    title         TEXT    NOT NULL,
    artist_id     TEXT    NOT NULL,
    artist_name   TEXT    NOT NULL DEFAULT '',
    genre         TEXT,
    created_at    INTEGER NOT NULL,
    cover_url     TEXT,
    audio_url     TEXT,
    duration_secs INTEGER,
    status        TEXT    NOT NULL DEFAULT 'approved'
);
CREATE TABLE IF NOT EXISTS plays (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    track_id  TEXT    NOT NULL,
    played_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist_id, created_at);
CREATE INDEX IF NOT EXISTS idx_tracks_genre ON tracks(genre, created_at);
CREATE INDEX IF NOT EXISTS idx_plays_track ON plays(track_id);
";

/// Identifiers bound per `IN (...)` list, well under SQLite's variable limit.
const MAX_IDS_PER_QUERY: usize = 500;

const TRACK_COLUMNS: &str =
    "id, title, artist_id, artist_name, genre, created_at, cover_url, audio_url, duration_secs, status";

/// Catalog and telemetry backed by a single SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// A private, throwaway database. Used by tests and benchmarks.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory catalog")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create catalog schema")?;
        Ok(Self { conn })
    }

    /// Drop every track and play event.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables cannot be cleared.
    pub fn reset(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM plays; DELETE FROM tracks;")
            .context("Failed to clear catalog")?;
        Ok(())
    }

    /// Insert or replace `tracks` in one transaction. Returns how many rows
    /// were written.
    ///
    /// # Errors
    ///
    /// Returns an error if any row cannot be written; nothing is committed
    /// in that case.
    pub fn insert_tracks(&mut self, tracks: &[Track]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO tracks
                 (id, title, artist_id, artist_name, genre, created_at, cover_url, audio_url, duration_secs, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for track in tracks {
                stmt.execute(params![
                    track.id,
                    track.title,
                    track.artist_id,
                    track.artist_name,
                    track.genre(),
                    track.created_at.timestamp(),
                    track.cover_url,
                    track.audio_url,
                    track.duration_secs,
                    track.status.as_str(),
                ])
                .with_context(|| format!("Failed to insert track '{}'", track.id))?;
            }
        }
        tx.commit().context("Committing track import failed")?;

        debug!("Imported {} tracks", tracks.len());
        Ok(tracks.len())
    }

    /// Change the moderation status of a track. Returns whether it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_status(&self, track_id: &str, status: TrackStatus) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE tracks SET status = ?1 WHERE id = ?2",
                params![status.as_str(), track_id],
            )
            .with_context(|| format!("Failed to update status of '{track_id}'"))?;
        Ok(changed > 0)
    }

    /// Append one play event for `track_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be written.
    pub fn record_play(&self, track_id: &str, played_at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO plays (track_id, played_at) VALUES (?1, ?2)",
                params![track_id, played_at.timestamp()],
            )
            .with_context(|| format!("Failed to record play of '{track_id}'"))?;
        trace!("Recorded play of `{track_id}'");
        Ok(())
    }

    /// Look up a track regardless of its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_track(&self, track_id: &str) -> Result<Option<Track>> {
        self.conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
                [track_id],
                track_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to look up track '{track_id}'"))
    }

    /// Total number of catalog rows, any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_tracks(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .context("Failed to count tracks")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl CatalogAccessor for SqliteStore {
    fn query_tracks(&self, filter: &TrackFilter, limit: usize, offset: usize) -> Result<Vec<Track>> {
        match &filter.ids {
            Some(ids) if ids.len() > MAX_IDS_PER_QUERY => {
                let mut tracks = Vec::new();
                for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
                    let part = TrackFilter {
                        ids: Some(chunk.to_vec()),
                        ..filter.clone()
                    };
                    tracks.extend(self.select_tracks(&part, chunk.len(), 0)?);
                }
                tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
                tracks.dedup_by(|a, b| a.id == b.id);
                Ok(tracks.into_iter().skip(offset).take(limit).collect())
            }
            _ => self.select_tracks(filter, limit, offset),
        }
    }
}

impl SqliteStore {
    fn select_tracks(&self, filter: &TrackFilter, limit: usize, offset: usize) -> Result<Vec<Track>> {
        let mut sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE status = ?");
        let mut values: Vec<Value> = vec![Value::Text(filter.status.as_str().to_string())];

        if let Some(artist_id) = &filter.artist_id {
            sql.push_str(" AND artist_id = ?");
            values.push(Value::Text(artist_id.clone()));
        }
        if let Some(genre) = &filter.genre {
            sql.push_str(" AND genre = ?");
            values.push(Value::Text(genre.trim().to_string()));
        }
        if let Some(ids) = &filter.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND id IN ({placeholders})"));
            values.extend(ids.iter().cloned().map(Value::Text));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?");
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Invalid catalog query")?;
        let rows = stmt
            .query_map(params_from_iter(values), track_from_row)
            .context("Catalog query failed")?;

        let mut tracks = Vec::new();
        for track in rows {
            tracks.push(track.context("Failed to read catalog row")?);
        }
        Ok(tracks)
    }
}

impl PlayTelemetry for SqliteStore {
    fn count_plays_by_track(&self, track_ids: &[TrackId]) -> Result<HashMap<TrackId, u64>> {
        if track_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut counts = HashMap::new();
        for chunk in track_ids.chunks(MAX_IDS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT track_id, COUNT(*) FROM plays WHERE track_id IN ({placeholders}) GROUP BY track_id"
            );
            let mut stmt = self.conn.prepare(&sql).context("Invalid play count query")?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), count_from_row)
                .context("Play count query failed")?;
            counts.extend(collect_counts(rows)?);
        }
        Ok(counts)
    }

    fn count_plays_global(&self) -> Result<HashMap<TrackId, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT track_id, COUNT(*) FROM plays GROUP BY track_id")
            .context("Invalid global play count query")?;
        let rows = stmt
            .query_map([], count_from_row)
            .context("Global play count query failed")?;
        let counts = collect_counts(rows)?;
        Ok(counts)
    }
}

fn collect_counts<I>(rows: I) -> Result<HashMap<TrackId, u64>>
where
    I: Iterator<Item = rusqlite::Result<(TrackId, u64)>>,
{
    let mut counts = HashMap::new();
    for row in rows {
        let (id, count) = row.context("Failed to read play count row")?;
        counts.insert(id, count);
    }
    Ok(counts)
}

fn count_from_row(row: &Row<'_>) -> rusqlite::Result<(TrackId, u64)> {
    let count: i64 = row.get(1)?;
    Ok((row.get(0)?, u64::try_from(count).unwrap_or(0)))
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let created_secs: i64 = row.get(5)?;
    let created_at = Utc
        .timestamp_opt(created_secs, 0)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, created_secs))?;

    let status: String = row.get(9)?;
    let status = status.parse::<TrackStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        artist_id: row.get(2)?,
        artist_name: row.get(3)?,
        genre: row.get(4)?,
        created_at,
        cover_url: row.get(6)?,
        audio_url: row.get(7)?,
        duration_secs: row.get(8)?,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn track(id: &str, artist: &str, genre: Option<&str>, days_old: i64) -> Track {
        let epoch = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        Track {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist_id: artist.to_string(),
            artist_name: String::new(),
            genre: genre.map(str::to_string),
            created_at: epoch - Duration::days(days_old),
            cover_url: None,
            audio_url: Some(format!("audio/{id}.mp3")),
            duration_secs: Some(180),
            status: TrackStatus::Approved,
        }
    }

    fn store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_tracks(&[
                track("a1", "A", Some("Louange"), 3),
                track("a2", "A", Some("Louange"), 1),
                track("b1", "B", Some("Louange"), 2),
                track("c1", "C", Some(" Jazz "), 0),
                track("c2", "C", None, 5),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_query_orders_newest_first_with_paging() {
        let store = store();
        let all = store.query_tracks(&TrackFilter::approved(), 10, 0).unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "a2", "b1", "a1", "c2"]);

        let page = store.query_tracks(&TrackFilter::approved(), 2, 2).unwrap();
        let ids: Vec<&str> = page.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "a1"]);
    }

    #[test]
    fn test_filters() {
        let store = store();
        let by_artist = store.query_tracks(&TrackFilter::by_artist("A"), 10, 0).unwrap();
        assert_eq!(by_artist.len(), 2);

        let by_genre = store.query_tracks(&TrackFilter::by_genre("Jazz"), 10, 0).unwrap();
        assert_eq!(by_genre.len(), 1);
        assert_eq!(by_genre[0].genre.as_deref(), Some("Jazz"));

        let by_ids = store
            .query_tracks(&TrackFilter::by_ids(vec!["a1".into(), "zz".into(), "c2".into()]), 10, 0)
            .unwrap();
        assert_eq!(by_ids.len(), 2);

        let none = store.query_tracks(&TrackFilter::by_ids(Vec::new()), 10, 0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_unapproved_tracks_are_hidden() {
        let store = store();
        assert!(store.set_status("b1", TrackStatus::Pending).unwrap());
        assert!(!store.set_status("missing", TrackStatus::Rejected).unwrap());

        let louange = store.query_tracks(&TrackFilter::by_genre("Louange"), 10, 0).unwrap();
        assert!(louange.iter().all(|t| t.id != "b1"));
        assert_eq!(store.get_track("b1").unwrap().unwrap().status, TrackStatus::Pending);
        assert_eq!(store.count_tracks().unwrap(), 5);
    }

    #[test]
    fn test_play_counts() {
        let store = store();
        let now = Utc::now();
        for _ in 0..3 {
            store.record_play("a1", now).unwrap();
        }
        store.record_play("b1", now).unwrap();

        let counts = store
            .count_plays_by_track(&["a1".to_string(), "c1".to_string()])
            .unwrap();
        assert_eq!(counts.get("a1"), Some(&3));
        assert!(!counts.contains_key("c1"));
        assert!(!counts.contains_key("b1"));

        let global = store.count_plays_global().unwrap();
        assert_eq!(global.len(), 2);
        assert_eq!(global["b1"], 1);
    }

    #[test]
    fn test_long_id_lists_are_split_across_queries() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let tracks: Vec<Track> = (0..1200).map(|i| track(&format!("t{i:04}"), "A", None, i)).collect();
        store.insert_tracks(&tracks).unwrap();
        let now = Utc::now();
        for track in tracks.iter().step_by(100) {
            store.record_play(&track.id, now).unwrap();
        }

        let mut ids: Vec<TrackId> = tracks.iter().rev().map(|t| t.id.clone()).collect();
        ids.push("t0000".to_string());
        let page = store.query_tracks(&TrackFilter::by_ids(ids.clone()), 3, 1000).unwrap();
        let page_ids: Vec<&str> = page.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(page_ids, vec!["t1000", "t1001", "t1002"]);
        assert_eq!(store.query_tracks(&TrackFilter::by_ids(ids.clone()), 5000, 0).unwrap().len(), 1200);

        let counts = store.count_plays_by_track(&ids).unwrap();
        assert_eq!(counts.len(), 12);
        assert_eq!(counts["t1100"], 1);
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let store = store();
        let stored = store.get_track("a2").unwrap().unwrap();
        assert_eq!(stored, track("a2", "A", Some("Louange"), 1));
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = store();
        store.record_play("a1", Utc::now()).unwrap();
        store.reset().unwrap();
        assert_eq!(store.count_tracks().unwrap(), 0);
        assert!(store.count_plays_global().unwrap().is_empty());
    }
}
