//! # sonic-store
//!
//! Persistence (`SQLite`) for Sonic Stream.
//!
//! Two collaborators live here:
//! - the track catalog (load-all / save-all, queue clones excluded)
//! - key-value lyric storage keyed `"title::artist"`, with an in-memory
//!   LRU front so repair-on-load can rewrite documents cheaply

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use directories::ProjectDirs;
use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::Connection;
use sonic_core::{Error, Result, Track};
use sonic_lyrics::LyricsDoc;
use tracing::{debug, info};

/// Hot lyric documents kept in memory.
const LYRIC_CACHE_SIZE: usize = 64;

/// Store for the track catalog and lyric documents.
pub struct Store {
    db: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
    lyric_cache: Arc<Mutex<LruCache<String, LyricsDoc>>>,
}

impl Store {
    /// Open the store at its platform-default location.
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "sonic", "SonicStream")
            .ok_or_else(|| Error::Storage("failed to determine data directory".to_string()))?;
        Self::with_path(project_dirs.data_dir().to_path_buf())
    }

    /// Open the store under a custom directory.
    pub fn with_path(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| Error::Storage(format!("failed to create data directory: {e}")))?;
        let db = Connection::open(data_dir.join("library.db"))
            .map_err(|e| Error::Storage(format!("failed to open database: {e}")))?;
        info!("store opened at {}", data_dir.display());
        Self::from_connection(db, data_dir)
    }

    /// An ephemeral store, used by tests.
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open in-memory database: {e}")))?;
        Self::from_connection(db, PathBuf::new())
    }

    fn from_connection(db: Connection, data_dir: PathBuf) -> Result<Self> {
        db.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lyrics (
                key TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| Error::Storage(format!("failed to initialize schema: {e}")))?;

        // SAFETY: the cache size is a non-zero constant
        #[allow(clippy::expect_used)]
        let cache_size = std::num::NonZeroUsize::new(LYRIC_CACHE_SIZE).expect("non-zero");

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            data_dir,
            lyric_cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
        })
    }

    pub const fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    // ---- track catalog -------------------------------------------------

    /// Load every persisted track.
    pub fn load_tracks(&self) -> Result<Vec<Track>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT record FROM tracks ORDER BY saved_at, id")
            .map_err(|e| Error::Storage(e.to_string()))?;
        let records = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut tracks = Vec::new();
        for record in records {
            let record = record.map_err(|e| Error::Storage(e.to_string()))?;
            tracks.push(serde_json::from_str(&record)?);
        }
        debug!(count = tracks.len(), "tracks loaded");
        Ok(tracks)
    }

    /// Replace the whole catalog. Transient queue clones never persist;
    /// they exist only for the life of a session.
    pub fn save_tracks(&self, tracks: &[Track]) -> Result<()> {
        let mut db = self.db.lock();
        let tx = db
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        tx.execute("DELETE FROM tracks", [])
            .map_err(|e| Error::Storage(e.to_string()))?;

        let saved_at = Utc::now().to_rfc3339();
        let mut count = 0usize;
        for track in tracks.iter().filter(|t| !t.is_queue_item) {
            let record = serde_json::to_string(track)?;
            tx.execute(
                "INSERT INTO tracks (id, record, saved_at) VALUES (?1, ?2, ?3)",
                (track.id.to_string(), record, &saved_at),
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
            count += 1;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))?;
        debug!(count, "tracks saved");
        Ok(())
    }

    // ---- lyrics --------------------------------------------------------

    /// Fetch the lyric document stored under `key`, if any.
    pub fn lyrics_for(&self, key: &str) -> Result<Option<LyricsDoc>> {
        if let Some(doc) = self.lyric_cache.lock().get(key) {
            return Ok(Some(doc.clone()));
        }

        let db = self.db.lock();
        let record: Option<String> = db
            .query_row(
                "SELECT record FROM lyrics WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(Error::Storage(e.to_string())),
            })?;

        match record {
            Some(record) => {
                let doc: LyricsDoc = serde_json::from_str(&record)?;
                self.lyric_cache.lock().put(key.to_string(), doc.clone());
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Store a lyric document under `key`, overwriting any previous one.
    pub fn save_lyrics(&self, key: &str, doc: &LyricsDoc) -> Result<()> {
        let record = serde_json::to_string(doc)?;
        self.db
            .lock()
            .execute(
                "INSERT OR REPLACE INTO lyrics (key, record, saved_at) VALUES (?1, ?2, ?3)",
                (key, record, Utc::now().to_rfc3339()),
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
        self.lyric_cache.lock().put(key.to_string(), doc.clone());
        Ok(())
    }

    pub fn remove_lyrics(&self, key: &str) -> Result<()> {
        self.lyric_cache.lock().pop(key);
        self.db
            .lock()
            .execute("DELETE FROM lyrics WHERE key = ?1", [key])
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sonic_core::FormatInfo;
    use sonic_lyrics::parse_lrc;

    fn store() -> Store {
        Store::in_memory().unwrap()
    }

    fn track(title: &str) -> Track {
        Track::new(title, "Artist", FormatInfo::new("flac"))
    }

    #[test]
    fn test_tracks_round_trip() {
        let store = store();
        let tracks = vec![track("First"), track("Second").with_duration(123.4)];
        store.save_tracks(&tracks).unwrap();

        let loaded = store.load_tracks().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().any(|t| t.title == "First"));
        assert!(loaded
            .iter()
            .any(|t| (t.duration - 123.4).abs() < f64::EPSILON));
    }

    #[test]
    fn test_queue_clones_are_not_persisted() {
        let store = store();
        let library = track("Song");
        let clone = library.clone_for_queue();
        store.save_tracks(&[library, clone]).unwrap();

        let loaded = store.load_tracks().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].is_queue_item);
    }

    #[test]
    fn test_save_tracks_replaces_catalog() {
        let store = store();
        store.save_tracks(&[track("Old")]).unwrap();
        store.save_tracks(&[track("New")]).unwrap();

        let loaded = store.load_tracks().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "New");
    }

    #[test]
    fn test_lyrics_round_trip_by_key() {
        let store = store();
        let doc = parse_lrc("[00:01.00]hello\n[00:03.00]world\n").unwrap();
        let key = track("Song").lyrics_key();

        store.save_lyrics(&key, &doc).unwrap();
        let loaded = store.lyrics_for(&key).unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(store.lyrics_for("other::artist").unwrap().is_none());
    }

    #[test]
    fn test_save_lyrics_overwrites() {
        let store = store();
        let first = parse_lrc("[00:01.00]one\n").unwrap();
        let repaired = LyricsDoc {
            synced: false,
            ..first.clone()
        };

        store.save_lyrics("k", &first).unwrap();
        store.save_lyrics("k", &repaired).unwrap();
        assert!(!store.lyrics_for("k").unwrap().unwrap().synced);
    }

    #[test]
    fn test_remove_lyrics_clears_cache_and_rows() {
        let store = store();
        let doc = parse_lrc("[00:01.00]line\n").unwrap();
        store.save_lyrics("k", &doc).unwrap();
        store.remove_lyrics("k").unwrap();
        assert!(store.lyrics_for("k").unwrap().is_none());
    }
}
