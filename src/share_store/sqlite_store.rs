//! SQLite-backed moodboard share store implementation.

use super::schema::MOODBOARD_VERSIONED_SCHEMAS;
use super::{generate_slug, MoodboardStore};
use crate::moodboard::{MoodDescription, MoodboardResult, SharedMoodboard, Track};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// SQLite-backed moodboard store.
#[derive(Clone)]
pub struct SqliteMoodboardStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    let latest = MOODBOARD_VERSIONED_SCHEMAS
        .last()
        .expect("schema list is non-empty");

    if table_count == 0 {
        info!("Creating moodboard db schema at version {}", latest.version);
        let tx = conn.transaction()?;
        for table in latest.tables {
            tx.execute_batch(table.schema)
                .with_context(|| format!("Failed to create table {}", table.name))?;
            for index in table.indices {
                tx.execute_batch(index)?;
            }
        }
        tx.pragma_update(None, "user_version", latest.version)?;
        tx.commit()?;
    }

    Ok(())
}

impl SqliteMoodboardStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open moodboard database")?;

        migrate_if_needed(&mut write_conn)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on moodboard write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open moodboard database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on moodboard read connection")?;

        let count: usize = read_conn.query_row("SELECT COUNT(*) FROM moodboards", [], |r| r.get(0))?;
        info!("Moodboard store ready: {} boards shared", count);

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    /// Number of stored moodboards.
    pub fn count(&self) -> Result<usize> {
        let conn = self.read_conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM moodboards", [], |r| r.get(0))?)
    }
}

impl MoodboardStore for SqliteMoodboardStore {
    fn save(&self, result: &MoodboardResult) -> Result<String> {
        let id = generate_slug();
        let playlist =
            serde_json::to_string(&result.playlist).context("Failed to serialize playlist")?;
        let images =
            serde_json::to_string(&result.images).context("Failed to serialize images")?;

        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO moodboards (id, original_mood, poetic_caption, playlist, images, view_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                id,
                result.original_mood.as_str(),
                result.poetic_caption,
                playlist,
                images,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<SharedMoodboard>> {
        let conn = self.write_conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        // The increment doubles as the existence check: zero rows updated
        // means the slug is unknown.
        let updated = tx.execute(
            "UPDATE moodboards SET view_count = view_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Ok(None);
        }

        let (mood, caption, playlist_json, images_json, view_count, created_at) = tx.query_row(
            "SELECT original_mood, poetic_caption, playlist, images, view_count, created_at
             FROM moodboards WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )?;
        tx.commit()?;

        let playlist: Vec<Track> =
            serde_json::from_str(&playlist_json).context("Malformed playlist in moodboard db")?;
        let images: Vec<String> =
            serde_json::from_str(&images_json).context("Malformed images in moodboard db")?;
        let original_mood =
            MoodDescription::new(&mood).context("Empty mood in moodboard db")?;
        let created_at = DateTime::<Utc>::from_timestamp(created_at, 0)
            .context("Out-of-range created_at in moodboard db")?;

        Ok(Some(SharedMoodboard {
            id: id.to_string(),
            board: MoodboardResult {
                original_mood,
                poetic_caption: caption,
                playlist,
                images,
            },
            view_count,
            created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteMoodboardStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("moodboards.db");
        let store = SqliteMoodboardStore::new(&db_path).unwrap();
        (store, tmp)
    }

    #[test]
    fn test_save_then_get_round_trip() {
        let (store, _tmp) = create_test_store();
        let board = MoodboardResult::fallback();

        let id = store.save(&board).unwrap();
        let shared = store.get(&id).unwrap().unwrap();

        assert_eq!(shared.id, id);
        assert_eq!(shared.board, board);
        assert_eq!(shared.view_count, 1);
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let (store, _tmp) = create_test_store();
        assert!(store.get("dreamy-echo-1").unwrap().is_none());
    }

    #[test]
    fn test_each_get_increments_view_count() {
        let (store, _tmp) = create_test_store();
        let id = store.save(&MoodboardResult::fallback()).unwrap();

        assert_eq!(store.get(&id).unwrap().unwrap().view_count, 1);
        assert_eq!(store.get(&id).unwrap().unwrap().view_count, 2);
        assert_eq!(store.get(&id).unwrap().unwrap().view_count, 3);
    }

    #[test]
    fn test_get_does_not_increment_missing_record() {
        let (store, _tmp) = create_test_store();
        assert!(store.get("velvet-wave-999").unwrap().is_none());
        let id = store.save(&MoodboardResult::fallback()).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().view_count, 1);
    }

    #[test]
    fn test_playlist_and_image_order_survive_persistence() {
        let (store, _tmp) = create_test_store();
        let mut board = MoodboardResult::fallback();
        board.playlist.reverse();
        board.images.rotate_left(2);

        let id = store.save(&board).unwrap();
        let shared = store.get(&id).unwrap().unwrap();

        let names: Vec<&str> = shared
            .board
            .playlist
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names[0], "Black");
        assert_eq!(names[5], "Holocene");
        assert_eq!(shared.board.images, board.images);
    }

    #[test]
    fn test_saved_boards_get_distinct_slugs() {
        let (store, _tmp) = create_test_store();
        let board = MoodboardResult::fallback();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..5 {
            // Slug collisions are possible but vanishingly unlikely in 5 draws
            // over a ~100k space.
            ids.insert(store.save(&board).unwrap());
        }
        assert!(ids.len() >= 4);
        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn test_store_reopens_existing_db() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("moodboards.db");

        let id = {
            let store = SqliteMoodboardStore::new(&db_path).unwrap();
            store.save(&MoodboardResult::fallback()).unwrap()
        };

        let store = SqliteMoodboardStore::new(&db_path).unwrap();
        let shared = store.get(&id).unwrap().unwrap();
        assert_eq!(shared.view_count, 1);
    }
}
