use crate::error::{AppError, AppResult};
use crate::models::{AddOutcome, Favorite, FavoriteWithStats, NewFavorite, ViewSnapshot};
use crate::utils::format_instant;
use chrono::{DateTime, Duration, Utc};
use log::info;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Favorites stay eligible for scheduled refresh this long after (re)creation.
pub const TRACKING_WINDOW_DAYS: i64 = 14;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS favorites (
    video_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    channel_id TEXT NOT NULL DEFAULT '',
    channel_title TEXT NOT NULL DEFAULT '',
    thumbnail_url TEXT NOT NULL DEFAULT '',
    published_at TEXT,
    created_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS view_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id TEXT NOT NULL,
    view_count INTEGER NOT NULL,
    like_count INTEGER,
    comment_count INTEGER,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_view_history_video_id ON view_history(video_id);
";

const FAVORITE_COLUMNS: &str =
    "f.video_id, f.title, f.channel_id, f.channel_title, f.thumbnail_url, f.published_at, f.created_at, f.is_active";

/// Soft-delete favorites plus their append-only view history.
///
/// A favorite moves Absent -> Active on first add, Active -> Inactive on remove and
/// Inactive -> Active (with a fresh `created_at`) on a repeated add. Rows are never deleted.
pub struct FavoriteStore {
    conn: Mutex<Connection>,
}

impl FavoriteStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened favorites database at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(FavoriteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::StorageUnavailable("favorites database lock poisoned".to_string()))
    }

    pub fn add(&self, favorite: &NewFavorite) -> AppResult<AddOutcome> {
        self.add_at(favorite, Utc::now())
    }

    pub(crate) fn add_at(&self, favorite: &NewFavorite, now: DateTime<Utc>) -> AppResult<AddOutcome> {
        let conn = self.conn()?;
        let created_at = format_instant(&now);

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO favorites
                (video_id, title, channel_id, channel_title, thumbnail_url, published_at, created_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                favorite.video_id,
                favorite.title,
                favorite.channel_id,
                favorite.channel_title,
                favorite.thumbnail_url,
                favorite.published_at,
                created_at,
            ],
        )?;
        if inserted == 1 {
            return Ok(AddOutcome::Created);
        }

        // Already known: restart the tracking clock, keep the original metadata.
        conn.execute(
            "UPDATE favorites SET is_active = 1, created_at = ?1 WHERE video_id = ?2",
            params![created_at, favorite.video_id],
        )?;
        Ok(AddOutcome::Reactivated)
    }

    /// Deactivate; `false` when the id was never favorited.
    pub fn remove(&self, video_id: &str) -> AppResult<bool> {
        let affected = self.conn()?.execute(
            "UPDATE favorites SET is_active = 0 WHERE video_id = ?1",
            params![video_id],
        )?;
        Ok(affected > 0)
    }

    pub fn list(&self, include_inactive: bool) -> AppResult<Vec<Favorite>> {
        let conn = self.conn()?;
        let sql = if include_inactive {
            format!("SELECT {FAVORITE_COLUMNS} FROM favorites f ORDER BY f.created_at DESC")
        } else {
            format!(
                "SELECT {FAVORITE_COLUMNS} FROM favorites f WHERE f.is_active = 1 ORDER BY f.created_at DESC"
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], favorite_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Active favorites still inside the tracking window.
    pub fn list_trackable(&self) -> AppResult<Vec<Favorite>> {
        self.list_trackable_at(Utc::now())
    }

    pub(crate) fn list_trackable_at(&self, now: DateTime<Utc>) -> AppResult<Vec<Favorite>> {
        let cutoff = format_instant(&(now - Duration::days(TRACKING_WINDOW_DAYS)));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FAVORITE_COLUMNS} FROM favorites f
             WHERE f.is_active = 1 AND f.created_at >= ?1
             ORDER BY f.created_at DESC"
        ))?;
        let rows = stmt.query_map(params![cutoff], favorite_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Append one observation. The id does not have to be an active favorite.
    pub fn record_snapshot(
        &self,
        video_id: &str,
        view_count: u64,
        like_count: Option<u64>,
        comment_count: Option<u64>,
    ) -> AppResult<ViewSnapshot> {
        let recorded_at = Utc::now();
        self.conn()?.execute(
            "INSERT INTO view_history (video_id, view_count, like_count, comment_count, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                video_id,
                to_sql_count(view_count),
                like_count.map(to_sql_count),
                comment_count.map(to_sql_count),
                format_instant(&recorded_at),
            ],
        )?;

        Ok(ViewSnapshot {
            video_id: video_id.to_string(),
            view_count,
            like_count,
            comment_count,
            recorded_at,
        })
    }

    /// Newest first, at most `limit` entries.
    pub fn history(&self, video_id: &str, limit: usize) -> AppResult<Vec<ViewSnapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, view_count, like_count, comment_count, recorded_at
             FROM view_history
             WHERE video_id = ?1
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![video_id, limit], |row| {
            Ok(ViewSnapshot {
                video_id: row.get(0)?,
                view_count: from_sql_count(row.get(1)?),
                like_count: row.get::<_, Option<i64>>(2)?.map(from_sql_count),
                comment_count: row.get::<_, Option<i64>>(3)?.map(from_sql_count),
                recorded_at: instant_column(row, 4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The favorite row joined with its newest snapshot. `None` if never favorited.
    pub fn latest_with_favorite(&self, video_id: &str) -> AppResult<Option<FavoriteWithStats>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {FAVORITE_COLUMNS}, vh.view_count, vh.like_count, vh.comment_count, vh.recorded_at
             FROM favorites f
             LEFT JOIN view_history vh ON vh.id = (
                 SELECT id FROM view_history
                 WHERE video_id = f.video_id
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1
             )
             WHERE f.video_id = ?1"
        );

        let found = conn
            .query_row(&sql, params![video_id], |row| {
                let last_updated = match row.get::<_, Option<String>>(11)? {
                    Some(raw) => Some(parse_instant(&raw, 11)?),
                    None => None,
                };
                Ok(FavoriteWithStats {
                    favorite: favorite_from_row(row)?,
                    latest_view_count: row.get::<_, Option<i64>>(8)?.map(from_sql_count),
                    latest_like_count: row.get::<_, Option<i64>>(9)?.map(from_sql_count),
                    latest_comment_count: row.get::<_, Option<i64>>(10)?.map(from_sql_count),
                    last_updated,
                })
            })
            .optional()?;
        Ok(found)
    }
}

fn favorite_from_row(row: &Row<'_>) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        video_id: row.get(0)?,
        title: row.get(1)?,
        channel_id: row.get(2)?,
        channel_title: row.get(3)?,
        thumbnail_url: row.get(4)?,
        published_at: row.get(5)?,
        created_at: instant_column(row, 6)?,
        is_active: row.get::<_, i64>(7)? != 0,
    })
}

fn instant_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    parse_instant(&raw, index)
}

fn parse_instant(raw: &str, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

// SQLite integers are signed; counts above i64::MAX do not occur in practice.
fn to_sql_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn from_sql_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_favorite(video_id: &str, title: &str) -> NewFavorite {
        NewFavorite {
            video_id: video_id.to_string(),
            title: title.to_string(),
            channel_id: "ch1".to_string(),
            channel_title: "Test Channel".to_string(),
            ..Default::default()
        }
    }

    fn store() -> FavoriteStore {
        FavoriteStore::open_in_memory().expect("in-memory store")
    }

    #[test]
    fn poisoned_lock_reports_storage_error() {
        let store = store();
        std::thread::scope(|s| {
            let holder = s.spawn(|| {
                let _guard = store.conn.lock();
                panic!("writer crashed while holding the connection");
            });
            assert!(holder.join().is_err());
        });

        let err = store.list(false).expect_err("poisoned lock");
        assert!(matches!(err, AppError::StorageUnavailable(_)));
        assert_eq!(err.kind(), "storage_error");
    }

    #[test]
    fn add_creates_active_favorite() {
        let store = store();
        let outcome = store
            .add(&new_favorite("test123", "Test Video"))
            .expect("add");
        assert_eq!(outcome, AddOutcome::Created);

        let favorites = store.list(false).expect("list");
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].video_id, "test123");
        assert_eq!(favorites[0].title, "Test Video");
        assert!(favorites[0].is_active);
    }

    #[test]
    fn remove_then_add_reactivates() {
        let store = store();
        store.add(&new_favorite("v1", "Video 1")).expect("add");
        assert!(store.remove("v1").expect("remove"));
        assert!(store.list(false).expect("list").is_empty());
        assert_eq!(store.list(true).expect("list all").len(), 1);

        let outcome = store.add(&new_favorite("v1", "Renamed")).expect("re-add");
        assert_eq!(outcome, AddOutcome::Reactivated);

        let favorites = store.list(false).expect("list");
        assert_eq!(favorites.len(), 1);
        // metadata from the first add is kept
        assert_eq!(favorites[0].title, "Video 1");
    }

    #[test]
    fn reactivation_restarts_tracking_clock() {
        let store = store();
        let old = Utc::now() - Duration::days(20);
        store.add_at(&new_favorite("v1", "Video 1"), old).expect("add");
        store.remove("v1").expect("remove");
        assert!(store.list_trackable().expect("trackable").is_empty());

        store.add(&new_favorite("v1", "Video 1")).expect("re-add");
        let trackable = store.list_trackable().expect("trackable");
        assert_eq!(trackable.len(), 1);
        assert!(trackable[0].created_at > old);
    }

    #[test]
    fn remove_only_affects_known_ids() {
        let store = store();
        store.add(&new_favorite("v1", "Video 1")).expect("add");
        store.add(&new_favorite("v2", "Video 2")).expect("add");

        assert!(store.remove("v1").expect("remove"));
        assert!(!store.remove("unknown").expect("remove unknown"));

        let favorites = store.list(false).expect("list");
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].video_id, "v2");
    }

    #[test]
    fn list_is_newest_first() {
        let store = store();
        let now = Utc::now();
        store
            .add_at(&new_favorite("older", "Older"), now - Duration::hours(2))
            .expect("add");
        store.add_at(&new_favorite("newer", "Newer"), now).expect("add");

        let ids: Vec<String> = store
            .list(false)
            .expect("list")
            .into_iter()
            .map(|f| f.video_id)
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[test]
    fn history_is_newest_first() {
        let store = store();
        store.add(&new_favorite("v1", "Video 1")).expect("add");

        store
            .record_snapshot("v1", 1000, Some(100), Some(10))
            .expect("snapshot");
        store
            .record_snapshot("v1", 1500, Some(150), Some(15))
            .expect("snapshot");

        let history = store.history("v1", DEFAULT_HISTORY_LIMIT).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].view_count, 1500);
        assert_eq!(history[0].like_count, Some(150));
        assert_eq!(history[1].view_count, 1000);
        assert!(history[0].recorded_at >= history[1].recorded_at);
    }

    #[test]
    fn history_respects_limit() {
        let store = store();
        for views in 0..5 {
            store.record_snapshot("v1", views, None, None).expect("snapshot");
        }
        let history = store.history("v1", 3).expect("history");
        let views: Vec<u64> = history.iter().map(|s| s.view_count).collect();
        assert_eq!(views, vec![4, 3, 2]);
    }

    #[test]
    fn snapshots_need_no_active_favorite() {
        let store = store();
        store.record_snapshot("orphan", 42, None, None).expect("snapshot");
        assert_eq!(store.history("orphan", 10).expect("history").len(), 1);
        assert!(store.latest_with_favorite("orphan").expect("latest").is_none());
    }

    #[test]
    fn tracking_window_excludes_expired_and_inactive() {
        let store = store();
        let now = Utc::now();
        store.add_at(&new_favorite("v1", "Recent"), now).expect("add");
        store
            .add_at(&new_favorite("v_old", "Old"), now - Duration::days(15))
            .expect("add");
        store.add_at(&new_favorite("v_off", "Removed"), now).expect("add");
        store.remove("v_off").expect("remove");

        let trackable = store.list_trackable_at(now).expect("trackable");
        assert_eq!(trackable.len(), 1);
        assert_eq!(trackable[0].video_id, "v1");
    }

    #[test]
    fn latest_with_favorite_joins_newest_snapshot() {
        let store = store();
        store.add(&new_favorite("v1", "Video 1")).expect("add");

        let bare = store
            .latest_with_favorite("v1")
            .expect("latest")
            .expect("favorite exists");
        assert_eq!(bare.latest_view_count, None);
        assert_eq!(bare.last_updated, None);

        store.record_snapshot("v1", 10, None, None).expect("snapshot");
        store.record_snapshot("v1", 20, Some(2), None).expect("snapshot");

        let latest = store
            .latest_with_favorite("v1")
            .expect("latest")
            .expect("favorite exists");
        assert_eq!(latest.favorite.video_id, "v1");
        assert_eq!(latest.latest_view_count, Some(20));
        assert_eq!(latest.latest_like_count, Some(2));
        assert_eq!(latest.latest_comment_count, None);
        assert!(latest.last_updated.is_some());

        assert!(store.latest_with_favorite("missing").expect("latest").is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("favorites.db");

        {
            let store = FavoriteStore::open(&path).expect("open");
            store.add(&new_favorite("v1", "Video 1")).expect("add");
            store.record_snapshot("v1", 7, None, None).expect("snapshot");
        }

        let reopened = FavoriteStore::open(&path).expect("reopen");
        assert_eq!(reopened.list(false).expect("list").len(), 1);
        assert_eq!(reopened.history("v1", 10).expect("history")[0].view_count, 7);
    }
}
