//! SQLite persistence for the activity log, categories and tagged time.

mod applications;
mod categories;
mod entries;
mod report;
mod tagged;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::backup::Backup;
use rusqlite::types::Type;
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::interval::from_epoch;
use crate::model::{Application, ApplicationPath, ApplicationWindow};

pub use categories::CategoryUpdate;
pub use report::{CategoryNode, DayEntries};

const SCHEMA: &str = "\
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA temp_store = MEMORY;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS application_path (
      id INTEGER PRIMARY KEY,
      path TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS application (
      id INTEGER PRIMARY KEY,
      name TEXT NOT NULL,
      application_path_id INTEGER NOT NULL,
      UNIQUE(name, application_path_id),
      FOREIGN KEY(application_path_id) REFERENCES application_path(id)
    );

    CREATE TABLE IF NOT EXISTS application_window (
      id INTEGER PRIMARY KEY,
      title TEXT NOT NULL,
      application_id INTEGER NOT NULL,
      UNIQUE(application_id, title),
      FOREIGN KEY(application_id) REFERENCES application(id)
    );

    CREATE TABLE IF NOT EXISTS logged_entry (
      id INTEGER PRIMARY KEY,
      start_ts INTEGER NOT NULL,
      stop_ts INTEGER NOT NULL CHECK (stop_ts >= start_ts),
      application_window_id INTEGER NOT NULL,
      FOREIGN KEY(application_window_id) REFERENCES application_window(id)
    );

    CREATE TABLE IF NOT EXISTS activity_entry (
      id INTEGER PRIMARY KEY,
      start_ts INTEGER NOT NULL,
      stop_ts INTEGER NOT NULL CHECK (stop_ts >= start_ts),
      active INTEGER NOT NULL CHECK (active IN (0, 1))
    );

    CREATE TABLE IF NOT EXISTS category (
      id INTEGER PRIMARY KEY,
      name TEXT NOT NULL CHECK (length(trim(name)) > 0),
      url TEXT,
      parent_id INTEGER,
      FOREIGN KEY(parent_id) REFERENCES category(id)
    );

    CREATE TABLE IF NOT EXISTS tagged_entry (
      id INTEGER PRIMARY KEY,
      start_ts INTEGER NOT NULL,
      stop_ts INTEGER NOT NULL CHECK (stop_ts >= start_ts),
      category_id INTEGER NOT NULL,
      FOREIGN KEY(category_id) REFERENCES category(id)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_category_name_parent
      ON category(lower(name), ifnull(parent_id, 0));
    CREATE INDEX IF NOT EXISTS idx_logged_entry_stop ON logged_entry(stop_ts);
    CREATE INDEX IF NOT EXISTS idx_logged_entry_start ON logged_entry(start_ts);
    CREATE INDEX IF NOT EXISTS idx_activity_entry_stop ON activity_entry(stop_ts);
    CREATE INDEX IF NOT EXISTS idx_activity_entry_start ON activity_entry(start_ts);
    CREATE INDEX IF NOT EXISTS idx_tagged_entry_category_start ON tagged_entry(category_id, start_ts);
    CREATE INDEX IF NOT EXISTS idx_tagged_entry_category_stop ON tagged_entry(category_id, stop_ts);
    CREATE INDEX IF NOT EXISTS idx_tagged_entry_start ON tagged_entry(start_ts);";

/// Id → entity lookups for the immutable application tables, owned by one
/// [`Database`] handle.
#[derive(Debug, Default)]
struct EntityCache {
    paths: HashMap<String, ApplicationPath>,
    paths_by_id: HashMap<i64, ApplicationPath>,
    applications: HashMap<(String, i64), Application>,
    applications_by_id: HashMap<i64, Application>,
    windows: HashMap<(i64, String), ApplicationWindow>,
    windows_by_id: HashMap<i64, ApplicationWindow>,
}

impl EntityCache {
    fn remember_path(&mut self, path: &ApplicationPath) {
        self.paths.insert(path.path.clone(), path.clone());
        self.paths_by_id.insert(path.id, path.clone());
    }

    fn remember_application(&mut self, application: &Application) {
        self.applications.insert(
            (application.name.clone(), application.path.id),
            application.clone(),
        );
        self.applications_by_id
            .insert(application.id, application.clone());
    }

    fn remember_window(&mut self, window: &ApplicationWindow) {
        self.windows.insert(
            (window.application.id, window.title.clone()),
            window.clone(),
        );
        self.windows_by_id.insert(window.id, window.clone());
    }
}

pub struct Database {
    conn: Connection,
    cache: EntityCache,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            cache: EntityCache::default(),
        })
    }

    /// Copies the live database into `destination` with SQLite's online backup.
    pub fn backup_to(&self, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut target = Connection::open(destination)?;
        let backup = Backup::new(&self.conn, &mut target)?;
        backup.run_to_completion(128, Duration::from_millis(20), None)?;
        Ok(())
    }
}

pub(crate) fn datetime_column(idx: usize, ts: i64) -> rusqlite::Result<NaiveDateTime> {
    from_epoch(ts).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {ts} out of range").into(),
        )
    })
}

fn bool_to_i64(v: bool) -> i64 {
    if v {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_parent_directory_and_schema() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("timetag.db");

        let db = Database::open(&path).expect("open database");

        assert!(path.exists());
        let tables: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 7);
    }

    #[test]
    fn reopening_keeps_existing_schema() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("timetag.db");
        drop(Database::open(&path).expect("first open"));
        Database::open(&path).expect("second open");
    }

    #[test]
    fn backup_produces_readable_copy() {
        let dir = TempDir::new().expect("temp dir");
        let mut db = Database::open(&dir.path().join("live.db")).expect("open");
        db.get_or_create_category("Focus", None).expect("category");

        let copy_path = dir.path().join("backups").join("copy.db");
        db.backup_to(&copy_path).expect("backup");

        let copy = Database::open(&copy_path).expect("open copy");
        assert_eq!(copy.category_tree().expect("tree").len(), 1);
    }
}
