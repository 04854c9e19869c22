use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::Database;
use crate::error::Result;
use crate::model::{Application, ApplicationPath, ApplicationWindow};
use crate::probe::WindowIdentity;

const WINDOW_COLUMNS: &str = "\
    w.id, w.title,
    a.id, a.name,
    p.id, p.path";

const WINDOW_JOINS: &str = "\
    FROM application_window w
    JOIN application a ON a.id = w.application_id
    JOIN application_path p ON p.id = a.application_path_id";

/// Maps the six [`WINDOW_COLUMNS`] starting at `offset`.
pub(crate) fn map_window(row: &Row, offset: usize) -> rusqlite::Result<ApplicationWindow> {
    Ok(ApplicationWindow {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        application: Application {
            id: row.get(offset + 2)?,
            name: row.get(offset + 3)?,
            path: ApplicationPath {
                id: row.get(offset + 4)?,
                path: row.get(offset + 5)?,
            },
        },
    })
}

pub(crate) fn window_select() -> String {
    format!("SELECT {WINDOW_COLUMNS} {WINDOW_JOINS}")
}

impl Database {
    /// Resolves a probed identity to its window row, creating the path,
    /// application and window rows on first sight.
    pub fn get_or_create_window(&mut self, identity: &WindowIdentity) -> Result<ApplicationWindow> {
        let path = self.get_or_create_application_path(&identity.application_path)?;
        let application = self.get_or_create_application(&identity.application_name, &path)?;
        self.get_or_create_application_window(&identity.title, &application)
    }

    pub fn get_or_create_application_path(&mut self, path: &str) -> Result<ApplicationPath> {
        if let Some(cached) = self.cache.paths.get(path) {
            return Ok(cached.clone());
        }

        let inserted = self.conn.execute(
            "\
            INSERT INTO application_path (path)
            VALUES (?1)
            ON CONFLICT(path) DO NOTHING",
            params![path],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM application_path WHERE path = ?1",
            params![path],
            |row| row.get::<_, i64>(0),
        )?;
        if inserted > 0 {
            info!(id, path, "new application path");
        }

        let application_path = ApplicationPath {
            id,
            path: path.to_owned(),
        };
        self.cache.remember_path(&application_path);
        Ok(application_path)
    }

    pub fn get_or_create_application(
        &mut self,
        name: &str,
        path: &ApplicationPath,
    ) -> Result<Application> {
        let key = (name.to_owned(), path.id);
        if let Some(cached) = self.cache.applications.get(&key) {
            return Ok(cached.clone());
        }

        let inserted = self.conn.execute(
            "\
            INSERT INTO application (name, application_path_id)
            VALUES (?1, ?2)
            ON CONFLICT(name, application_path_id) DO NOTHING",
            params![name, path.id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM application WHERE name = ?1 AND application_path_id = ?2",
            params![name, path.id],
            |row| row.get::<_, i64>(0),
        )?;
        if inserted > 0 {
            info!(id, name, path = %path.path, "new application");
        }

        let application = Application {
            id,
            name: name.to_owned(),
            path: path.clone(),
        };
        self.cache.remember_application(&application);
        Ok(application)
    }

    pub fn get_or_create_application_window(
        &mut self,
        title: &str,
        application: &Application,
    ) -> Result<ApplicationWindow> {
        if let Some(cached) = self
            .cache
            .windows
            .get(&(application.id, title.to_owned()))
        {
            return Ok(cached.clone());
        }

        self.conn.execute(
            "\
            INSERT INTO application_window (title, application_id)
            VALUES (?1, ?2)
            ON CONFLICT(application_id, title) DO NOTHING",
            params![title, application.id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM application_window WHERE application_id = ?1 AND title = ?2",
            params![application.id, title],
            |row| row.get::<_, i64>(0),
        )?;

        let window = ApplicationWindow {
            id,
            title: title.to_owned(),
            application: application.clone(),
        };
        self.cache.remember_window(&window);
        Ok(window)
    }

    pub fn find_application_path(&self, path: &str) -> Result<Option<ApplicationPath>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, path FROM application_path WHERE path = ?1",
                params![path],
                |row| {
                    Ok(ApplicationPath {
                        id: row.get(0)?,
                        path: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    pub fn application_path(&mut self, id: i64) -> Result<Option<ApplicationPath>> {
        if let Some(cached) = self.cache.paths_by_id.get(&id) {
            return Ok(Some(cached.clone()));
        }

        let found = self
            .conn
            .query_row(
                "SELECT id, path FROM application_path WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ApplicationPath {
                        id: row.get(0)?,
                        path: row.get(1)?,
                    })
                },
            )
            .optional()?;
        if let Some(path) = &found {
            self.cache.remember_path(path);
        }
        Ok(found)
    }

    pub fn application(&mut self, id: i64) -> Result<Option<Application>> {
        if let Some(cached) = self.cache.applications_by_id.get(&id) {
            return Ok(Some(cached.clone()));
        }

        let found = self
            .conn
            .query_row(
                "\
                SELECT a.id, a.name, p.id, p.path
                FROM application a
                JOIN application_path p ON p.id = a.application_path_id
                WHERE a.id = ?1",
                params![id],
                |row| {
                    Ok(Application {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        path: ApplicationPath {
                            id: row.get(2)?,
                            path: row.get(3)?,
                        },
                    })
                },
            )
            .optional()?;
        if let Some(application) = &found {
            self.cache.remember_path(&application.path);
            self.cache.remember_application(application);
        }
        Ok(found)
    }

    pub fn application_window(&mut self, id: i64) -> Result<Option<ApplicationWindow>> {
        if let Some(cached) = self.cache.windows_by_id.get(&id) {
            return Ok(Some(cached.clone()));
        }

        let sql = format!("{} WHERE w.id = ?1", window_select());
        let found = self
            .conn
            .query_row(&sql, params![id], |row| map_window(row, 0))
            .optional()?;
        if let Some(window) = &found {
            self.cache.remember_window(window);
        }
        Ok(found)
    }
}
