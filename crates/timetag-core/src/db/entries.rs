use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::applications::map_window;
use super::{bool_to_i64, datetime_column, Database};
use crate::continuity::{decide, Decision, LastEntry};
use crate::error::Result;
use crate::interval::{day_end, day_start, to_epoch, Interval};
use crate::model::{ActivityEntry, LoggedEntry};

/// A table written by the continuity engine, keyed by one integer column.
struct Stream {
    table: &'static str,
    identity_column: &'static str,
}

const LOGGED: Stream = Stream {
    table: "logged_entry",
    identity_column: "application_window_id",
};

const ACTIVITY: Stream = Stream {
    table: "activity_entry",
    identity_column: "active",
};

impl Database {
    /// Folds one window sample into the logged-entry table.
    pub fn record_window_sample(
        &mut self,
        window_id: i64,
        now: NaiveDateTime,
        max_delta: Duration,
    ) -> Result<Decision> {
        let decision = record_sample(&mut self.conn, &LOGGED, window_id, now, max_delta)?;
        debug!(window_id, ?decision, "logged entry");
        Ok(decision)
    }

    /// Folds one active/inactive sample into the activity-entry table.
    pub fn record_activity_sample(
        &mut self,
        active: bool,
        now: NaiveDateTime,
        max_delta: Duration,
    ) -> Result<Decision> {
        let decision = record_sample(
            &mut self.conn,
            &ACTIVITY,
            bool_to_i64(active),
            now,
            max_delta,
        )?;
        debug!(active, ?decision, "activity entry");
        Ok(decision)
    }

    pub fn insert_logged_entry(&mut self, interval: Interval, window_id: i64) -> Result<i64> {
        insert(&self.conn, &LOGGED, interval, window_id)
    }

    pub fn insert_activity_entry(&mut self, interval: Interval, active: bool) -> Result<i64> {
        insert(&self.conn, &ACTIVITY, interval, bool_to_i64(active))
    }

    pub fn latest_logged_entry(&self) -> Result<Option<LoggedEntry>> {
        let sql = format!("{LOGGED_SELECT} ORDER BY e.stop_ts DESC, e.id DESC LIMIT 1");
        let entry = self.conn.query_row(&sql, [], map_logged_row).optional()?;
        Ok(entry)
    }

    pub fn latest_activity_entry(&self) -> Result<Option<ActivityEntry>> {
        let entry = self
            .conn
            .query_row(
                "\
                SELECT id, start_ts, stop_ts, active
                FROM activity_entry
                ORDER BY stop_ts DESC, id DESC
                LIMIT 1",
                [],
                map_activity_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn logged_entries_by_date(&self, date: NaiveDate) -> Result<Vec<LoggedEntry>> {
        let sql = format!(
            "{LOGGED_SELECT}
            WHERE e.start_ts < ?2 AND e.stop_ts >= ?1
            ORDER BY e.start_ts, e.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![to_epoch(day_start(date)), to_epoch(day_end(date))],
            map_logged_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn activity_entries_by_date(&self, date: NaiveDate) -> Result<Vec<ActivityEntry>> {
        let mut stmt = self.conn.prepare(
            "\
            SELECT id, start_ts, stop_ts, active
            FROM activity_entry
            WHERE start_ts < ?2 AND stop_ts >= ?1
            ORDER BY start_ts, id",
        )?;
        let rows = stmt.query_map(
            params![to_epoch(day_start(date)), to_epoch(day_end(date))],
            map_activity_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

const LOGGED_SELECT: &str = "\
    SELECT e.id, e.start_ts, e.stop_ts,
           w.id, w.title, a.id, a.name, p.id, p.path
    FROM logged_entry e
    JOIN application_window w ON w.id = e.application_window_id
    JOIN application a ON a.id = w.application_id
    JOIN application_path p ON p.id = a.application_path_id";

fn map_logged_row(row: &Row) -> rusqlite::Result<LoggedEntry> {
    Ok(LoggedEntry {
        id: row.get(0)?,
        start: datetime_column(1, row.get(1)?)?,
        stop: datetime_column(2, row.get(2)?)?,
        application_window: map_window(row, 3)?,
    })
}

fn map_activity_row(row: &Row) -> rusqlite::Result<ActivityEntry> {
    Ok(ActivityEntry {
        id: row.get(0)?,
        start: datetime_column(1, row.get(1)?)?,
        stop: datetime_column(2, row.get(2)?)?,
        active: row.get::<_, i64>(3)? != 0,
    })
}

fn record_sample(
    conn: &mut Connection,
    stream: &Stream,
    identity: i64,
    now: NaiveDateTime,
    max_delta: Duration,
) -> Result<Decision> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let last = latest(&tx, stream)?;
    let decision = decide(last.as_ref(), &identity, now, max_delta);
    match decision {
        Decision::StartNew { start, stop } | Decision::Append { start, stop } => {
            insert(&tx, stream, Interval::new(start, stop)?, identity)?;
        }
        Decision::Extend { id, stop } => {
            tx.execute(
                &format!("UPDATE {} SET stop_ts = ?1 WHERE id = ?2", stream.table),
                params![to_epoch(stop), id],
            )?;
        }
    }

    tx.commit()?;
    Ok(decision)
}

fn latest(conn: &Connection, stream: &Stream) -> Result<Option<LastEntry<i64>>> {
    let sql = format!(
        "SELECT id, stop_ts, {} FROM {} ORDER BY stop_ts DESC, id DESC LIMIT 1",
        stream.identity_column, stream.table
    );
    let last = conn
        .query_row(&sql, [], |row| {
            Ok(LastEntry {
                id: row.get(0)?,
                stop: datetime_column(1, row.get(1)?)?,
                identity: row.get(2)?,
            })
        })
        .optional()?;
    Ok(last)
}

fn insert(conn: &Connection, stream: &Stream, interval: Interval, identity: i64) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {} (start_ts, stop_ts, {}) VALUES (?1, ?2, ?3)",
            stream.table, stream.identity_column
        ),
        params![
            to_epoch(interval.start()),
            to_epoch(interval.stop()),
            identity
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
