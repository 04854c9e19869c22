use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::categories::{self, get_or_create_in, map_category};
use super::{datetime_column, Database};
use crate::error::{Result, TimeTagError};
use crate::interval::{day_end, day_start, to_epoch, Interval};
use crate::model::{Category, TaggedEntry};
use crate::tagging::{plan_merge, MergePlan};

const TAGGED_SELECT: &str = "\
    SELECT t.id, t.start_ts, t.stop_ts,
           c.id, c.name, c.url, c.parent_id
    FROM tagged_entry t
    JOIN category c ON c.id = t.category_id";

fn map_tagged_row(row: &Row) -> rusqlite::Result<TaggedEntry> {
    Ok(TaggedEntry {
        id: row.get(0)?,
        start: datetime_column(1, row.get(1)?)?,
        stop: datetime_column(2, row.get(2)?)?,
        category: map_category(row, 3)?,
    })
}

impl Database {
    /// Tags `candidate` with `main_name` (and `sub_name` beneath it),
    /// creating the categories on first use, then merges it into any touching
    /// entries of that category.
    pub fn tag(
        &mut self,
        candidate: Interval,
        main_name: &str,
        sub_name: Option<&str>,
    ) -> Result<TaggedEntry> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let category = get_or_create_in(&tx, main_name, sub_name)?;
        let entry = merge_in(&tx, candidate, &category)?;
        tx.commit()?;
        Ok(entry)
    }

    /// Inserts `candidate` under `category_id`, merging with a same-category
    /// entry that stops where it starts and/or one that starts where it stops.
    pub fn insert_tagged_with_merge(
        &mut self,
        candidate: Interval,
        category_id: i64,
    ) -> Result<TaggedEntry> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let category = categories::load(&tx, category_id)?;
        let entry = merge_in(&tx, candidate, &category)?;
        tx.commit()?;
        Ok(entry)
    }

    pub fn tagged_entry(&self, id: i64) -> Result<TaggedEntry> {
        load_tagged(&self.conn, id)
    }

    /// Sub-second parts of `interval` are dropped, as rows store whole seconds.
    pub fn update_tagged(&mut self, id: i64, interval: Interval) -> Result<TaggedEntry> {
        let interval = interval.truncated();
        let changed = self.conn.execute(
            "UPDATE tagged_entry SET start_ts = ?1, stop_ts = ?2 WHERE id = ?3",
            params![to_epoch(interval.start()), to_epoch(interval.stop()), id],
        )?;
        if changed == 0 {
            return Err(TimeTagError::TaggedEntryNotFound(id));
        }
        self.tagged_entry(id)
    }

    pub fn delete_tagged(&mut self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tagged_entry WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(TimeTagError::TaggedEntryNotFound(id));
        }
        debug!(id, "deleted tagged entry");
        Ok(())
    }

    pub fn tagged_by_date(&self, date: NaiveDate) -> Result<Vec<TaggedEntry>> {
        let sql = format!(
            "{TAGGED_SELECT}
            WHERE t.start_ts < ?2 AND t.stop_ts >= ?1
            ORDER BY t.start_ts, t.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![to_epoch(day_start(date)), to_epoch(day_end(date))],
            map_tagged_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Seconds tagged directly with `category_id`.
    pub fn total_time_by_category(&self, category_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "\
            SELECT COALESCE(SUM(stop_ts - start_ts), 0)
            FROM tagged_entry
            WHERE category_id = ?1",
            params![category_id],
            |row| row.get(0),
        )?)
    }
}

fn merge_in(conn: &Connection, candidate: Interval, category: &Category) -> Result<TaggedEntry> {
    // rows hold whole seconds; compare and store the candidate the same way
    let candidate = candidate.truncated();
    if candidate.is_empty() {
        return Err(TimeTagError::EmptyInterval(candidate.start()));
    }

    let left = neighbour(conn, category.id, "stop_ts", candidate.start())?;
    let right = neighbour(conn, category.id, "start_ts", candidate.stop())?;
    let plan = plan_merge(&candidate, left.as_ref(), right.as_ref());
    debug!(category = %category.name, ?plan, "merging tagged entry");

    let id = match plan {
        MergePlan::Insert => {
            conn.execute(
                "INSERT INTO tagged_entry (start_ts, stop_ts, category_id) VALUES (?1, ?2, ?3)",
                params![
                    to_epoch(candidate.start()),
                    to_epoch(candidate.stop()),
                    category.id
                ],
            )?;
            conn.last_insert_rowid()
        }
        MergePlan::ExtendLeft { id, stop } => {
            conn.execute(
                "UPDATE tagged_entry SET stop_ts = ?1 WHERE id = ?2",
                params![to_epoch(stop), id],
            )?;
            id
        }
        MergePlan::RetractRight { id, start } => {
            conn.execute(
                "UPDATE tagged_entry SET start_ts = ?1 WHERE id = ?2",
                params![to_epoch(start), id],
            )?;
            id
        }
        MergePlan::Bridge { keep, stop, remove } => {
            conn.execute("DELETE FROM tagged_entry WHERE id = ?1", params![remove])?;
            conn.execute(
                "UPDATE tagged_entry SET stop_ts = ?1 WHERE id = ?2",
                params![to_epoch(stop), keep],
            )?;
            keep
        }
    };

    load_tagged(conn, id)
}

/// The same-category entry whose `column` equals `at`.
fn neighbour(
    conn: &Connection,
    category_id: i64,
    column: &str,
    at: NaiveDateTime,
) -> Result<Option<TaggedEntry>> {
    let sql = format!(
        "{TAGGED_SELECT}
        WHERE t.category_id = ?1 AND t.{column} = ?2
        ORDER BY t.id
        LIMIT 1"
    );
    let found = conn
        .query_row(&sql, params![category_id, to_epoch(at)], map_tagged_row)
        .optional()?;
    Ok(found)
}

fn load_tagged(conn: &Connection, id: i64) -> Result<TaggedEntry> {
    let sql = format!("{TAGGED_SELECT} WHERE t.id = ?1");
    conn.query_row(&sql, params![id], map_tagged_row)
        .optional()?
        .ok_or(TimeTagError::TaggedEntryNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 8)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("valid time")
    }

    fn span(start: NaiveDateTime, stop: NaiveDateTime) -> Interval {
        Interval::new(start, stop).expect("ordered")
    }

    fn day(db: &Database) -> Vec<(NaiveDateTime, NaiveDateTime, String)> {
        db.tagged_by_date(at(0, 0).date())
            .expect("tagged")
            .into_iter()
            .map(|entry| (entry.start, entry.stop, entry.category.name))
            .collect()
    }

    #[test]
    fn touching_same_category_extends_left_neighbour() {
        let mut db = Database::open_in_memory().expect("open");
        let first = db.tag(span(at(9, 0), at(10, 0)), "Meeting", None).expect("tag");
        let merged = db.tag(span(at(10, 0), at(11, 0)), "Meeting", None).expect("tag");

        assert_eq!(merged.id, first.id);
        assert_eq!(day(&db), vec![(at(9, 0), at(11, 0), "Meeting".to_owned())]);
    }

    #[test]
    fn touching_same_category_retracts_right_neighbour() {
        let mut db = Database::open_in_memory().expect("open");
        let later = db.tag(span(at(11, 0), at(12, 0)), "Meeting", None).expect("tag");
        let merged = db.tag(span(at(10, 0), at(11, 0)), "Meeting", None).expect("tag");

        assert_eq!(merged.id, later.id);
        assert_eq!(day(&db), vec![(at(10, 0), at(12, 0), "Meeting".to_owned())]);
    }

    #[test]
    fn filling_the_gap_bridges_both_neighbours() {
        let mut db = Database::open_in_memory().expect("open");
        let left = db.tag(span(at(9, 0), at(10, 0)), "Coding", None).expect("tag");
        db.tag(span(at(11, 0), at(12, 0)), "Coding", None).expect("tag");

        let bridged = db.tag(span(at(10, 0), at(11, 0)), "Coding", None).expect("tag");

        assert_eq!(bridged.id, left.id);
        assert_eq!(day(&db), vec![(at(9, 0), at(12, 0), "Coding".to_owned())]);
    }

    #[test]
    fn other_categories_are_left_alone() {
        let mut db = Database::open_in_memory().expect("open");
        db.tag(span(at(9, 0), at(10, 0)), "Coding", None).expect("tag");
        db.tag(span(at(10, 0), at(11, 0)), "Meeting", None).expect("tag");
        db.tag(span(at(9, 30), at(10, 30)), "Lunch", None).expect("tag");

        assert_eq!(day(&db).len(), 3);
    }

    #[test]
    fn sub_categories_merge_only_with_themselves() {
        let mut db = Database::open_in_memory().expect("open");
        db.tag(span(at(9, 0), at(10, 0)), "Work", Some("Review")).expect("tag");
        db.tag(span(at(10, 0), at(11, 0)), "Work", None).expect("tag");
        db.tag(span(at(11, 0), at(12, 0)), "Work", Some("Review")).expect("tag");

        assert_eq!(day(&db).len(), 3);
    }

    #[test]
    fn empty_candidate_is_rejected() {
        let mut db = Database::open_in_memory().expect("open");
        let err = db.tag(span(at(9, 0), at(9, 0)), "Meeting", None).unwrap_err();
        assert!(matches!(err, TimeTagError::EmptyInterval(_)));
        assert!(day(&db).is_empty());
    }

    #[test]
    fn sub_second_candidate_is_rejected_as_empty() {
        let mut db = Database::open_in_memory().expect("open");
        let candidate = span(
            at(10, 0) + Duration::milliseconds(200),
            at(10, 0) + Duration::milliseconds(700),
        );

        let err = db.tag(candidate, "Meeting", None).unwrap_err();
        assert!(matches!(err, TimeTagError::EmptyInterval(_)));
        assert!(day(&db).is_empty());
    }

    #[test]
    fn millisecond_edges_still_touch_whole_second_neighbours() {
        let mut db = Database::open_in_memory().expect("open");
        let left = db.tag(span(at(8, 0), at(9, 0)), "Meeting", None).expect("tag");

        let merged = db
            .tag(
                span(
                    at(9, 0) + Duration::milliseconds(400),
                    at(10, 0) + Duration::milliseconds(600),
                ),
                "Meeting",
                None,
            )
            .expect("tag");

        assert_eq!(merged.id, left.id);
        assert_eq!(day(&db), vec![(at(8, 0), at(10, 0), "Meeting".to_owned())]);

        let updated = db
            .update_tagged(
                merged.id,
                span(at(7, 30) + Duration::milliseconds(900), at(10, 0)),
            )
            .expect("update");
        assert_eq!(updated.start, at(7, 30));
    }

    #[test]
    fn merge_against_missing_category_fails_before_writing() {
        let mut db = Database::open_in_memory().expect("open");
        let err = db
            .insert_tagged_with_merge(span(at(9, 0), at(10, 0)), 42)
            .unwrap_err();
        assert!(matches!(err, TimeTagError::CategoryNotFound(42)));
    }

    #[test]
    fn update_and_delete_by_id() {
        let mut db = Database::open_in_memory().expect("open");
        let entry = db.tag(span(at(9, 0), at(10, 0)), "Meeting", None).expect("tag");

        let updated = db.update_tagged(entry.id, span(at(8, 30), at(10, 15))).expect("update");
        assert_eq!((updated.start, updated.stop), (at(8, 30), at(10, 15)));

        db.delete_tagged(entry.id).expect("delete");
        assert!(matches!(
            db.delete_tagged(entry.id),
            Err(TimeTagError::TaggedEntryNotFound(_))
        ));
        assert!(matches!(
            db.update_tagged(entry.id, span(at(9, 0), at(10, 0))),
            Err(TimeTagError::TaggedEntryNotFound(_))
        ));
    }

    #[test]
    fn total_time_sums_seconds() {
        let mut db = Database::open_in_memory().expect("open");
        let a = db.tag(span(at(9, 0), at(10, 0)), "Meeting", None).expect("tag");
        db.tag(span(at(13, 0), at(13, 30)), "Meeting", None).expect("tag");

        assert_eq!(db.total_time_by_category(a.category.id).expect("total"), 5400);
    }

    #[test]
    fn category_with_tagged_time_cannot_be_deleted() {
        let mut db = Database::open_in_memory().expect("open");
        let entry = db.tag(span(at(9, 0), at(10, 0)), "Meeting", None).expect("tag");

        assert!(matches!(
            db.delete_category(entry.category.id),
            Err(TimeTagError::CategoryHasTaggedTime(_))
        ));
        db.delete_tagged(entry.id).expect("delete entry");
        db.delete_category(entry.category.id).expect("delete category");
    }
}
