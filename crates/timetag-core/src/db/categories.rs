use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::info;

use super::Database;
use crate::error::{Result, TimeTagError};
use crate::model::Category;

/// Field changes for [`Database::update_category`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub url: Option<Option<String>>,
    pub parent_id: Option<Option<i64>>,
}

pub(crate) const CATEGORY_COLUMNS: &str = "id, name, url, parent_id";

pub(crate) fn map_category(row: &Row, offset: usize) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        url: row.get(offset + 2)?,
        parent_id: row.get(offset + 3)?,
    })
}

impl Database {
    /// Finds or creates `main_name`, and `sub_name` beneath it when given.
    /// Returns the most specific of the two.
    pub fn get_or_create_category(
        &mut self,
        main_name: &str,
        sub_name: Option<&str>,
    ) -> Result<Category> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let category = get_or_create_in(&tx, main_name, sub_name)?;
        tx.commit()?;
        Ok(category)
    }

    pub fn category(&self, id: i64) -> Result<Category> {
        load(&self.conn, id)
    }

    pub fn find_category(&self, name: &str, parent_id: Option<i64>) -> Result<Option<Category>> {
        find(&self.conn, name.trim(), parent_id)
    }

    pub fn main_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE parent_id IS NULL ORDER BY lower(name)"
        ))?;
        let rows = stmt.query_map([], |row| map_category(row, 0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn sub_categories(&self, parent_id: i64) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE parent_id = ?1 ORDER BY lower(name)"
        ))?;
        let rows = stmt.query_map(params![parent_id], |row| map_category(row, 0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_category(&mut self, id: i64, update: CategoryUpdate) -> Result<Category> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut category = load(&tx, id)?;

        if let Some(name) = update.name {
            category.name = clean_name(&name)?.to_owned();
        }
        if let Some(url) = update.url {
            category.url = url
                .map(|url| url.trim().to_owned())
                .filter(|url| !url.is_empty());
        }
        if let Some(parent_id) = update.parent_id {
            if parent_id != category.parent_id {
                if let Some(parent_id) = parent_id {
                    check_parent(&tx, &category, parent_id)?;
                }
                category.parent_id = parent_id;
            }
        }

        tx.execute(
            "UPDATE category SET name = ?1, url = ?2, parent_id = ?3 WHERE id = ?4",
            params![category.name, category.url, category.parent_id, category.id],
        )?;
        tx.commit()?;
        Ok(category)
    }

    /// Deletes a category that has neither sub categories nor tagged time.
    pub fn delete_category(&mut self, id: i64) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let category = load(&tx, id)?;

        if child_count(&tx, id)? > 0 {
            return Err(TimeTagError::CategoryHasChildren(category.name));
        }
        let tagged: i64 = tx.query_row(
            "SELECT COUNT(*) FROM tagged_entry WHERE category_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if tagged > 0 {
            return Err(TimeTagError::CategoryHasTaggedTime(category.name));
        }

        tx.execute("DELETE FROM category WHERE id = ?1", params![id])?;
        tx.commit()?;
        info!(id, name = %category.name, "deleted category");
        Ok(())
    }
}

pub(crate) fn get_or_create_in(
    conn: &Connection,
    main_name: &str,
    sub_name: Option<&str>,
) -> Result<Category> {
    let main = find_or_insert(conn, clean_name(main_name)?, None)?;
    match sub_name {
        Some(sub_name) => find_or_insert(conn, clean_name(sub_name)?, Some(main.id)),
        None => Ok(main),
    }
}

fn find_or_insert(conn: &Connection, name: &str, parent_id: Option<i64>) -> Result<Category> {
    if let Some(existing) = find(conn, name, parent_id)? {
        return Ok(existing);
    }

    conn.execute(
        "INSERT INTO category (name, parent_id) VALUES (?1, ?2)",
        params![name, parent_id],
    )?;
    let category = Category {
        id: conn.last_insert_rowid(),
        name: name.to_owned(),
        url: None,
        parent_id,
    };
    info!(id = category.id, name, ?parent_id, "new category");
    Ok(category)
}

fn find(conn: &Connection, name: &str, parent_id: Option<i64>) -> Result<Option<Category>> {
    let found = conn
        .query_row(
            &format!(
                "\
                SELECT {CATEGORY_COLUMNS}
                FROM category
                WHERE lower(name) = lower(?1) AND ifnull(parent_id, 0) = ?2"
            ),
            params![name, parent_id.unwrap_or(0)],
            |row| map_category(row, 0),
        )
        .optional()?;
    Ok(found)
}

pub(crate) fn load(conn: &Connection, id: i64) -> Result<Category> {
    conn.query_row(
        &format!("SELECT {CATEGORY_COLUMNS} FROM category WHERE id = ?1"),
        params![id],
        |row| map_category(row, 0),
    )
    .optional()?
    .ok_or(TimeTagError::CategoryNotFound(id))
}

fn child_count(conn: &Connection, id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM category WHERE parent_id = ?1",
        params![id],
        |row| row.get(0),
    )?)
}

/// Only a main category without children may move under another main category.
fn check_parent(conn: &Connection, category: &Category, parent_id: i64) -> Result<()> {
    if parent_id == category.id {
        return Err(TimeTagError::InvalidParent(format!(
            "`{}` cannot be its own parent",
            category.name
        )));
    }
    if child_count(conn, category.id)? > 0 {
        return Err(TimeTagError::CategoryHasChildren(category.name.clone()));
    }
    let parent = load(conn, parent_id)?;
    if !parent.is_main() {
        return Err(TimeTagError::InvalidParent(format!(
            "`{}` is itself a sub category",
            parent.name
        )));
    }
    Ok(())
}

fn clean_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TimeTagError::EmptyCategoryName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_reuses_existing_names() {
        let mut db = Database::open_in_memory().expect("open");
        let first = db.get_or_create_category("Work", Some("Review")).expect("create");
        let again = db.get_or_create_category(" work ", Some("review")).expect("create");
        assert_eq!(first.id, again.id);

        let main = db.find_category("Work", None).expect("find").expect("present");
        assert_eq!(first.parent_id, Some(main.id));
        assert_eq!(db.sub_categories(main.id).expect("subs").len(), 1);
    }

    #[test]
    fn same_sub_name_under_two_mains_is_allowed() {
        let mut db = Database::open_in_memory().expect("open");
        let a = db.get_or_create_category("Work", Some("Admin")).expect("create");
        let b = db.get_or_create_category("Home", Some("Admin")).expect("create");
        assert_ne!(a.id, b.id);
        assert_eq!(db.main_categories().expect("mains").len(), 2);
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut db = Database::open_in_memory().expect("open");
        assert!(matches!(
            db.get_or_create_category("   ", None),
            Err(TimeTagError::EmptyCategoryName)
        ));
        assert!(matches!(
            db.get_or_create_category("Work", Some("")),
            Err(TimeTagError::EmptyCategoryName)
        ));
    }

    #[test]
    fn main_with_children_cannot_be_reparented() {
        let mut db = Database::open_in_memory().expect("open");
        let sub = db.get_or_create_category("Work", Some("Review")).expect("create");
        let work = db.category(sub.parent_id.unwrap()).expect("main");
        let home = db.get_or_create_category("Home", None).expect("create");

        let err = db
            .update_category(
                work.id,
                CategoryUpdate {
                    parent_id: Some(Some(home.id)),
                    ..CategoryUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TimeTagError::CategoryHasChildren(name) if name == "Work"));
        assert_eq!(db.category(work.id).expect("reload").parent_id, None);
    }

    #[test]
    fn parent_must_be_an_existing_main_category() {
        let mut db = Database::open_in_memory().expect("open");
        let sub = db.get_or_create_category("Work", Some("Review")).expect("create");
        let lonely = db.get_or_create_category("Errands", None).expect("create");

        let onto_sub = db.update_category(
            lonely.id,
            CategoryUpdate {
                parent_id: Some(Some(sub.id)),
                ..CategoryUpdate::default()
            },
        );
        assert!(matches!(onto_sub, Err(TimeTagError::InvalidParent(_))));

        let onto_self = db.update_category(
            lonely.id,
            CategoryUpdate {
                parent_id: Some(Some(lonely.id)),
                ..CategoryUpdate::default()
            },
        );
        assert!(matches!(onto_self, Err(TimeTagError::InvalidParent(_))));

        let onto_missing = db.update_category(
            lonely.id,
            CategoryUpdate {
                parent_id: Some(Some(9999)),
                ..CategoryUpdate::default()
            },
        );
        assert!(matches!(onto_missing, Err(TimeTagError::CategoryNotFound(9999))));
    }

    #[test]
    fn childless_main_can_move_and_be_renamed() {
        let mut db = Database::open_in_memory().expect("open");
        let work = db.get_or_create_category("Work", None).expect("create");
        let errands = db.get_or_create_category("Errands", None).expect("create");

        let moved = db
            .update_category(
                errands.id,
                CategoryUpdate {
                    name: Some(" Shopping ".to_owned()),
                    url: Some(Some("https://notes.local/{{date}}".to_owned())),
                    parent_id: Some(Some(work.id)),
                },
            )
            .expect("update");

        assert_eq!(moved.name, "Shopping");
        assert_eq!(moved.parent_id, Some(work.id));
        assert_eq!(db.category(errands.id).expect("reload"), moved);
    }

    #[test]
    fn delete_refuses_categories_in_use() {
        let mut db = Database::open_in_memory().expect("open");
        let sub = db.get_or_create_category("Work", Some("Review")).expect("create");
        let main_id = sub.parent_id.unwrap();

        assert!(matches!(
            db.delete_category(main_id),
            Err(TimeTagError::CategoryHasChildren(_))
        ));

        db.delete_category(sub.id).expect("delete sub");
        db.delete_category(main_id).expect("delete main");
        assert!(matches!(
            db.category(main_id),
            Err(TimeTagError::CategoryNotFound(_))
        ));
    }
}
