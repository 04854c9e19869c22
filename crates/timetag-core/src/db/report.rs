use chrono::NaiveDate;
use serde::Serialize;

use super::Database;
use crate::error::{Result, TimeTagError};
use crate::model::{ActivityEntry, Category, LoggedEntry, TaggedEntry};

/// Everything recorded for one day.
#[derive(Debug, Clone, Serialize)]
pub struct DayEntries {
    pub date: NaiveDate,
    pub logged: Vec<LoggedEntry>,
    pub tagged: Vec<TaggedEntry>,
    pub activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    pub main: Category,
    pub children: Vec<Category>,
}

impl Database {
    /// Tagged entries carry their category url with `{{date}}` expanded to
    /// `date`.
    pub fn entries_for_date(&self, date: NaiveDate) -> Result<DayEntries> {
        let tagged = self
            .tagged_by_date(date)?
            .into_iter()
            .map(|mut entry| {
                entry.category.url = entry.category.expand_url(date);
                entry
            })
            .collect();

        Ok(DayEntries {
            date,
            logged: self.logged_entries_by_date(date)?,
            tagged,
            activity: self.activity_entries_by_date(date)?,
        })
    }

    /// Main categories with their sub categories, both sorted by name.
    pub fn category_tree(&self) -> Result<Vec<CategoryNode>> {
        self.main_categories()?
            .into_iter()
            .map(|main| {
                let children = self.sub_categories(main.id)?;
                Ok(CategoryNode { main, children })
            })
            .collect()
    }

    /// Tagged seconds for `main_name`, or for its sub category `sub_name`.
    ///
    /// Without a sub category the total covers the main category and every
    /// sub category beneath it.
    pub fn category_statistics(&self, main_name: &str, sub_name: Option<&str>) -> Result<i64> {
        let main = self
            .find_category(main_name, None)?
            .ok_or_else(|| TimeTagError::UnknownCategory(main_name.to_owned()))?;

        if let Some(sub_name) = sub_name {
            let sub = self.find_category(sub_name, Some(main.id))?.ok_or_else(|| {
                TimeTagError::UnknownCategory(format!("{main_name}/{sub_name}"))
            })?;
            return self.total_time_by_category(sub.id);
        }

        let mut total = self.total_time_by_category(main.id)?;
        for sub in self.sub_categories(main.id)? {
            total += self.total_time_by_category(sub.id)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use chrono::NaiveDateTime;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 12)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("valid time")
    }

    fn span(start: NaiveDateTime, stop: NaiveDateTime) -> Interval {
        Interval::new(start, stop).expect("ordered")
    }

    #[test]
    fn tree_is_sorted_case_insensitively() {
        let mut db = Database::open_in_memory().expect("open");
        db.get_or_create_category("work", Some("Review")).expect("create");
        db.get_or_create_category("work", Some("admin")).expect("create");
        db.get_or_create_category("Home", None).expect("create");

        let tree = db.category_tree().expect("tree");
        let names: Vec<_> = tree.iter().map(|node| node.main.name.as_str()).collect();
        assert_eq!(names, ["Home", "work"]);
        let subs: Vec<_> = tree[1].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(subs, ["admin", "Review"]);
    }

    #[test]
    fn statistics_roll_up_sub_categories() {
        let mut db = Database::open_in_memory().expect("open");
        db.tag(span(at(9, 0), at(10, 0)), "Work", None).expect("tag");
        db.tag(span(at(10, 0), at(10, 30)), "Work", Some("Review")).expect("tag");
        db.tag(span(at(11, 0), at(11, 15)), "Work", Some("Admin")).expect("tag");

        assert_eq!(db.category_statistics("Work", None).expect("stats"), 6300);
        assert_eq!(
            db.category_statistics("work", Some("review")).expect("stats"),
            1800
        );
        assert!(matches!(
            db.category_statistics("Play", None),
            Err(TimeTagError::UnknownCategory(_))
        ));
    }

    #[test]
    fn day_entries_expand_category_urls() {
        let mut db = Database::open_in_memory().expect("open");
        let entry = db.tag(span(at(9, 0), at(10, 0)), "Tickets", None).expect("tag");
        db.update_category(
            entry.category.id,
            crate::db::CategoryUpdate {
                url: Some(Some("https://tracker.local/{{date}}".to_owned())),
                ..Default::default()
            },
        )
        .expect("update");

        let day = db.entries_for_date(at(0, 0).date()).expect("entries");
        assert_eq!(day.tagged.len(), 1);
        assert_eq!(
            day.tagged[0].category.url.as_deref(),
            Some("https://tracker.local/2024-09-12")
        );
        assert!(day.logged.is_empty());

        let json = serde_json::to_value(&day).expect("json");
        assert_eq!(json["tagged"][0]["start"], "2024-09-12T09:00:00");
    }
}
