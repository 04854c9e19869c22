use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::interval::Interval;

/// Stored in place of any identity field the probe could not resolve.
pub const UNKNOWN: &str = "N/A";

const URL_DATE_PLACEHOLDER: &str = "{{date}}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationPath {
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub path: ApplicationPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationWindow {
    pub id: i64,
    pub title: String,
    pub application: Application,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedEntry {
    pub id: i64,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub application_window: ApplicationWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub parent_id: Option<i64>,
}

impl Category {
    pub fn is_main(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns the url with every `{{date}}` replaced by `date` as `%Y-%m-%d`.
    pub fn expand_url(&self, date: NaiveDate) -> Option<String> {
        self.url.as_deref().map(|url| {
            url.replace(
                URL_DATE_PLACEHOLDER,
                &date.format("%Y-%m-%d").to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedEntry {
    pub id: i64,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub category: Category,
}

macro_rules! impl_span {
    ($($entry:ty),+) => {
        $(
            impl $entry {
                pub fn interval(&self) -> Interval {
                    Interval::normalize(self.start, self.stop)
                }

                pub fn duration(&self) -> Duration {
                    self.stop - self.start
                }
            }
        )+
    };
}

impl_span!(LoggedEntry, ActivityEntry, TaggedEntry);
