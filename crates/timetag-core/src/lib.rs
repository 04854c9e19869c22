//! Storage and engines for an activity watcher with manual time tagging.
//!
//! A watcher folds foreground-window samples into logged and activity
//! segments ([`continuity`]); the user tags intervals that merge with touching
//! same-category neighbours ([`tagging`]); a renderer maps one day of both onto
//! pixels ([`timeline`]). All of it is persisted through [`Database`].

pub mod continuity;
pub mod db;
pub mod error;
pub mod interval;
pub mod model;
pub mod probe;
pub mod settings;
pub mod tagging;
pub mod timeline;

pub use db::{CategoryNode, CategoryUpdate, Database, DayEntries};
pub use error::{Result, TimeTagError};
pub use interval::Interval;
pub use model::{
    ActivityEntry, Application, ApplicationPath, ApplicationWindow, Category, LoggedEntry,
    TaggedEntry, UNKNOWN,
};
pub use probe::{ForegroundProbe, ProbeResult, WindowIdentity};
pub use settings::Settings;
pub use timeline::Viewport;
