//! Closed `[start, stop]` wall-clock intervals and day helpers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use serde::Serialize;

use crate::error::{Result, TimeTagError};

/// Seconds in a day minus one; the widest timeline window is `00:00:00..=23:59:59`.
pub const LAST_SECOND_OF_DAY: i64 = 24 * 60 * 60 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    start: NaiveDateTime,
    stop: NaiveDateTime,
}

impl Interval {
    /// Builds an interval, refusing `stop < start`.
    pub fn new(start: NaiveDateTime, stop: NaiveDateTime) -> Result<Self> {
        if stop < start {
            return Err(TimeTagError::MalformedInterval { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// The swap rule: whichever endpoint is earlier becomes `start`.
    ///
    /// Used while the user drags a new interval, where the moving edge can
    /// pass the anchor in either direction.
    pub fn normalize(anchor: NaiveDateTime, moving: NaiveDateTime) -> Self {
        if moving < anchor {
            Self {
                start: moving,
                stop: anchor,
            }
        } else {
            Self {
                start: anchor,
                stop: moving,
            }
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn stop(&self) -> NaiveDateTime {
        self.stop
    }

    pub fn duration(&self) -> Duration {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.stop
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start <= other.stop && other.start <= self.stop
    }

    /// Drops sub-second precision from both endpoints.
    pub fn truncated(&self) -> Self {
        Self {
            start: self.start.trunc_subsecs(0),
            stop: self.stop.trunc_subsecs(0),
        }
    }
}

pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Midnight of the following day; date queries treat it as an exclusive bound.
pub fn day_end(date: NaiveDate) -> NaiveDateTime {
    day_start(date) + Duration::days(1)
}

pub fn last_second(date: NaiveDate) -> NaiveDateTime {
    day_start(date) + Duration::seconds(LAST_SECOND_OF_DAY)
}

pub(crate) fn to_epoch(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

pub(crate) fn from_epoch(ts: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc())
}
