//! Folding watcher samples into logged and activity segments.
//!
//! Each sample either stretches the latest entry, bridges from it with a new
//! entry, or starts a fresh entry after a gap. The same rule drives both the
//! window stream (keyed by window id) and the activity stream (keyed by the
//! active flag).

use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastEntry<K> {
    pub id: i64,
    pub stop: NaiveDateTime,
    pub identity: K,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Insert `{start: now, stop: now + 1s}`.
    StartNew {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },
    /// Move the stop of entry `id` forward.
    Extend { id: i64, stop: NaiveDateTime },
    /// Insert an entry that begins where the previous one stopped.
    Append {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },
}

pub fn decide<K: PartialEq>(
    last: Option<&LastEntry<K>>,
    identity: &K,
    now: NaiveDateTime,
    max_delta: Duration,
) -> Decision {
    let fresh = Decision::StartNew {
        start: now,
        stop: now + Duration::seconds(1),
    };
    let Some(last) = last else {
        return fresh;
    };

    if now - last.stop > max_delta {
        return fresh;
    }

    // stops never move backwards, even if the clock does
    let stop = now.max(last.stop);
    if last.identity == *identity {
        Decision::Extend { id: last.id, stop }
    } else {
        Decision::Append {
            start: last.stop,
            stop,
        }
    }
}
