//! Pure helpers behind manual tagging: the merge plan applied by the store,
//! and the interval arithmetic used while the user draws a new tag.

use chrono::NaiveDateTime;

use crate::interval::Interval;
use crate::model::TaggedEntry;

/// How a candidate interval is folded into its same-category neighbours.
///
/// `left` is the neighbour whose stop equals the candidate start, `right` the
/// neighbour whose start equals the candidate stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePlan {
    Insert,
    ExtendLeft {
        id: i64,
        stop: NaiveDateTime,
    },
    RetractRight {
        id: i64,
        start: NaiveDateTime,
    },
    /// Delete `remove` and stretch `keep` over both.
    Bridge {
        keep: i64,
        stop: NaiveDateTime,
        remove: i64,
    },
}

pub fn plan_merge(
    candidate: &Interval,
    left: Option<&TaggedEntry>,
    right: Option<&TaggedEntry>,
) -> MergePlan {
    match (left, right) {
        (Some(left), Some(right)) => MergePlan::Bridge {
            keep: left.id,
            stop: right.stop,
            remove: right.id,
        },
        (Some(left), None) => MergePlan::ExtendLeft {
            id: left.id,
            stop: candidate.stop(),
        },
        (None, Some(right)) => MergePlan::RetractRight {
            id: right.id,
            start: candidate.start(),
        },
        (None, None) => MergePlan::Insert,
    }
}

/// The tagged entry covering `t`, boundaries included.
pub fn entry_at(t: NaiveDateTime, entries: &[TaggedEntry]) -> Option<&TaggedEntry> {
    entries.iter().find(|entry| entry.start <= t && t <= entry.stop)
}

/// The interval being drawn from `anchor` to `moving`, kept clear of `others`.
///
/// An anchor that falls inside existing entries first moves to the nearer
/// edge of the block of entries covering it; on a tie it moves to the edge on
/// the drag side. The moving edge then stops at the first boundary it would
/// cross.
pub fn clamp_candidate(
    anchor: NaiveDateTime,
    moving: NaiveDateTime,
    others: &[Interval],
) -> Interval {
    let anchor = snap_out_of_entries(anchor, moving, others);

    let moving = if moving >= anchor {
        others
            .iter()
            .map(Interval::start)
            .filter(|start| *start >= anchor)
            .min()
            .map_or(moving, |upper| moving.min(upper))
    } else {
        others
            .iter()
            .map(Interval::stop)
            .filter(|stop| *stop <= anchor)
            .max()
            .map_or(moving, |lower| moving.max(lower))
    };

    Interval::normalize(anchor, moving)
}

fn snap_out_of_entries(
    anchor: NaiveDateTime,
    moving: NaiveDateTime,
    others: &[Interval],
) -> NaiveDateTime {
    let Some(first) = others
        .iter()
        .find(|other| other.start() < anchor && anchor < other.stop())
    else {
        return anchor;
    };

    // entries of different categories may overlap; grow to the whole block
    let (mut lo, mut hi) = (first.start(), first.stop());
    loop {
        let mut grown = false;
        for other in others {
            if other.start() < hi && other.stop() > lo {
                if other.start() < lo {
                    lo = other.start();
                    grown = true;
                }
                if other.stop() > hi {
                    hi = other.stop();
                    grown = true;
                }
            }
        }
        if !grown {
            break;
        }
    }

    let to_lo = anchor - lo;
    let to_hi = hi - anchor;
    if to_lo < to_hi {
        lo
    } else if to_hi < to_lo {
        hi
    } else if moving < anchor {
        lo
    } else {
        hi
    }
}

/// The free gap around `t` inside `viewport`, bounded by the neighbouring
/// entries. `None` when `t` sits on an entry or outside the viewport.
pub fn fill_gap(t: NaiveDateTime, others: &[Interval], viewport: &Interval) -> Option<Interval> {
    if !viewport.contains(t) || others.iter().any(|other| other.contains(t)) {
        return None;
    }

    let start = others
        .iter()
        .map(Interval::stop)
        .filter(|stop| *stop < t)
        .max()
        .map_or(viewport.start(), |stop| stop.max(viewport.start()));
    let stop = others
        .iter()
        .map(Interval::start)
        .filter(|start| *start > t)
        .min()
        .map_or(viewport.stop(), |start| start.min(viewport.stop()));

    Interval::new(start, stop).ok().filter(|gap| !gap.is_empty())
}
