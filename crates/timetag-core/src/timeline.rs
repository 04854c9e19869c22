//! Wall-clock ⇄ pixel mapping for a single-day timeline.
//!
//! The visible window is kept as millisecond offsets from the day's midnight,
//! so repeated zoom steps around the cursor do not drift.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::interval::{day_start, Interval, LAST_SECOND_OF_DAY};

/// Share of the visible width added or removed per zoom step.
pub const ZOOM_STEP: f64 = 0.03;
/// Share of the visible width scrolled per pan step.
pub const MOVE_STEP: f64 = 0.05;
pub const MIN_VIEWPORT_SECS: i64 = 5 * 60;

const MIN_SPAN_MS: i64 = MIN_VIEWPORT_SECS * 1000;
const MAX_SPAN_MS: i64 = LAST_SECOND_OF_DAY * 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    date: NaiveDate,
    start_ms: i64,
    stop_ms: i64,
    canvas_width: f64,
    side_padding: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibleEntry<'a, T> {
    pub entry: &'a T,
    pub start_x: f64,
    pub stop_x: f64,
}

impl Viewport {
    /// `00:00:00..=23:59:59` of `date`.
    pub fn full_day(date: NaiveDate, canvas_width: f64, side_padding: f64) -> Self {
        Self {
            date,
            start_ms: 0,
            stop_ms: MAX_SPAN_MS,
            canvas_width,
            side_padding,
        }
    }

    /// A window on `start`'s day. Reversed, too narrow, or out-of-day bounds
    /// are clamped into a valid window.
    pub fn new(
        start: NaiveDateTime,
        stop: NaiveDateTime,
        canvas_width: f64,
        side_padding: f64,
    ) -> Self {
        let interval = Interval::normalize(start, stop);
        let date = interval.start().date();
        let origin = day_start(date);
        let start_ms = (interval.start() - origin).num_milliseconds();
        let span = interval.duration().num_milliseconds();
        let (start_ms, stop_ms) = clamp_view_span(start_ms, span, 0, MAX_SPAN_MS);
        Self {
            date,
            start_ms,
            stop_ms,
            canvas_width,
            side_padding,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start(&self) -> NaiveDateTime {
        self.at_offset(self.start_ms)
    }

    pub fn stop(&self) -> NaiveDateTime {
        self.at_offset(self.stop_ms)
    }

    pub fn interval(&self) -> Interval {
        Interval::normalize(self.start(), self.stop())
    }

    pub fn canvas_width(&self) -> f64 {
        self.canvas_width
    }

    pub fn side_padding(&self) -> f64 {
        self.side_padding
    }

    /// Same window on a resized canvas.
    pub fn with_canvas(self, canvas_width: f64, side_padding: f64) -> Self {
        Self {
            canvas_width,
            side_padding,
            ..self
        }
    }

    /// Same time-of-day window on another date.
    pub fn with_date(self, date: NaiveDate) -> Self {
        Self { date, ..self }
    }

    pub fn pixels_per_second(&self) -> f64 {
        let span_secs = self.span_ms() as f64 / 1000.0;
        if span_secs <= 0.0 {
            return 0.0;
        }
        self.axis_width() / span_secs
    }

    pub fn datetime_to_pixel(&self, t: NaiveDateTime) -> f64 {
        let offset = self.offset_of(t);
        if offset <= self.start_ms || self.span_ms() <= 0 {
            return self.left_edge();
        }
        if offset >= self.stop_ms {
            return self.right_edge();
        }
        let ratio = (offset - self.start_ms) as f64 / self.span_ms() as f64;
        self.side_padding + ratio * self.axis_width()
    }

    /// Inverse of [`Self::datetime_to_pixel`], rounded to whole seconds inside
    /// the window and exact at the two boundary pixels.
    pub fn pixel_to_datetime(&self, x: f64) -> NaiveDateTime {
        if x.is_nan() || x <= self.left_edge() || self.axis_width() <= 0.0 {
            return self.start();
        }
        if x >= self.right_edge() {
            return self.stop();
        }
        let ratio = (x - self.side_padding) / self.axis_width();
        let offset = self.start_ms + (ratio * self.span_ms() as f64).round() as i64;
        let rounded = ((offset as f64 / 1000.0).round() as i64) * 1000;
        self.at_offset(rounded.clamp(self.start_ms, self.stop_ms))
    }

    /// One zoom step around `mouse_time`, keeping it under the cursor.
    ///
    /// Zooming in stops at [`MIN_VIEWPORT_SECS`]; zooming out stops at the
    /// whole day, which is always anchored at midnight.
    pub fn zoom(&self, mouse_time: NaiveDateTime, zoom_in: bool) -> Self {
        let span = self.span_ms();
        let mouse = self.offset_of(mouse_time).clamp(self.start_ms, self.stop_ms);
        let relative = if span > 0 {
            (mouse - self.start_ms) as f64 / span as f64
        } else {
            0.0
        };
        let step = ((span as f64 * ZOOM_STEP).round() as i64).max(1);

        let new_span = if zoom_in {
            if span <= MIN_SPAN_MS {
                return *self;
            }
            (span - step).max(MIN_SPAN_MS)
        } else {
            if span >= MAX_SPAN_MS {
                return *self;
            }
            (span + step).min(MAX_SPAN_MS)
        };

        let new_start = mouse - (relative * new_span as f64).round() as i64;
        let (start_ms, stop_ms) = clamp_view_span(new_start, new_span, 0, MAX_SPAN_MS);
        Self {
            start_ms,
            stop_ms,
            ..*self
        }
    }

    /// One pan step; never leaves the day.
    pub fn move_by_step(&self, move_right: bool) -> Self {
        let step = (self.span_ms() as f64 * MOVE_STEP).round() as i64;
        let shift = if move_right {
            step.min(MAX_SPAN_MS - self.stop_ms)
        } else {
            -step.min(self.start_ms)
        };
        Self {
            start_ms: self.start_ms + shift,
            stop_ms: self.stop_ms + shift,
            ..*self
        }
    }

    /// Entries intersecting the window with their clamped pixel extents.
    pub fn layout<'a, T>(
        &self,
        entries: &'a [T],
        interval_of: impl Fn(&T) -> Interval,
    ) -> Vec<VisibleEntry<'a, T>> {
        let window = self.interval();
        entries
            .iter()
            .filter_map(|entry| {
                let interval = interval_of(entry);
                if !interval.intersects(&window) {
                    return None;
                }
                Some(VisibleEntry {
                    entry,
                    start_x: self.datetime_to_pixel(interval.start()),
                    stop_x: self.datetime_to_pixel(interval.stop()),
                })
            })
            .collect()
    }

    /// Minutes between hour/minute guidelines so labels `label_width` pixels
    /// wide do not collide.
    pub fn guideline_minutes(&self, label_width: f64) -> u32 {
        let pixels_per_second = self.pixels_per_second();
        if pixels_per_second <= 0.0 {
            return 60;
        }
        let minutes = ((label_width * 1.3 / pixels_per_second) / 60.0).max(0.0) as u32;
        match minutes {
            60.. => (minutes / 60 + 1) * 60,
            30..=59 => 60,
            15..=29 => 30,
            10..=14 => 15,
            5..=9 => 10,
            1..=4 => 5,
            0 => 1,
        }
    }

    fn span_ms(&self) -> i64 {
        self.stop_ms - self.start_ms
    }

    /// Zero when the canvas is narrower than both paddings; every time then
    /// maps to `side_padding`, which keeps the mapping monotonic.
    fn axis_width(&self) -> f64 {
        (self.canvas_width - 2.0 * self.side_padding).max(0.0)
    }

    fn left_edge(&self) -> f64 {
        self.side_padding
    }

    /// `canvas_width - side_padding`, or `side_padding` on a canvas narrower
    /// than `2 * side_padding`.
    fn right_edge(&self) -> f64 {
        self.side_padding + self.axis_width()
    }

    fn offset_of(&self, t: NaiveDateTime) -> i64 {
        (t - day_start(self.date)).num_milliseconds()
    }

    fn at_offset(&self, offset_ms: i64) -> NaiveDateTime {
        day_start(self.date) + Duration::milliseconds(offset_ms)
    }
}

fn clamp_view_span(start: i64, span: i64, day_start: i64, day_end: i64) -> (i64, i64) {
    let day_span = (day_end - day_start).max(1);
    let span = span.clamp(MIN_SPAN_MS.min(day_span), day_span);
    let max_start = day_end - span;
    let clamped_start = start.clamp(day_start, max_start);
    (clamped_start, clamped_start + span)
}
