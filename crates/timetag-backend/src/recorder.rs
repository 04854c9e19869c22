use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use timetag_core::continuity::Decision;
use timetag_core::{Database, ProbeResult, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub window: Decision,
    pub activity: Decision,
}

/// Persists probe samples into the logged and activity streams.
pub struct Recorder {
    db: Database,
    settings: Settings,
}

impl Recorder {
    pub fn new(db: Database, settings: Settings) -> Self {
        Self { db, settings }
    }

    pub fn ingest(&mut self, sample: &ProbeResult, now: NaiveDateTime) -> Result<TickOutcome> {
        let identity = sample.identity(self.settings.log_application_path);
        let window = self
            .db
            .get_or_create_window(&identity)
            .with_context(|| format!("failed to resolve window `{}`", identity.title))?;

        let max_delta = self.settings.max_delta();
        let window = self
            .db
            .record_window_sample(window.id, now, max_delta)
            .context("failed to record logged entry")?;

        let active = self.settings.is_active(sample.idle_seconds, sample.locked);
        let activity = self
            .db
            .record_activity_sample(active, now, max_delta)
            .context("failed to record activity entry")?;

        Ok(TickOutcome { window, activity })
    }
}
