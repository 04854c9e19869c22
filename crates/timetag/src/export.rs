use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use timetag_core::{Database, DayEntries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportRow {
    kind: &'static str,
    start: String,
    stop: String,
    duration: String,
    duration_secs: i64,
    label: String,
    detail: String,
}

pub fn default_output_path(data_root: &Path, date: NaiveDate, format: ExportFormat) -> PathBuf {
    data_root.join("exports").join(format!(
        "export_{}_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        date.format("%Y%m%d"),
        format.extension()
    ))
}

pub fn write_day(db: &Database, date: NaiveDate, format: ExportFormat, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create export directory: {}", parent.display()))?;
    }

    let rows = collect_rows(&db.entries_for_date(date)?);
    let file = File::create(output)
        .with_context(|| format!("failed to create export file: {}", output.display()))?;
    let writer = BufWriter::new(file);

    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(writer);
            for row in &rows {
                writer.serialize(row).context("failed to write CSV row")?;
            }
            writer.flush().context("failed to flush CSV writer")?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(writer, &rows).context("failed to write JSON export")?;
        }
    }
    Ok(())
}

fn collect_rows(day: &DayEntries) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    for entry in &day.logged {
        let window = &entry.application_window;
        rows.push(row(
            "logged",
            entry.start,
            entry.stop,
            window.title.clone(),
            window.application.name.clone(),
        ));
    }
    for entry in &day.tagged {
        rows.push(row(
            "tagged",
            entry.start,
            entry.stop,
            entry.category.name.clone(),
            entry.category.url.clone().unwrap_or_default(),
        ));
    }
    for entry in &day.activity {
        let label = if entry.active { "active" } else { "inactive" };
        rows.push(row(
            "activity",
            entry.start,
            entry.stop,
            label.to_owned(),
            String::new(),
        ));
    }
    rows.sort_by(|a, b| a.start.cmp(&b.start).then(a.kind.cmp(b.kind)));
    rows
}

fn row(
    kind: &'static str,
    start: NaiveDateTime,
    stop: NaiveDateTime,
    label: String,
    detail: String,
) -> ExportRow {
    let duration_secs = (stop - start).num_seconds();
    ExportRow {
        kind,
        start: start.format("%Y-%m-%d %H:%M:%S").to_string(),
        stop: stop.format("%Y-%m-%d %H:%M:%S").to_string(),
        duration: format_duration(duration_secs),
        duration_secs,
        label,
        detail,
    }
}

fn format_duration(seconds: i64) -> String {
    let secs = seconds.max(0);
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
