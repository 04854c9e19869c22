mod export;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use timetag_core::interval::{day_start, last_second};
use timetag_core::settings::{default_data_dir, default_db_path};
use timetag_core::tagging::{clamp_candidate, fill_gap};
use timetag_core::{CategoryUpdate, Database, Interval, Viewport};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::export::ExportFormat;

#[derive(Parser)]
#[command(name = "timetag", about = "Inspect and tag the activity log recorded by timetag-backend")]
struct Cli {
    /// SQLite file path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Logged, tagged and activity entries of a day as JSON
    Entries {
        /// Day to show (YYYY-MM-DD, default today)
        date: Option<NaiveDate>,
    },
    /// Main categories with their sub categories as JSON
    Categories,
    /// Tagged seconds for a category
    Stats {
        main: String,
        sub: Option<String>,
    },
    /// Tag an interval, merging with touching entries of the same category
    Tag(TagArgs),
    /// Change the start and stop of a tagged entry
    Retime {
        id: i64,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a tagged entry
    Untag { id: i64 },
    /// Edit or delete categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Pixel layout of a day's entries on a timeline canvas
    Layout(LayoutArgs),
    /// Write a day's entries to CSV or JSON
    Export {
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Copy the database with SQLite's online backup
    Backup {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TagArgs {
    main: String,
    sub: Option<String>,
    /// Anchor of the drawn interval (HH:MM[:SS] or full datetime)
    #[arg(long, requires = "to", conflicts_with = "fill_at")]
    from: Option<String>,
    /// Free edge of the drawn interval
    #[arg(long, requires = "from")]
    to: Option<String>,
    /// Tag the whole untagged gap around this time
    #[arg(long)]
    fill_at: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Rename, re-link or move a category
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        /// Link opened for tagged time; `{{date}}` expands to the entry date
        #[arg(long, conflicts_with = "clear_url")]
        url: Option<String>,
        #[arg(long)]
        clear_url: bool,
        /// Make this a sub category of another main category
        #[arg(long, conflicts_with = "main")]
        parent: Option<i64>,
        /// Make this a main category
        #[arg(long)]
        main: bool,
    },
    /// Delete a category without sub categories or tagged time
    Delete { id: i64 },
}

#[derive(Args)]
struct LayoutArgs {
    date: Option<NaiveDate>,
    #[arg(long, default_value_t = 1000.0)]
    width: f64,
    #[arg(long, default_value_t = 20.0)]
    padding: f64,
    /// Visible window start (HH:MM[:SS])
    #[arg(long, requires = "until")]
    since: Option<String>,
    #[arg(long, requires = "since")]
    until: Option<String>,
    /// Zoom steps around --focus; negative zooms out
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    zoom: i32,
    #[arg(long)]
    focus: Option<String>,
    /// Pan steps; negative pans left
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pan: i32,
    #[arg(long, default_value_t = 40.0)]
    label_width: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetag=info,timetag_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);
    let mut db = Database::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    match cli.command {
        Command::Entries { date } => {
            let day = db.entries_for_date(date.unwrap_or_else(today))?;
            print_json(&day)?;
        }
        Command::Categories => print_json(&db.category_tree()?)?,
        Command::Stats { main, sub } => {
            let seconds = db.category_statistics(&main, sub.as_deref())?;
            print_json(&json!({ "seconds": seconds }))?;
        }
        Command::Tag(args) => {
            let entry = tag(&mut db, args)?;
            info!(id = entry.id, category = %entry.category.name, "tagged");
            print_json(&entry)?;
        }
        Command::Retime { id, from, to, date } => {
            let date = date.unwrap_or_else(today);
            let interval = Interval::new(parse_time(date, &from)?, parse_time(date, &to)?)?;
            print_json(&db.update_tagged(id, interval)?)?;
        }
        Command::Untag { id } => {
            db.delete_tagged(id)?;
            info!(id, "deleted tagged entry");
        }
        Command::Category(command) => edit_category(&mut db, command)?,
        Command::Layout(args) => layout(&db, args)?,
        Command::Export {
            date,
            format,
            output,
        } => {
            let date = date.unwrap_or_else(today);
            let output = output.unwrap_or_else(|| {
                export::default_output_path(&data_root(&db_path), date, format)
            });
            export::write_day(&db, date, format, &output)?;
            println!("{}", output.display());
        }
        Command::Backup { output } => {
            let output = output.unwrap_or_else(|| {
                data_root(&db_path).join("backups").join(format!(
                    "timetag_{}.db",
                    Local::now().format("%Y%m%d_%H%M%S")
                ))
            });
            db.backup_to(&output)
                .with_context(|| format!("failed to back up to {}", output.display()))?;
            println!("{}", output.display());
        }
    }
    Ok(())
}

fn tag(db: &mut Database, args: TagArgs) -> Result<timetag_core::TaggedEntry> {
    let date = args.date.unwrap_or_else(today);
    let existing: Vec<Interval> = db
        .tagged_by_date(date)?
        .iter()
        .map(|entry| entry.interval())
        .collect();

    let candidate = match (args.from, args.to, args.fill_at) {
        (Some(from), Some(to), None) => {
            clamp_candidate(parse_time(date, &from)?, parse_time(date, &to)?, &existing)
        }
        (None, None, Some(at)) => {
            let whole_day = Interval::new(day_start(date), last_second(date))?;
            fill_gap(parse_time(date, &at)?, &existing, &whole_day)
                .with_context(|| format!("{at} is already tagged"))?
        }
        _ => bail!("pass either --from and --to, or --fill-at"),
    };
    if candidate.is_empty() {
        bail!("the interval is fully covered by existing tagged entries");
    }

    Ok(db.tag(candidate, &args.main, args.sub.as_deref())?)
}

fn edit_category(db: &mut Database, command: CategoryCommand) -> Result<()> {
    match command {
        CategoryCommand::Edit {
            id,
            name,
            url,
            clear_url,
            parent,
            main,
        } => {
            let update = CategoryUpdate {
                name,
                url: if clear_url { Some(None) } else { url.map(Some) },
                parent_id: if main { Some(None) } else { parent.map(Some) },
            };
            print_json(&db.update_category(id, update)?)?;
        }
        CategoryCommand::Delete { id } => {
            db.delete_category(id)?;
            info!(id, "deleted category");
        }
    }
    Ok(())
}

fn layout(db: &Database, args: LayoutArgs) -> Result<()> {
    let date = args.date.unwrap_or_else(today);
    let mut viewport = match (&args.since, &args.until) {
        (Some(since), Some(until)) => Viewport::new(
            parse_time(date, since)?,
            parse_time(date, until)?,
            args.width,
            args.padding,
        ),
        _ => Viewport::full_day(date, args.width, args.padding),
    };

    let focus = match &args.focus {
        Some(focus) => parse_time(date, focus)?,
        None => viewport.pixel_to_datetime(args.width / 2.0),
    };
    for _ in 0..args.zoom.unsigned_abs() {
        viewport = viewport.zoom(focus, args.zoom > 0);
    }
    for _ in 0..args.pan.unsigned_abs() {
        viewport = viewport.move_by_step(args.pan > 0);
    }

    let day = db.entries_for_date(date)?;
    print_json(&json!({
        "start": viewport.start(),
        "stop": viewport.stop(),
        "guideline_minutes": viewport.guideline_minutes(args.label_width),
        "logged": viewport.layout(&day.logged, |entry| entry.interval()),
        "tagged": viewport.layout(&day.tagged, |entry| entry.interval()),
        "activity": viewport.layout(&day.activity, |entry| entry.interval()),
    }))
}

/// Accepts `HH:MM`, `HH:MM:SS` on `date`, or a full `YYYY-MM-DDTHH:MM:SS`.
fn parse_time(date: NaiveDate, value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime);
        }
    }
    for format in ["%H:%M:%S", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(value, format) {
            return Ok(date.and_time(time));
        }
    }
    bail!("invalid time: {value}")
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn data_root(db_path: &std::path::Path) -> PathBuf {
    db_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to write JSON")?;
    writeln!(out)?;
    Ok(())
}
