use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use timetag_core::settings::{default_db_path, default_settings_path};
use timetag_core::Settings;

pub struct Config {
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
    pub poll_interval: Duration,
    idle_secs: Option<u64>,
    new_entry_secs: Option<u64>,
}

impl Config {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut db_path = default_db_path();
        let mut settings_path = default_settings_path();
        let mut poll_ms: u64 = 1000;
        let mut idle_secs = None;
        let mut new_entry_secs = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = args.next().context("missing value for --db")?;
                    db_path = PathBuf::from(value);
                }
                "--config" => {
                    let value = args.next().context("missing value for --config")?;
                    settings_path = PathBuf::from(value);
                }
                "--poll-ms" => {
                    let value = args.next().context("missing value for --poll-ms")?;
                    poll_ms = parse_positive("--poll-ms", &value)?;
                }
                "--idle-secs" => {
                    let value = args.next().context("missing value for --idle-secs")?;
                    idle_secs = Some(parse_positive("--idle-secs", &value)?);
                }
                "--new-entry-secs" => {
                    let value = args.next().context("missing value for --new-entry-secs")?;
                    new_entry_secs = Some(parse_positive("--new-entry-secs", &value)?);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => bail!("unknown argument: {arg}"),
            }
        }

        Ok(Self {
            db_path,
            settings_path,
            poll_interval: Duration::from_millis(poll_ms),
            idle_secs,
            new_entry_secs,
        })
    }

    /// Loads the settings file (creating it with defaults if missing) and
    /// applies command-line overrides on top.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load_or_create(&self.settings_path).with_context(|| {
            format!("failed to load settings: {}", self.settings_path.display())
        })?;
        if let Some(idle_secs) = self.idle_secs {
            settings.inactive_after_idle_seconds = idle_secs;
        }
        if let Some(new_entry_secs) = self.new_entry_secs {
            settings.seconds_before_new_entry = new_entry_secs;
        }
        Ok(settings)
    }
}

fn parse_positive(flag: &str, value: &str) -> Result<u64> {
    let parsed = value
        .parse::<u64>()
        .with_context(|| format!("invalid {flag} value: {value}"))?;
    if parsed == 0 {
        bail!("{flag} must be greater than zero");
    }
    Ok(parsed)
}

fn print_help() {
    println!(
        "\
TimeTag Backend

Usage:
  timetag-backend [--db <path>] [--config <path>] [--poll-ms <ms>]
                  [--idle-secs <s>] [--new-entry-secs <s>]

Options:
  --db              SQLite file path (default: <data dir>/timetag.db)
  --config          Settings file path (default: <data dir>/configuration.json)
  --poll-ms         Sampling interval in milliseconds (default: 1000)
  --idle-secs       Override inactive_after_idle_seconds from the settings file
  --new-entry-secs  Override seconds_before_new_entry from the settings file
  -h, --help        Print this help"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse(args(&[
            "--db",
            "/tmp/tt.db",
            "--poll-ms",
            "250",
            "--idle-secs",
            "90",
        ]))
        .expect("parse");

        assert_eq!(config.db_path, PathBuf::from("/tmp/tt.db"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.idle_secs, Some(90));
        assert_eq!(config.new_entry_secs, None);
    }

    #[test]
    fn zero_and_unknown_values_are_rejected() {
        assert!(Config::parse(args(&["--poll-ms", "0"])).is_err());
        assert!(Config::parse(args(&["--new-entry-secs", "soon"])).is_err());
        assert!(Config::parse(args(&["--db"])).is_err());
        assert!(Config::parse(args(&["--verbose"])).is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_settings_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let settings_path = dir.path().join("configuration.json");
        let config = Config::parse(args(&[
            "--config",
            settings_path.to_str().expect("utf-8 path"),
            "--new-entry-secs",
            "30",
        ]))
        .expect("parse");

        let settings = config.settings().expect("settings");
        assert_eq!(settings.seconds_before_new_entry, 30);
        assert_eq!(settings.inactive_after_idle_seconds, 600);
        assert!(settings_path.exists());
    }
}
