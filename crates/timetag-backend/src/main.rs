#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

mod config;
mod monitor;
mod recorder;

use anyhow::Result;
use chrono::{Local, SubsecRound};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use timetag_core::{Database, ForegroundProbe};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::monitor::PlatformMonitor;
use crate::recorder::Recorder;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetag_backend=info,timetag_core=info".into()),
        )
        .init();

    #[cfg(windows)]
    let _instance_guard = match single_instance::acquire() {
        Ok(Some(guard)) => guard,
        Ok(None) => {
            info!("another TimeTag Backend is already running");
            return Ok(());
        }
        Err(err) => {
            warn!("single-instance guard error: {err:#}");
            return Ok(());
        }
    };

    let config = Config::from_args()?;
    let settings = config.settings()?;
    let db = Database::open(&config.db_path)?;
    let mut monitor = PlatformMonitor::new();

    info!(
        db = %config.db_path.display(),
        poll_ms = config.poll_interval.as_millis() as u64,
        idle_secs = settings.inactive_after_idle_seconds,
        new_entry_secs = settings.seconds_before_new_entry,
        "TimeTag Backend started"
    );
    let mut recorder = Recorder::new(db, settings);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = Arc::clone(&shutdown);
    if let Err(err) = ctrlc::set_handler(move || {
        shutdown_signal.store(true, Ordering::SeqCst);
    }) {
        warn!("ctrlc handler registration warning: {err}");
    }

    while !shutdown.load(Ordering::Relaxed) {
        let sample = monitor.probe_foreground();
        let now = Local::now().naive_local().trunc_subsecs(0);
        match recorder.ingest(&sample, now) {
            Ok(outcome) => debug!(?outcome, "tick"),
            Err(err) => warn!("tick failed, retrying next interval: {err:#}"),
        }
        thread::sleep(config.poll_interval);
    }

    info!("TimeTag Backend stopped");
    Ok(())
}

#[cfg(windows)]
mod single_instance {
    use anyhow::{anyhow, Result};
    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE};
    use windows_sys::Win32::System::Threading::CreateMutexW;

    pub struct InstanceGuard {
        handle: HANDLE,
    }

    impl Drop for InstanceGuard {
        fn drop(&mut self) {
            if !self.handle.is_null() {
                unsafe {
                    CloseHandle(self.handle);
                }
            }
        }
    }

    /// `None` when another watcher in this session already holds the mutex.
    pub fn acquire() -> Result<Option<InstanceGuard>> {
        let name: Vec<u16> = "Local\\TimeTagBackendSingleton"
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        let handle = unsafe { CreateMutexW(std::ptr::null(), 0, name.as_ptr()) };
        if handle.is_null() {
            return Err(anyhow!("CreateMutexW failed"));
        }

        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe {
                CloseHandle(handle);
            }
            return Ok(None);
        }

        Ok(Some(InstanceGuard { handle }))
    }
}
