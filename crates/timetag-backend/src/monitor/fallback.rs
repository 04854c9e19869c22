use timetag_core::{ForegroundProbe, ProbeResult};
use tracing::warn;

/// Used where no foreground-window API is wired up. Every sample is logged
/// under the unknown identity and the user always counts as present.
pub struct FallbackMonitor;

impl FallbackMonitor {
    pub fn new() -> Self {
        warn!("no foreground probe for this platform; samples are logged as N/A");
        Self
    }
}

impl ForegroundProbe for FallbackMonitor {
    fn probe_foreground(&mut self) -> ProbeResult {
        ProbeResult::default()
    }
}
