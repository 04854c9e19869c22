use crate::model::UNKNOWN;

/// One reading of the foreground window and input state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub window_title: Option<String>,
    pub application_name: Option<String>,
    pub application_path: Option<String>,
    pub idle_seconds: u64,
    pub locked: bool,
}

/// Platform adapter that reads the current foreground state.
pub trait ForegroundProbe {
    fn probe_foreground(&mut self) -> ProbeResult;
}

/// The `(title, application name, application path)` triple a sample is
/// logged under, with unresolved fields replaced by [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowIdentity {
    pub title: String,
    pub application_name: String,
    pub application_path: String,
}

impl ProbeResult {
    pub fn identity(&self, log_application_path: bool) -> WindowIdentity {
        let application_path = if log_application_path {
            or_unknown(self.application_path.as_deref())
        } else {
            UNKNOWN.to_owned()
        };
        WindowIdentity {
            title: or_unknown(self.window_title.as_deref()),
            application_name: or_unknown(self.application_name.as_deref()),
            application_path,
        }
    }
}

fn or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN)
        .to_owned()
}
