use std::env;
use std::fs;
use std::process::{Command, Stdio};

use timetag_core::{ForegroundProbe, ProbeResult};
use tracing::{debug, warn};

/// X11 probe built on `xprop`, `/proc/<pid>/cmdline`, `xprintidle` and
/// `loginctl`.
pub struct LinuxMonitor {
    session_id: Option<String>,
    idle_tool_missing: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct WindowProps {
    pid: Option<u32>,
    class_name: Option<String>,
    title: Option<String>,
}

impl LinuxMonitor {
    pub fn new() -> Self {
        let session_id = env::var("XDG_SESSION_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .or_else(user_session_id);
        if session_id.is_none() {
            warn!("no login session found; lock state is reported as unlocked");
        }
        Self {
            session_id,
            idle_tool_missing: false,
        }
    }

    fn idle_seconds(&mut self) -> u64 {
        if self.idle_tool_missing {
            return 0;
        }
        match run("xprintidle", &[]) {
            Some(output) => parse_idle_millis(&output).map_or(0, |ms| ms / 1000),
            None => {
                warn!("xprintidle unavailable; idle time is reported as zero");
                self.idle_tool_missing = true;
                0
            }
        }
    }

    fn locked(&self) -> bool {
        let Some(session_id) = &self.session_id else {
            return false;
        };
        run(
            "loginctl",
            &["show-session", "-pLockedHint", "--value", session_id],
        )
        .map_or(false, |output| parse_locked_hint(&output))
    }
}

impl ForegroundProbe for LinuxMonitor {
    fn probe_foreground(&mut self) -> ProbeResult {
        let idle_seconds = self.idle_seconds();
        let locked = self.locked();

        let Some(window_id) =
            run("xprop", &["-root", "_NET_ACTIVE_WINDOW"]).and_then(|out| active_window_id(&out))
        else {
            return ProbeResult {
                idle_seconds,
                locked,
                ..ProbeResult::default()
            };
        };

        let props = run(
            "xprop",
            &["-id", &window_id, "_NET_WM_PID", "WM_CLASS", "WM_NAME", "_NET_WM_NAME"],
        )
        .map(|out| parse_window_props(&out))
        .unwrap_or_default();

        ProbeResult {
            window_title: props.title,
            application_name: props.class_name,
            application_path: props.pid.and_then(process_command_line),
            idle_seconds,
            locked,
        }
    }
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| debug!(program, %err, "spawn failed"))
        .ok()?;
    if !output.status.success() {
        debug!(program, status = ?output.status.code(), "command failed");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn user_session_id() -> Option<String> {
    let user = env::var("USER")
        .ok()
        .or_else(|| run("whoami", &[]).map(|out| out.trim().to_owned()))?;
    let sessions = run("loginctl", &["show-user", "-pSessions", "--value", &user])?;
    sessions.split_whitespace().next().map(str::to_owned)
}

fn process_command_line(pid: u32) -> Option<String> {
    let raw = fs::read(format!("/proc/{pid}/cmdline")).ok()?;
    parse_cmdline(&raw)
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007`; `0x0` means none.
fn active_window_id(output: &str) -> Option<String> {
    let id = output.trim().rsplit(' ').next()?.trim();
    if !id.starts_with("0x") || id == "0x0" {
        return None;
    }
    Some(id.to_owned())
}

fn parse_window_props(output: &str) -> WindowProps {
    let mut props = WindowProps::default();
    let mut fallback_title = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        let value = value.trim();
        if key.starts_with("_NET_WM_PID") {
            props.pid = value.parse().ok().filter(|pid| *pid != 0);
        } else if key.starts_with("_NET_WM_NAME") {
            props.title = Some(unquote(value));
        } else if key.starts_with("WM_NAME") {
            fallback_title = Some(unquote(value));
        } else if key.starts_with("WM_CLASS") {
            props.class_name = class_name(value);
        }
    }
    if props.title.is_none() {
        props.title = fallback_title;
    }
    props
}

/// The class half of `"instance", "Class"`.
fn class_name(value: &str) -> Option<String> {
    let (_, class) = value.rsplit_once("\", \"")?;
    let class = class.strip_suffix('"').unwrap_or(class).trim();
    (!class.is_empty()).then(|| class.to_owned())
}

fn unquote(value: &str) -> String {
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = value.strip_suffix('"').unwrap_or(value);
    value.replace("\\\"", "\"")
}

fn parse_cmdline(raw: &[u8]) -> Option<String> {
    let joined = String::from_utf8_lossy(raw).replace('\0', " ");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_idle_millis(output: &str) -> Option<u64> {
    output.trim().parse().ok()
}

fn parse_locked_hint(output: &str) -> bool {
    output.trim().eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_window_id_is_last_token() {
        assert_eq!(
            active_window_id("_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007\n").as_deref(),
            Some("0x3a00007")
        );
        assert_eq!(active_window_id("_NET_ACTIVE_WINDOW(WINDOW): window id # 0x0\n"), None);
        assert_eq!(active_window_id(""), None);
    }

    #[test]
    fn window_props_prefer_net_wm_name() {
        let output = "\
_NET_WM_PID(CARDINAL) = 4242
WM_CLASS(STRING) = \"Navigator\", \"firefox\"
WM_NAME(STRING) = \"legacy title\"
_NET_WM_NAME(UTF8_STRING) = \"Docs \\\"draft\\\" - Mozilla Firefox\"
";
        let props = parse_window_props(output);
        assert_eq!(props.pid, Some(4242));
        assert_eq!(props.class_name.as_deref(), Some("firefox"));
        assert_eq!(
            props.title.as_deref(),
            Some("Docs \"draft\" - Mozilla Firefox")
        );
    }

    #[test]
    fn window_props_fall_back_to_wm_name() {
        let output = "\
_NET_WM_PID:  not found.
WM_CLASS(STRING) = \"xterm\", \"XTerm\"
WM_NAME(STRING) = \"user@host: ~\"
_NET_WM_NAME:  not found.
";
        let props = parse_window_props(output);
        assert_eq!(props.pid, None);
        assert_eq!(props.class_name.as_deref(), Some("XTerm"));
        assert_eq!(props.title.as_deref(), Some("user@host: ~"));
    }

    #[test]
    fn cmdline_arguments_are_space_joined() {
        assert_eq!(
            parse_cmdline(b"/usr/bin/python3\0-m\0http.server\0").as_deref(),
            Some("/usr/bin/python3 -m http.server")
        );
        assert_eq!(parse_cmdline(b""), None);
    }

    #[test]
    fn lock_hint_and_idle_output() {
        assert!(parse_locked_hint("yes\n"));
        assert!(!parse_locked_hint("no\n"));
        assert!(!parse_locked_hint(""));
        assert_eq!(parse_idle_millis("61234\n"), Some(61234));
        assert_eq!(parse_idle_millis("n/a"), None);
    }
}
