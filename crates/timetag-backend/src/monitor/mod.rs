//! Foreground-window probes, one per platform.

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::WindowsMonitor as PlatformMonitor;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::LinuxMonitor as PlatformMonitor;

#[cfg(not(any(windows, target_os = "linux")))]
mod fallback;
#[cfg(not(any(windows, target_os = "linux")))]
pub use self::fallback::FallbackMonitor as PlatformMonitor;
