use std::collections::HashMap;
use std::path::Path;

use timetag_core::{ForegroundProbe, ProbeResult};
use windows_sys::Win32::Foundation::{CloseHandle, FILETIME, HANDLE, HWND};
use windows_sys::Win32::System::StationsAndDesktops::{
    CloseDesktop, OpenInputDesktop, DESKTOP_SWITCHDESKTOP,
};
use windows_sys::Win32::System::SystemInformation::GetTickCount;
use windows_sys::Win32::System::Threading::{
    GetProcessTimes, OpenProcess, QueryFullProcessImageNameW, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
};

const PROCESS_CACHE_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct ProcessKey {
    pid: u32,
    creation_time: u64,
}

#[derive(Debug, Clone)]
struct ProcessMeta {
    exe_name: String,
    process_path: String,
}

pub struct WindowsMonitor {
    process_cache: HashMap<ProcessKey, ProcessMeta>,
}

impl WindowsMonitor {
    pub fn new() -> Self {
        Self {
            process_cache: HashMap::new(),
        }
    }

    fn resolve_process(&mut self, pid: u32) -> Option<ProcessMeta> {
        let Some(creation_time) = process_creation_time(pid) else {
            return process_meta(pid);
        };

        let key = ProcessKey { pid, creation_time };
        if let Some(meta) = self.process_cache.get(&key) {
            return Some(meta.clone());
        }

        let meta = process_meta(pid)?;
        if self.process_cache.len() >= PROCESS_CACHE_LIMIT {
            self.process_cache.clear();
        }
        self.process_cache.insert(key, meta.clone());
        Some(meta)
    }
}

impl ForegroundProbe for WindowsMonitor {
    fn probe_foreground(&mut self) -> ProbeResult {
        let idle_seconds = idle_millis().map_or(0, |ms| u64::from(ms / 1000));
        let locked = session_locked();

        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_null() {
            return ProbeResult {
                idle_seconds,
                locked,
                ..ProbeResult::default()
            };
        }

        let window_title = window_title(hwnd);
        let meta = window_pid(hwnd).and_then(|pid| self.resolve_process(pid));
        ProbeResult {
            window_title,
            application_name: meta.as_ref().map(|meta| meta.exe_name.clone()),
            application_path: meta.map(|meta| meta.process_path),
            idle_seconds,
            locked,
        }
    }
}

fn idle_millis() -> Option<u32> {
    let mut lii = LASTINPUTINFO {
        cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    let ok = unsafe { GetLastInputInfo(&mut lii) };
    if ok == 0 {
        return None;
    }

    let now_tick = unsafe { GetTickCount() };
    Some(now_tick.wrapping_sub(lii.dwTime))
}

/// The input desktop cannot be opened while the workstation is locked.
fn session_locked() -> bool {
    let desktop = unsafe { OpenInputDesktop(0, 0, DESKTOP_SWITCHDESKTOP) };
    if desktop.is_null() {
        return true;
    }
    unsafe {
        CloseDesktop(desktop);
    }
    false
}

fn window_pid(hwnd: HWND) -> Option<u32> {
    let mut pid: u32 = 0;
    unsafe {
        GetWindowThreadProcessId(hwnd, &mut pid);
    }
    if pid == 0 {
        None
    } else {
        Some(pid)
    }
}

fn window_title(hwnd: HWND) -> Option<String> {
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return None;
    }

    let mut buffer: Vec<u16> = vec![0; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32) };
    if copied <= 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buffer[..copied as usize]).trim().to_owned())
}

fn process_creation_time(pid: u32) -> Option<u64> {
    with_process_handle(pid, |handle| {
        let mut creation = zero_filetime();
        let mut exit = zero_filetime();
        let mut kernel = zero_filetime();
        let mut user = zero_filetime();

        let ok = unsafe { GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user) };
        if ok == 0 {
            return None;
        }
        Some(filetime_to_u64(creation))
    })
}

fn process_meta(pid: u32) -> Option<ProcessMeta> {
    let process_path = with_process_handle(pid, |handle| {
        let mut buffer: Vec<u16> = vec![0; 4096];
        let mut size: u32 = buffer.len() as u32;
        let ok = unsafe { QueryFullProcessImageNameW(handle, 0, buffer.as_mut_ptr(), &mut size) };
        if ok == 0 || size == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buffer[..size as usize]))
    })?;

    let exe_name = Path::new(&process_path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())?;
    Some(ProcessMeta {
        exe_name,
        process_path,
    })
}

fn with_process_handle<T>(pid: u32, f: impl FnOnce(HANDLE) -> Option<T>) -> Option<T> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
    if handle.is_null() {
        return None;
    }

    let result = f(handle);
    unsafe {
        CloseHandle(handle);
    }
    result
}

fn zero_filetime() -> FILETIME {
    FILETIME {
        dwLowDateTime: 0,
        dwHighDateTime: 0,
    }
}

fn filetime_to_u64(value: FILETIME) -> u64 {
    ((value.dwHighDateTime as u64) << 32) | (value.dwLowDateTime as u64)
}
