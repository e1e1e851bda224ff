//! Guest GUI environment detection: display server, displays, resolution,
//! idle time. Every probe degrades to an empty result on failure.

use std::path::Path;
use std::time::Duration;

use porthole_agent::{ClipboardStatus, GuiInfo};

use crate::runner::Runner;

const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";
const RESOLUTION_TIMEOUT: Duration = Duration::from_secs(2);
const IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Assemble the GUI report for a Linux guest.
pub async fn detect<R: Runner>(runner: &R, clipboard: ClipboardStatus) -> GuiInfo {
    let (display_server, displays) = if wayland_active() {
        ("Wayland", wayland_displays())
    } else if x11_active() {
        ("X11", x11_displays(Path::new(X11_SOCKET_DIR)))
    } else {
        ("none", Vec::new())
    };

    let session_active = !displays.is_empty();
    let resolution = if session_active {
        detect_resolution(runner, display_server).await
    } else {
        String::new()
    };
    let idle_time_ms = if session_active {
        detect_idle_ms(runner, display_server).await
    } else {
        0
    };

    GuiInfo {
        display_server: display_server.into(),
        session_active,
        displays,
        resolution,
        idle_time_ms,
        clipboard,
    }
}

fn wayland_active() -> bool {
    if std::env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty()) {
        return true;
    }
    std::env::var("XDG_SESSION_TYPE").as_deref() == Ok("wayland")
}

fn x11_active() -> bool {
    Path::new(X11_SOCKET_DIR).exists()
        || std::env::var_os("DISPLAY").is_some_and(|v| !v.is_empty())
}

fn wayland_displays() -> Vec<String> {
    match std::env::var("WAYLAND_DISPLAY") {
        Ok(display) if !display.is_empty() => vec![display],
        _ => Vec::new(),
    }
}

fn x11_displays(socket_dir: &Path) -> Vec<String> {
    x11_displays_with(socket_dir, std::env::var("DISPLAY").ok())
}

fn x11_displays_with(socket_dir: &Path, display: Option<String>) -> Vec<String> {
    if let Some(display) = display.filter(|d| !d.is_empty()) {
        return vec![display];
    }

    // Socket names are X<n> for display :<n>.
    let Ok(entries) = std::fs::read_dir(socket_dir) else {
        return Vec::new();
    };
    let mut displays: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix('X').map(|num| format!(":{num}"))
        })
        .collect();
    displays.sort();
    displays
}

async fn detect_resolution<R: Runner>(runner: &R, display_server: &str) -> String {
    match display_server {
        "X11" => {
            let xrandr = runner.run("xrandr", &[], RESOLUTION_TIMEOUT).await;
            if let Some(resolution) = parse_xrandr(xrandr.stdout()) {
                return resolution;
            }
            let xdpyinfo = runner.run("xdpyinfo", &[], RESOLUTION_TIMEOUT).await;
            parse_xdpyinfo(xdpyinfo.stdout()).unwrap_or_default()
        }
        "Wayland" => {
            let wlr = runner.run("wlr-randr", &[], RESOLUTION_TIMEOUT).await;
            parse_wlr_randr(wlr.stdout()).unwrap_or_default()
        }
        _ => String::new(),
    }
}

/// The active xrandr mode is the line flagged with `*`,
/// e.g. `   1920x1080     60.00*+`.
fn parse_xrandr(output: &str) -> Option<String> {
    for line in output.lines() {
        if !line.contains('*') {
            continue;
        }
        if let Some(first) = line.split_whitespace().next() {
            if first.contains('x') {
                return Some(first.to_string());
            }
        }
    }
    None
}

/// xdpyinfo reports `dimensions:    1920x1080 pixels (...)`.
fn parse_xdpyinfo(output: &str) -> Option<String> {
    for line in output.lines() {
        if line.contains("dimensions:") {
            let mut fields = line.split_whitespace();
            fields.next();
            if let Some(dims) = fields.next() {
                return Some(dims.to_string());
            }
        }
    }
    None
}

/// wlr-randr reports the active mode as `1920x1080@60.000000 (current)`.
fn parse_wlr_randr(output: &str) -> Option<String> {
    for line in output.lines() {
        if !line.contains("current") {
            continue;
        }
        for field in line.split_whitespace() {
            if field.contains('x') && field.contains('@') {
                return field.split('@').next().map(str::to_string);
            }
        }
    }
    None
}

async fn detect_idle_ms<R: Runner>(runner: &R, display_server: &str) -> u64 {
    // Wayland idle tracking is compositor-specific; report zero there.
    if display_server != "X11" {
        return 0;
    }

    let xprintidle = runner.run("xprintidle", &[], IDLE_TIMEOUT).await;
    if let Ok(idle) = xprintidle.stdout().trim().parse::<u64>() {
        return idle;
    }

    let xssstate = runner.run("xssstate", &["-i"], IDLE_TIMEOUT).await;
    xssstate.stdout().trim().parse::<u64>().unwrap_or(0)
}
