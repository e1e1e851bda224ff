//! External SPICE viewer resolution and launching.

use std::path::PathBuf;

use crate::descriptor::ConnectionDescriptor;
use crate::error::PortholeError;

/// Ordered viewer candidates, most capable and most commonly pre-installed
/// first. remote-viewer handles both TCP and unix-socket URIs; spicy is the
/// lighter spice-gtk client.
#[cfg(target_os = "macos")]
const VIEWER_CANDIDATES: &[&str] = &["remote-viewer", "spicy"];
#[cfg(target_os = "linux")]
const VIEWER_CANDIDATES: &[&str] = &["remote-viewer", "spicy", "virt-viewer"];
#[cfg(target_os = "windows")]
const VIEWER_CANDIDATES: &[&str] = &["remote-viewer.exe", "spicy.exe", "virt-viewer.exe"];
#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const VIEWER_CANDIDATES: &[&str] = &[];

/// Find the first installed viewer from the candidate table.
///
/// The whole table is exhausted before giving up; a single lookup miss never
/// short-circuits the search.
pub fn find_viewer() -> Result<PathBuf, PortholeError> {
    for candidate in VIEWER_CANDIDATES {
        if let Some(path) = command_path(candidate) {
            tracing::debug!(viewer = %path.display(), "found SPICE viewer");
            return Ok(path);
        }
    }
    Err(PortholeError::ViewerNotFound)
}

/// Resolve an executable name against `PATH`.
fn command_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    find_in(name, std::env::split_paths(&paths))
}

fn find_in(name: &str, dirs: impl Iterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Launch the external viewer for `descriptor` and return once it has
/// started.
///
/// The viewer runs independently of the caller: its exit status is drained
/// by a background task and logged, never surfaced as an error here.
pub async fn launch_viewer(descriptor: &ConnectionDescriptor) -> Result<(), PortholeError> {
    let viewer = find_viewer()?;
    let args = descriptor.viewer_args(&viewer)?;

    tracing::debug!(viewer = %viewer.display(), ?args, "launching SPICE viewer");

    let mut child = tokio::process::Command::new(&viewer)
        .args(&args)
        .spawn()
        .map_err(|source| PortholeError::Io {
            context: format!("launching viewer {}", viewer.display()),
            source,
        })?;

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => tracing::debug!("viewer exited cleanly"),
            Ok(status) => tracing::debug!(%status, "viewer exited with error"),
            Err(e) => tracing::debug!("failed to wait on viewer: {e}"),
        }
    });

    Ok(())
}
