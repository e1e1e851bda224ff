use std::path::{Path, PathBuf};

/// Root of all instance work directories.
///
/// `PORTHOLE_DATA_DIR` overrides the platform default, mainly for tests.
pub fn base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PORTHOLE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("porthole")
}

/// Per-instance work directory: `<base>/<id>-<name>/` or `<base>/<id>/`
pub fn work_dir(id: &str, name: Option<&str>) -> PathBuf {
    work_dir_in(&base_dir(), id, name)
}

pub fn work_dir_in(base: &Path, id: &str, name: Option<&str>) -> PathBuf {
    let dir_name = match name {
        Some(n) => format!("{id}-{n}"),
        None => id.to_string(),
    };
    base.join(dir_name)
}

/// File where the machine runner records the instance status.
pub fn status_file(id: &str, name: Option<&str>) -> PathBuf {
    work_dir(id, name).join("status")
}

/// Status document exported from the guest agent channel.
pub fn guest_status_file(id: &str, name: Option<&str>) -> PathBuf {
    work_dir(id, name).join("guest-status.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_includes_name_when_present() {
        let base = Path::new("/data");
        assert_eq!(
            work_dir_in(base, "cafe0123", Some("dev")),
            Path::new("/data/cafe0123-dev")
        );
        assert_eq!(
            work_dir_in(base, "cafe0123", None),
            Path::new("/data/cafe0123")
        );
    }
}
