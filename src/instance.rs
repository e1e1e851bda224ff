//! Thin view over the machine runner's on-disk instance record.
//!
//! The runner that boots the VM owns this data; porthole only reads it to
//! answer "does the instance exist" and "is it running" before touching any
//! display machinery.

use std::fmt;
use std::path::Path;

use crate::config::SystemConfig;
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Stopped,
    Unknown,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Running => "Running",
            InstanceStatus::Stopped => "Stopped",
            InstanceStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub status: InstanceStatus,
}

/// Read the instance record. `None` means the instance was never created.
pub fn inspect(sys_config: &SystemConfig) -> Option<Instance> {
    let work_dir = paths::work_dir(&sys_config.id, sys_config.name.as_deref());
    inspect_in(&work_dir, sys_config.display_name())
}

pub fn inspect_in(work_dir: &Path, name: &str) -> Option<Instance> {
    if !work_dir.exists() {
        return None;
    }

    let status = match std::fs::read_to_string(work_dir.join("status")) {
        Ok(contents) => match contents.trim() {
            "Running" => InstanceStatus::Running,
            "Stopped" => InstanceStatus::Stopped,
            _ => InstanceStatus::Unknown,
        },
        Err(_) => InstanceStatus::Unknown,
    };

    Some(Instance {
        name: name.to_string(),
        status,
    })
}
