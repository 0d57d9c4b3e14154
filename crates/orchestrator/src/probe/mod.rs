#![forbid(unsafe_code)]

mod procfs_probe;

pub use procfs_probe::ProcfsProbe;

use crate::domain::Pid;
use std::path::{Path, PathBuf};

/// Facts captured once when a target process is first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDetails {
    pub cmdline: Vec<String>,
    /// Start time in clock ticks since boot. Two processes that share a pid
    /// never share a start time.
    pub start_time: u64,
}

/// OS-facing process queries. None of these fail the caller: anything that
/// cannot be read is reported as absent.
pub trait ProcessProbe: Send + Sync {
    /// Every live pid. An unreadable process table yields an empty list.
    fn list_pids(&self) -> Vec<Pid>;
    /// Resolved executable path of `pid`.
    fn executable(&self, pid: Pid) -> Option<PathBuf>;
    fn details(&self, pid: Pid) -> Option<ProcessDetails>;
    fn exists(&self, pid: Pid) -> bool;
}

/// Decides which processes are target runtimes by executable suffix.
#[derive(Debug, Clone)]
pub struct TargetFilter {
    suffix: String,
}

impl TargetFilter {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn matches(&self, executable: &Path) -> bool {
        executable.to_string_lossy().ends_with(&self.suffix)
    }

    /// Whether `pid` runs a target executable. Resolution errors classify as
    /// "not a target".
    pub fn is_target_executable(&self, probe: &dyn ProcessProbe, pid: Pid) -> bool {
        probe
            .executable(pid)
            .is_some_and(|executable| self.matches(&executable))
    }
}
