#![forbid(unsafe_code)]

use crate::domain::Pid;
use crate::probe::{ProcessDetails, ProcessProbe};
use nix::errno::Errno;
use nix::sys::signal::kill;
use procfs::process::Process;
use std::path::PathBuf;
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct ProcfsProbe;

impl ProcessProbe for ProcfsProbe {
    fn list_pids(&self) -> Vec<Pid> {
        let processes = match procfs::process::all_processes() {
            Ok(processes) => processes,
            Err(err) => {
                warn!(?err, "failed to list processes");
                return Vec::new();
            }
        };
        processes
            .filter_map(|process| match process {
                Ok(p) => Some(p.pid),
                Err(err) => {
                    trace!(?err, "failed to read process entry");
                    None
                }
            })
            .collect()
    }

    fn executable(&self, pid: Pid) -> Option<PathBuf> {
        match Process::new(pid).and_then(|p| p.exe()) {
            Ok(path) => Some(path),
            Err(err) => {
                trace!(pid, ?err, "failed to read exe path");
                None
            }
        }
    }

    fn details(&self, pid: Pid) -> Option<ProcessDetails> {
        let process = Process::new(pid).ok()?;
        let stat = match process.stat() {
            Ok(stat) => stat,
            Err(err) => {
                warn!(pid, ?err, "failed to read process stat");
                return None;
            }
        };
        let cmdline = process.cmdline().unwrap_or_else(|err| {
            warn!(pid, ?err, "failed to read process cmdline");
            Vec::new()
        });
        Some(ProcessDetails {
            cmdline,
            start_time: stat.starttime,
        })
    }

    fn exists(&self, pid: Pid) -> bool {
        // kill(0) and kill(-1) address process groups.
        if pid <= 0 {
            return false;
        }
        match kill(nix::unistd::Pid::from_raw(pid), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}
