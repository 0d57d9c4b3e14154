#![forbid(unsafe_code)]

//! Concurrent map of tracked processes.

use crate::domain::Pid;
use crate::probe::ProcessProbe;
use crate::process::ManagedProcess;
use crate::report::{EventId, ProcessSummary};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::info;

pub type ProcessHandle = Arc<Mutex<ManagedProcess>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    /// Same pid and start time already present; the new record was dropped.
    AlreadyTracked,
    /// The pid was reused by a new process; the old record was dropped.
    Replaced,
}

#[derive(Clone)]
struct Tracked {
    start_time: u64,
    handle: ProcessHandle,
    snapshot: watch::Receiver<ProcessSummary>,
}

/// Pid to process handle. Cheap to clone; clones share the map.
///
/// Handles are cloned out before any await so no shard lock is held across
/// I/O. Reporting reads [`Registry::summaries`], which never takes a
/// process lock.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<DashMap<Pid, Tracked>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `pid` is tracked with this exact start time.
    pub fn is_tracked(&self, pid: Pid, start_time: u64) -> bool {
        self.entries
            .get(&pid)
            .is_some_and(|tracked| tracked.start_time == start_time)
    }

    pub fn store(&self, process: ManagedProcess) -> StoreOutcome {
        let pid = process.pid();
        let start_time = process.start_time();
        let tracked = Tracked {
            start_time,
            snapshot: process.subscribe(),
            handle: Arc::new(Mutex::new(process)),
        };

        match self.entries.entry(pid) {
            Entry::Vacant(slot) => {
                slot.insert(tracked);
                StoreOutcome::Inserted
            }
            Entry::Occupied(slot) if slot.get().start_time == start_time => StoreOutcome::AlreadyTracked,
            Entry::Occupied(mut slot) => {
                info!(
                    pid,
                    old_start_time = slot.get().start_time,
                    start_time,
                    "pid reused, replacing tracked process"
                );
                slot.insert(tracked);
                StoreOutcome::Replaced
            }
        }
    }

    pub fn get(&self, pid: Pid) -> Option<ProcessHandle> {
        self.entries.get(&pid).map(|tracked| tracked.handle.clone())
    }

    pub fn remove(&self, pid: Pid) -> Option<ProcessHandle> {
        self.entries.remove(&pid).map(|(_, tracked)| tracked.handle)
    }

    /// Snapshot of all handles, ordered by pid.
    pub fn handles(&self) -> Vec<(Pid, ProcessHandle)> {
        let mut handles: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().handle.clone()))
            .collect();
        handles.sort_unstable_by_key(|(pid, _)| *pid);
        handles
    }

    /// Latest published summary of every process, ordered by pid.
    pub fn summaries(&self) -> Vec<ProcessSummary> {
        let mut summaries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.value().snapshot.borrow().clone())
            .collect();
        summaries.sort_unstable_by_key(|summary| summary.pid);
        summaries
    }

    pub fn pids(&self) -> Vec<Pid> {
        let mut pids: Vec<_> = self.entries.iter().map(|entry| *entry.key()).collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry whose process is gone. Returns the removed pids.
    pub fn sweep(&self, probe: &dyn ProcessProbe) -> Vec<Pid> {
        let gone: Vec<Pid> = self
            .pids()
            .into_iter()
            .filter(|pid| !probe.exists(*pid))
            .collect();

        gone.into_iter()
            .filter(|pid| self.remove(*pid).is_some())
            .inspect(|pid| {
                info!(event_id = EventId::ProcessShutdown.code(), pid = *pid, "java process exited");
            })
            .collect()
    }
}
