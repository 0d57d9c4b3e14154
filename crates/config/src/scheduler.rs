use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

/// Timer intervals of the supervisor loops. All values are **measured in
/// seconds**.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Scheduler {
    /// How often the process table is scanned for new JVMs.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub scan_interval: Duration,

    /// How often tracked processes are checked for liveness.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub liveness_interval: Duration,

    /// How often desired and actual injection state are reconciled.
    ///
    /// ## Note
    ///
    /// A failed attach is not retried on later ticks; see the agent mode
    /// documentation.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub inject_interval: Duration,

    /// How often one status line per tracked process is logged.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub log_report_interval: Duration,

    /// How often the aggregated heartbeat is logged.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub heartbeat_interval: Duration,

    /// How often dependency snapshots are collected from injected agents.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub dependency_interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            liveness_interval: Duration::from_secs(10),
            inject_interval: Duration::from_secs(30),
            log_report_interval: Duration::from_secs(6 * 3600),
            heartbeat_interval: Duration::from_secs(5 * 60),
            dependency_interval: Duration::from_secs(12 * 3600),
        }
    }
}
