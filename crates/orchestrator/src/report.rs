#![forbid(unsafe_code)]

//! Payloads for the reporting sink.
//!
//! Reports are ordinary `tracing` events. Each carries an `event_id` field
//! from [`EventId`] so that log shippers can route them without parsing the
//! message.

use crate::domain::{Endpoint, InjectionStatus, ModuleInfo, Pid};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EventId {
    StartUp = 1000,
    LogValue = 1001,
    EnvValue = 1002,
    ConfigValue = 1003,
    HttpToken = 1005,
    Attach = 1006,
    AttachReadToken = 1007,
    Watch = 1010,
    HeartBeat = 1011,
    Dependency = 1016,
    AgentExit = 1017,
    ProcessStartup = 1018,
    ProcessShutdown = 1019,
    AgentInit = 1020,
}

impl EventId {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Point-in-time view of one tracked process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub pid: Pid,
    pub start_time: u64,
    pub cmdline: Vec<String>,
    pub status: InjectionStatus,
    pub endpoint: Option<Endpoint>,
    pub blacklisted: bool,
    pub modules: Vec<ModuleInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartBeatEntry {
    pub pid: Pid,
    pub start_time: u64,
    pub status: InjectionStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartBeat {
    pub version: &'static str,
    pub processes: Vec<HeartBeatEntry>,
}

impl HeartBeat {
    pub fn new() -> Self {
        Self {
            version: crate::environ::VERSION,
            processes: Vec::new(),
        }
    }

    pub fn append(&mut self, summary: &ProcessSummary) {
        self.processes.push(HeartBeatEntry {
            pid: summary.pid,
            start_time: summary.start_time,
            status: summary.status,
        });
    }
}

impl Default for HeartBeat {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a report payload. Serialization of these plain structs cannot
/// fail; an empty object is logged if it ever does.
pub fn to_json<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "{}".into())
}
