use crate::domain::Pid;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process {0} no longer exists")]
    ProcessGone(Pid),

    #[error("Failed to start attach utility {path:?}: {source}")]
    AttachSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Attach utility for process {pid} did not finish within {timeout:?}")]
    AttachTimeout { pid: Pid, timeout: Duration },

    #[error("Attach utility exited with {0}")]
    AttachExit(ExitStatus),

    #[error("Process {pid} never created handshake socket {path:?}")]
    HandshakeMissing { pid: Pid, path: PathBuf },

    #[error("Token file {0:?} does not exist")]
    TokenMissing(PathBuf),

    #[error("Token file is malformed: expected 5 fields, found {0}")]
    TokenMalformed(usize),

    #[error("Process {0} has no control endpoint")]
    NoEndpoint(Pid),

    #[error("Control request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode control response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Agent rejected request with code {code}: {message}")]
    Rejected { code: i64, message: String },

    #[error("Supervisor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
