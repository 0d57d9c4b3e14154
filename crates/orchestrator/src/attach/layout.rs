#![forbid(unsafe_code)]

use crate::domain::Pid;
use std::path::{Path, PathBuf};

/// Filesystem locations shared by the supervisor and injected agents.
#[derive(Debug, Clone)]
pub struct Layout {
    install_dir: PathBuf,
    temp_dir: PathBuf,
    utility: PathBuf,
    payload: PathBuf,
    socket_prefix: String,
}

impl Layout {
    pub fn new(install_dir: impl Into<PathBuf>, attach: &config::Attach) -> Self {
        Self {
            install_dir: install_dir.into(),
            temp_dir: std::env::temp_dir(),
            utility: attach.utility.clone(),
            payload: attach.payload.clone(),
            socket_prefix: attach.socket_prefix.clone(),
        }
    }

    /// Look for handshake sockets in `dir` instead of the OS temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn utility(&self) -> PathBuf {
        self.install_dir.join(&self.utility)
    }

    pub fn payload(&self) -> PathBuf {
        self.install_dir.join(&self.payload)
    }

    /// `<install>/run/<pid>`, created by the agent on startup.
    pub fn run_dir(&self, pid: Pid) -> PathBuf {
        self.install_dir.join("run").join(pid.to_string())
    }

    pub fn token_file(&self, pid: Pid) -> PathBuf {
        self.run_dir(pid).join(".token")
    }

    /// `<tmp>/.<prefix>_pid<pid>`, the target's attach listener socket.
    pub fn socket_file(&self, pid: Pid) -> PathBuf {
        self.temp_dir
            .join(format!(".{}_pid{pid}", self.socket_prefix))
    }
}
