#![forbid(unsafe_code)]

use crate::attach::{AttachProvider, Layout};
use crate::domain::Pid;
use crate::error::Error;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Loads the agent by running the attach utility shipped in the install
/// directory: `<utility> <pid> load instrument false <payload>=<args>`.
///
/// A utility still running after `timeout` is killed.
#[derive(Debug, Clone)]
pub struct JattachProvider {
    layout: Layout,
    timeout: Duration,
}

impl JattachProvider {
    pub fn new(layout: Layout, timeout: Duration) -> Self {
        Self { layout, timeout }
    }

    fn command(&self, pid: Pid, agent_args: &str) -> Command {
        let mut cmd = Command::new(self.layout.utility());
        cmd.arg(pid.to_string())
            .args(["load", "instrument", "false"])
            .arg(format!("{}={agent_args}", self.layout.payload().display()))
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AttachProvider for JattachProvider {
    async fn load_agent(&self, pid: Pid, agent_args: &str) -> Result<(), Error> {
        let utility = self.layout.utility();
        debug!(pid, ?utility, "running attach utility");

        // The utility switches to the target's credentials itself.
        let output = tokio::time::timeout(self.timeout, self.command(pid, agent_args).output())
            .await
            .map_err(|_| Error::AttachTimeout {
                pid,
                timeout: self.timeout,
            })?
            .map_err(|source| Error::AttachSpawn {
                path: utility.clone(),
                source,
            })?;

        if !output.status.success() {
            warn!(
                pid,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "attach utility failed"
            );
            return Err(Error::AttachExit(output.status));
        }
        Ok(())
    }

    fn handshake_ready(&self, pid: Pid) -> bool {
        self.layout.socket_file(pid).exists()
    }
}
