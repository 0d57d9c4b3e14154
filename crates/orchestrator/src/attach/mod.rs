#![forbid(unsafe_code)]

//! Turning a bare JVM pid into a reachable agent control endpoint.

mod jattach;
mod layout;

pub use jattach::JattachProvider;
pub use layout::Layout;

use crate::domain::{Endpoint, HandshakeToken, Pid};
use crate::error::Error;
use crate::probe::ProcessProbe;
use crate::report::EventId;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The agent binds the wildcard address on an ephemeral port and reports the
/// real port through the token file.
const SERVER_IP: &str = "0.0.0.0";
const SERVER_PORT: u16 = 0;

/// The mechanism that loads the agent payload into a running JVM.
#[async_trait]
pub trait AttachProvider: Send + Sync {
    /// Run the attach and wait for it to finish. Nothing of the attach
    /// process is kept once this returns.
    async fn load_agent(&self, pid: Pid, agent_args: &str) -> Result<(), Error>;

    /// Whether the target created its attach listener socket.
    fn handshake_ready(&self, pid: Pid) -> bool;
}

/// Arguments handed to the agent on attach.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentArgs {
    pub rasp_home: String,
    pub namespace: String,
    pub enable_auth: bool,
    pub username: String,
    pub password: String,
}

impl AgentArgs {
    pub fn new(layout: &Layout, agent: &config::Agent) -> Self {
        Self {
            rasp_home: layout.install_dir().display().to_string(),
            namespace: agent.namespace.clone(),
            enable_auth: agent.enable_auth,
            username: agent.username.clone(),
            password: agent.password.clone(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "raspHome={};serverIp={SERVER_IP};serverPort={SERVER_PORT};namespace={};enableAuth={};username={};password={}",
            self.rasp_home, self.namespace, self.enable_auth, self.username, self.password
        )
    }
}

impl std::fmt::Debug for AgentArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentArgs")
            .field("rasp_home", &self.rasp_home)
            .field("namespace", &self.namespace)
            .field("enable_auth", &self.enable_auth)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Runs the attach protocol against one pid:
///
/// 1. load the agent through the [`AttachProvider`] and wait for it;
/// 2. require the handshake socket in the temp directory;
/// 3. let go of the attach process;
/// 4. read the token file and take the control endpoint from it.
///
/// Any step failing aborts the attempt with nothing retained.
#[derive(Clone)]
pub struct AttachExecutor {
    provider: Arc<dyn AttachProvider>,
    probe: Arc<dyn ProcessProbe>,
    layout: Layout,
    args: AgentArgs,
}

impl AttachExecutor {
    pub fn new(
        provider: Arc<dyn AttachProvider>,
        probe: Arc<dyn ProcessProbe>,
        layout: Layout,
        args: AgentArgs,
    ) -> Self {
        Self {
            provider,
            probe,
            layout,
            args,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub async fn attach(&self, pid: Pid) -> Result<Endpoint, Error> {
        if !self.probe.exists(pid) {
            return Err(Error::ProcessGone(pid));
        }
        info!(event_id = EventId::Attach.code(), pid, "attach to jvm start");

        self.provider.load_agent(pid, &self.args.render()).await?;

        if !self.provider.handshake_ready(pid) {
            let path = self.layout.socket_file(pid);
            warn!(event_id = EventId::Attach.code(), pid, ?path, "target jvm did not create its socket file");
            return Err(Error::HandshakeMissing { pid, path });
        }

        let token = read_token(&self.layout.token_file(pid))?;
        info!(
            event_id = EventId::Attach.code(),
            pid,
            endpoint = %token.endpoint,
            "attach to jvm success"
        );
        Ok(token.endpoint)
    }
}

/// Read and parse a handshake token file.
///
/// A malformed file is a data-integrity problem on the agent side and is
/// logged as such.
pub fn read_token(path: &Path) -> Result<HandshakeToken, Error> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(event_id = EventId::AttachReadToken.code(), ?path, "token file does not exist");
            return Err(Error::TokenMissing(path.to_owned()));
        }
        Err(err) => {
            error!(event_id = EventId::AttachReadToken.code(), ?path, %err, "failed to read token file");
            return Err(err.into());
        }
    };

    content.parse().inspect_err(|err| {
        error!(
            event_id = EventId::AttachReadToken.code(),
            ?path,
            %err,
            "[needs operator attention] token file content is malformed"
        );
    })
}
