#![forbid(unsafe_code)]

use super::ProcessContext;
use crate::attach::{Layout, read_token};
use crate::control::AgentControl;
use crate::domain::{Dependency, Endpoint, InjectionStatus, ModuleInfo, ModuleSet, Pid};
use crate::error::Error;
use crate::probe::ProcessDetails;
use crate::report::{EventId, ProcessSummary};
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// An authenticated connection to one agent.
struct Session {
    control: Box<dyn AgentControl>,
    token: String,
}

/// One tracked target process and the state of its agent.
///
/// `status` only changes through the methods below. Each of them returns the
/// resulting status and never propagates a per-process failure.
///
/// Every change is published to [`ManagedProcess::subscribe`] receivers, so
/// readers never wait on an attach or control call in progress.
pub struct ManagedProcess {
    pid: Pid,
    cmdline: Vec<String>,
    start_time: u64,
    endpoint: Option<Endpoint>,
    status: InjectionStatus,
    modules: Vec<ModuleInfo>,
    pending_parameter_update: bool,
    pending_degrade: bool,
    blacklisted: bool,
    session: Option<Session>,
    snapshot: watch::Sender<ProcessSummary>,
}

impl ManagedProcess {
    /// Build the record for a freshly seen process and work out whether an
    /// agent is already running in it from a previous supervisor run.
    pub fn discover(pid: Pid, details: ProcessDetails, layout: &Layout, blacklist: &[String]) -> Self {
        let joined = details.cmdline.join(" ");
        let blacklisted = blacklist.iter().any(|entry| joined.contains(entry.as_str()));

        let (status, endpoint) = if layout.run_dir(pid).is_dir() {
            match read_token(&layout.token_file(pid)) {
                Ok(token) => (InjectionStatus::SuccessInjected, Some(token.endpoint)),
                Err(_) => (InjectionStatus::FailedExited, None),
            }
        } else {
            (InjectionStatus::NotInjected, None)
        };

        info!(
            event_id = EventId::ProcessStartup.code(),
            pid,
            start_time = details.start_time,
            %status,
            blacklisted,
            cmdline = %joined,
            "java process discovered"
        );

        let (snapshot, _) = watch::channel(ProcessSummary {
            pid,
            start_time: details.start_time,
            cmdline: details.cmdline.clone(),
            status,
            endpoint: endpoint.clone(),
            blacklisted,
            modules: Vec::new(),
        });

        Self {
            pid,
            cmdline: details.cmdline,
            start_time: details.start_time,
            endpoint,
            status,
            modules: Vec::new(),
            pending_parameter_update: false,
            pending_degrade: false,
            blacklisted,
            session: None,
            snapshot,
        }
    }

    /// Receiver of the latest [`ProcessSummary`].
    pub fn subscribe(&self) -> watch::Receiver<ProcessSummary> {
        self.snapshot.subscribe()
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn cmdline(&self) -> &[String] {
        &self.cmdline
    }

    pub fn status(&self) -> InjectionStatus {
        self.status
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    pub fn needs_attach(&self) -> bool {
        self.status == InjectionStatus::NotInjected
    }

    pub fn is_injected(&self) -> bool {
        self.status.is_injected()
    }

    pub fn pending_parameter_update(&self) -> bool {
        self.pending_parameter_update
    }

    pub fn pending_degrade(&self) -> bool {
        self.pending_degrade
    }

    /// New module artifacts are available. Only processes with an agent
    /// care.
    pub fn mark_parameters_changed(&mut self) -> bool {
        self.pending_parameter_update = self.status.is_injected() || self.status.is_serving();
        self.pending_parameter_update
    }

    /// Queue a degrade. Only a healthy agent can be degraded.
    pub fn request_degrade(&mut self) -> bool {
        self.pending_degrade = self.status == InjectionStatus::SuccessInjected;
        self.pending_degrade
    }

    /// Attach the agent and log in to its control endpoint.
    pub async fn inject(&mut self, ctx: &ProcessContext) -> InjectionStatus {
        if !self.needs_attach() {
            return self.status;
        }

        self.status = match ctx.attach.attach(self.pid).await {
            Ok(endpoint) => {
                self.endpoint = Some(endpoint);
                match self.login(ctx).await {
                    Ok(true) => InjectionStatus::SuccessInjected,
                    Ok(false) => InjectionStatus::FailedInjected,
                    Err(err) => {
                        warn!(event_id = EventId::HttpToken.code(), pid = self.pid, %err, "agent login failed");
                        InjectionStatus::FailedInjected
                    }
                }
            }
            Err(err) => {
                warn!(event_id = EventId::Attach.code(), pid = self.pid, %err, "attach failed");
                InjectionStatus::FailedInjected
            }
        };

        info!(
            event_id = EventId::AgentInit.code(),
            pid = self.pid,
            status = %self.status,
            endpoint = ?self.endpoint,
            "agent init"
        );
        self.publish();
        self.status
    }

    /// Fully disable the agent.
    pub async fn shutdown(&mut self, ctx: &ProcessContext) -> InjectionStatus {
        if !self.status.is_injected() {
            return self.status;
        }

        let result = match self.session(ctx).await {
            Ok(session) => session.control.shutdown(&session.token).await,
            Err(err) => Err(err),
        };

        self.status = match result {
            Ok(()) => {
                self.session = None;
                self.pending_degrade = false;
                self.pending_parameter_update = false;
                InjectionStatus::SuccessExited
            }
            Err(err) => {
                warn!(event_id = EventId::AgentExit.code(), pid = self.pid, %err, "agent shutdown failed");
                InjectionStatus::FailedExited
            }
        };

        info!(event_id = EventId::AgentExit.code(), pid = self.pid, status = %self.status, "agent exit");
        self.publish();
        self.status
    }

    /// Deactivate every active module except the ones in `ctx.degrade_keep`.
    pub async fn degrade(&mut self, ctx: &ProcessContext) -> InjectionStatus {
        self.pending_degrade = false;
        if self.status != InjectionStatus::SuccessInjected {
            return self.status;
        }

        self.status = match self.deactivate_modules(ctx).await {
            Ok(count) => {
                info!(pid = self.pid, modules = count, "agent degraded");
                InjectionStatus::SuccessDegraded
            }
            Err(err) => {
                warn!(pid = self.pid, %err, "agent degrade failed");
                InjectionStatus::FailedDegraded
            }
        };
        self.publish();
        self.status
    }

    /// Push each module's parameters, then soft flush so the agent picks
    /// them up. Best effort: the flag is cleared whatever the outcome.
    pub async fn apply_parameter_update(&mut self, ctx: &ProcessContext) {
        if !std::mem::take(&mut self.pending_parameter_update) {
            return;
        }
        if !(self.status.is_injected() || self.status.is_serving()) {
            return;
        }

        let pid = self.pid;
        match self.push_parameters(ctx).await {
            Ok(()) => info!(pid, modules = ctx.parameters.len(), "agent modules flushed"),
            Err(err) => warn!(pid, %err, "agent parameter update failed"),
        }
    }

    /// Reload the module list from the agent.
    pub async fn refresh_modules(&mut self, ctx: &ProcessContext) -> Result<&[ModuleInfo], Error> {
        if self.status.is_serving() {
            let session = self.session(ctx).await?;
            let modules = session.control.list_modules(&session.token).await?;
            self.modules = modules;
            self.publish();
        }
        Ok(&self.modules)
    }

    /// Classpath dependencies of a serving agent; empty otherwise.
    pub async fn dependencies(&mut self, ctx: &ProcessContext) -> Result<Vec<Dependency>, Error> {
        if !self.status.is_serving() {
            return Ok(Vec::new());
        }
        let session = self.session(ctx).await?;
        session.control.dependencies(&session.token).await
    }

    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            pid: self.pid,
            start_time: self.start_time,
            cmdline: self.cmdline.clone(),
            status: self.status,
            endpoint: self.endpoint.clone(),
            blacklisted: self.blacklisted,
            modules: self.modules.clone(),
        }
    }

    async fn push_parameters(&mut self, ctx: &ProcessContext) -> Result<(), Error> {
        let session = self.session(ctx).await?;
        for (module, parameters) in &ctx.parameters {
            session
                .control
                .update_parameters(&session.token, module, parameters)
                .await?;
        }
        session.control.soft_flush(&session.token).await
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.summary());
    }

    async fn deactivate_modules(&mut self, ctx: &ProcessContext) -> Result<usize, Error> {
        let pid = self.pid;
        let session = self.session(ctx).await?;
        let modules = session.control.list_modules(&session.token).await?;
        let targets = ModuleSet::activated(&modules).without(&ctx.degrade_keep);
        debug!(pid, ?targets, "degrading modules");
        session.control.degrade(&session.token, &targets.to_vec()).await?;
        self.modules = modules;
        Ok(targets.len())
    }

    /// Connect and log in. The token is kept even when login is refused.
    async fn login(&mut self, ctx: &ProcessContext) -> Result<bool, Error> {
        let endpoint = self.endpoint.as_ref().ok_or(Error::NoEndpoint(self.pid))?;
        let control = ctx.connector.connect(endpoint)?;
        let reply = control
            .login(&ctx.credentials.username, &ctx.credentials.password)
            .await?;

        if reply.is_ok() {
            debug!(event_id = EventId::HttpToken.code(), pid = self.pid, "agent login ok");
        } else {
            warn!(
                event_id = EventId::HttpToken.code(),
                pid = self.pid,
                code = reply.code,
                message = %reply.message,
                "agent login refused"
            );
        }

        let ok = reply.is_ok();
        self.session = Some(Session {
            control,
            token: reply.token,
        });
        Ok(ok)
    }

    /// The current session, logging in first if there is none yet.
    async fn session(&mut self, ctx: &ProcessContext) -> Result<&Session, Error> {
        if self.session.is_none() {
            self.login(ctx).await?;
        }
        self.session.as_ref().ok_or(Error::NoEndpoint(self.pid))
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("pid", &self.pid)
            .field("start_time", &self.start_time)
            .field("cmdline", &self.cmdline)
            .field("endpoint", &self.endpoint)
            .field("status", &self.status)
            .field("modules", &self.modules.len())
            .field("pending_parameter_update", &self.pending_parameter_update)
            .field("pending_degrade", &self.pending_degrade)
            .field("blacklisted", &self.blacklisted)
            .field("connected", &self.session.is_some())
            .finish()
    }
}
