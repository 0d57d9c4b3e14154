#![forbid(unsafe_code)]
#![allow(dead_code)]

use async_trait::async_trait;
use config::{AgentMode, Config};
use orchestrator::attach::{AgentArgs, AttachExecutor, AttachProvider, Layout};
use orchestrator::clock::FixedClock;
use orchestrator::control::{AgentControl, Connector, LoginReply};
use orchestrator::domain::{Dependency, Endpoint, ModuleInfo, Pid};
use orchestrator::error::Error;
use orchestrator::probe::{ProcessDetails, ProcessProbe};
use orchestrator::process::{Credentials, ProcessContext, module_parameters};
use orchestrator::{Scheduler, Services};
use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const JAVA: &str = "/usr/lib/jvm/java-17/bin/java";

#[derive(Debug, Clone)]
struct FakeProcess {
    exe: PathBuf,
    details: ProcessDetails,
}

/// In-memory process table.
#[derive(Debug, Default)]
pub struct FakeProbe {
    processes: Mutex<BTreeMap<Pid, FakeProcess>>,
}

impl FakeProbe {
    pub fn spawn(&self, pid: Pid, exe: &str, cmdline: &[&str], start_time: u64) {
        let process = FakeProcess {
            exe: exe.into(),
            details: ProcessDetails {
                cmdline: cmdline.iter().map(|arg| arg.to_string()).collect(),
                start_time,
            },
        };
        self.processes.lock().unwrap().insert(pid, process);
    }

    pub fn spawn_java(&self, pid: Pid) {
        self.spawn(pid, JAVA, &["java", "-jar", "app.jar"], 100);
    }

    pub fn kill(&self, pid: Pid) {
        self.processes.lock().unwrap().remove(&pid);
    }
}

impl ProcessProbe for FakeProbe {
    fn list_pids(&self) -> Vec<Pid> {
        self.processes.lock().unwrap().keys().copied().collect()
    }

    fn executable(&self, pid: Pid) -> Option<PathBuf> {
        self.processes.lock().unwrap().get(&pid).map(|p| p.exe.clone())
    }

    fn details(&self, pid: Pid) -> Option<ProcessDetails> {
        self.processes.lock().unwrap().get(&pid).map(|p| p.details.clone())
    }

    fn exists(&self, pid: Pid) -> bool {
        self.processes.lock().unwrap().contains_key(&pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachBehavior {
    /// Socket and token file both appear.
    Succeed,
    /// The utility exits non-zero.
    ExitFailure,
    /// The utility succeeds but the target never creates its socket.
    NoSocket,
    /// Socket appears but the token file is garbage.
    BadToken,
    /// Succeeds after the given delay.
    Slow(Duration),
}

/// Plays the part of the attach utility and the agent's startup by writing
/// the handshake files into the layout.
pub struct FakeAttachProvider {
    layout: Layout,
    behavior: Mutex<AttachBehavior>,
    calls: Mutex<Vec<(Pid, String)>>,
}

impl FakeAttachProvider {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            behavior: Mutex::new(AttachBehavior::Succeed),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: AttachBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> Vec<(Pid, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachProvider for FakeAttachProvider {
    async fn load_agent(&self, pid: Pid, agent_args: &str) -> Result<(), Error> {
        self.calls.lock().unwrap().push((pid, agent_args.to_owned()));
        let behavior = *self.behavior.lock().unwrap();
        if let AttachBehavior::Slow(delay) = behavior {
            tokio::time::sleep(delay).await;
        }
        if behavior == AttachBehavior::ExitFailure {
            return Err(Error::AttachExit(ExitStatus::from_raw(1 << 8)));
        }

        std::fs::create_dir_all(self.layout.run_dir(pid))?;
        let token = match behavior {
            AttachBehavior::BadToken => "jrasp;admin".to_owned(),
            _ => format!("jrasp;admin;123456;127.0.0.1;{}\n", 9000 + pid),
        };
        std::fs::write(self.layout.token_file(pid), token)?;

        if behavior != AttachBehavior::NoSocket {
            std::fs::write(self.layout.socket_file(pid), b"")?;
        }
        Ok(())
    }

    fn handshake_ready(&self, pid: Pid) -> bool {
        self.layout.socket_file(pid).exists()
    }
}

/// Scripted agent shared by every connection the fake connector hands out.
#[derive(Debug)]
pub struct AgentScript {
    pub login_code: i64,
    pub login_transport_error: bool,
    pub shutdown_ok: bool,
    pub list_ok: bool,
    pub degrade_ok: bool,
    pub flush_ok: bool,
    pub modules: Vec<ModuleInfo>,
    pub dependencies: Vec<Dependency>,
}

impl Default for AgentScript {
    fn default() -> Self {
        Self {
            login_code: 200,
            login_transport_error: false,
            shutdown_ok: true,
            list_ok: true,
            degrade_ok: true,
            flush_ok: true,
            modules: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeAgent {
    pub script: Mutex<AgentScript>,
    /// `(endpoint, call, token)` in call order.
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub degraded: Mutex<Vec<Vec<String>>>,
    /// `(module, parameters)` per parameter push.
    pub parameters: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl FakeAgent {
    pub fn edit_script(&self, edit: impl FnOnce(&mut AgentScript)) {
        edit(&mut self.script.lock().unwrap());
    }

    pub fn calls_named(&self, name: &str) -> Vec<(String, String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, call, _)| call == name)
            .cloned()
            .collect()
    }

    fn record(&self, endpoint: &Endpoint, call: &str, token: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), call.to_owned(), token.to_owned()));
    }
}

fn rejected() -> Error {
    Error::Rejected {
        code: 500,
        message: "scripted failure".into(),
    }
}

struct FakeControl {
    endpoint: Endpoint,
    agent: Arc<FakeAgent>,
}

#[async_trait]
impl AgentControl for FakeControl {
    async fn login(&self, username: &str, password: &str) -> Result<LoginReply, Error> {
        self.agent.record(&self.endpoint, "login", "");
        let script = self.agent.script.lock().unwrap();
        if script.login_transport_error {
            return Err(Error::NoEndpoint(0));
        }
        let code = if username == "admin" && password == "123456" {
            script.login_code
        } else {
            401
        };
        Ok(LoginReply {
            token: format!("token-{}", self.endpoint.port),
            code,
            message: String::new(),
        })
    }

    async fn shutdown(&self, token: &str) -> Result<(), Error> {
        self.agent.record(&self.endpoint, "shutdown", token);
        if self.agent.script.lock().unwrap().shutdown_ok {
            Ok(())
        } else {
            Err(rejected())
        }
    }

    async fn soft_flush(&self, token: &str) -> Result<(), Error> {
        self.agent.record(&self.endpoint, "flush", token);
        if self.agent.script.lock().unwrap().flush_ok {
            Ok(())
        } else {
            Err(rejected())
        }
    }

    async fn update_parameters(
        &self,
        token: &str,
        module: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        self.agent.record(&self.endpoint, "parameters", token);
        self.agent
            .parameters
            .lock()
            .unwrap()
            .push((module.to_owned(), parameters.clone()));
        Ok(())
    }

    async fn list_modules(&self, token: &str) -> Result<Vec<ModuleInfo>, Error> {
        self.agent.record(&self.endpoint, "list", token);
        let script = self.agent.script.lock().unwrap();
        if script.list_ok {
            Ok(script.modules.clone())
        } else {
            Err(rejected())
        }
    }

    async fn degrade(&self, token: &str, module_ids: &[String]) -> Result<(), Error> {
        self.agent.record(&self.endpoint, "degrade", token);
        if !self.agent.script.lock().unwrap().degrade_ok {
            return Err(rejected());
        }
        self.agent.degraded.lock().unwrap().push(module_ids.to_vec());
        Ok(())
    }

    async fn dependencies(&self, token: &str) -> Result<Vec<Dependency>, Error> {
        self.agent.record(&self.endpoint, "dependencies", token);
        Ok(self.agent.script.lock().unwrap().dependencies.clone())
    }
}

pub struct FakeConnector {
    pub agent: Arc<FakeAgent>,
}

impl Connector for FakeConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn AgentControl>, Error> {
        Ok(Box::new(FakeControl {
            endpoint: endpoint.clone(),
            agent: Arc::clone(&self.agent),
        }))
    }
}

pub fn module(name: &str, activated: bool) -> ModuleInfo {
    ModuleInfo {
        name: name.into(),
        is_loaded: true,
        is_activated: activated,
        ..Default::default()
    }
}

/// A scratch install directory wired to fake process table, attach utility
/// and agents.
pub struct Harness {
    pub dir: TempDir,
    pub layout: Layout,
    pub probe: Arc<FakeProbe>,
    pub attacher: Arc<FakeAttachProvider>,
    pub agent: Arc<FakeAgent>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        std::fs::create_dir_all(&tmp).unwrap();
        let layout = Layout::new(dir.path().join("rasp"), &config::Attach::default()).with_temp_dir(tmp);
        Self {
            attacher: Arc::new(FakeAttachProvider::new(layout.clone())),
            layout,
            dir,
            probe: Arc::new(FakeProbe::default()),
            agent: Arc::new(FakeAgent::default()),
        }
    }

    pub fn config(mode: AgentMode) -> Config {
        let mut config = Config::default();
        config.agent.mode = mode;
        config
    }

    pub fn context(&self, config: &Config) -> ProcessContext {
        let attacher: Arc<dyn AttachProvider> = self.attacher.clone();
        let probe: Arc<dyn ProcessProbe> = self.probe.clone();
        ProcessContext {
            attach: AttachExecutor::new(
                attacher,
                probe,
                self.layout.clone(),
                AgentArgs::new(&self.layout, &config.agent),
            ),
            connector: Arc::new(FakeConnector {
                agent: Arc::clone(&self.agent),
            }),
            credentials: Credentials::new(&config.agent),
            degrade_keep: config.agent.degrade_keep.iter().cloned().collect(),
            parameters: module_parameters(&config.modules),
        }
    }

    pub fn scheduler_at(&self, config: &Config, hour: u32) -> Scheduler {
        let services = Services {
            probe: self.probe.clone(),
            attacher: self.attacher.clone(),
            connector: Arc::new(FakeConnector {
                agent: Arc::clone(&self.agent),
            }),
            clock: Arc::new(FixedClock(hour)),
        };
        Scheduler::new(config, self.layout.clone(), services)
    }

    pub fn scheduler(&self, config: &Config) -> Scheduler {
        self.scheduler_at(config, 12)
    }

    /// Leave the files a running agent from an earlier supervisor run
    /// would have left.
    pub fn leave_running_agent(&self, pid: Pid) {
        std::fs::create_dir_all(self.layout.run_dir(pid)).unwrap();
        std::fs::write(
            self.layout.token_file(pid),
            format!("jrasp;admin;123456;127.0.0.1;{}", 9000 + pid),
        )
        .unwrap();
    }
}
