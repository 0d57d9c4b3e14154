#![forbid(unsafe_code)]

pub mod attach;
pub mod clock;
pub mod control;
pub mod domain;
pub mod environ;
pub mod error;
pub mod probe;
pub mod process;
pub mod registry;
pub mod report;
pub mod scheduler;

pub use attach::{AgentArgs, AttachExecutor, AttachProvider, JattachProvider, Layout};
pub use clock::{Clock, FixedClock, SystemClock};
pub use control::{AgentControl, Connector, ControlClient, HttpConnector, LoginReply};
pub use domain::{Dependency, Endpoint, HandshakeToken, InjectionStatus, ModuleInfo, ModuleSet, Pid};
pub use environ::Environ;
pub use error::Error;
pub use probe::{ProcessDetails, ProcessProbe, ProcfsProbe, TargetFilter};
pub use process::{
    Credentials, Decision, DefaultInjectionPolicy, HoldReason, InjectionPolicy, ManagedProcess,
    ProcessContext,
};
pub use registry::{ProcessHandle, Registry, StoreOutcome};
pub use report::{EventId, HeartBeat, ProcessSummary};
pub use scheduler::{ControlEvent, Scheduler, Services, WORK_QUEUE_CAPACITY};
