#![forbid(unsafe_code)]

mod managed;
mod policy;

pub use managed::ManagedProcess;
pub use policy::{Decision, DefaultInjectionPolicy, HoldReason, InjectionPolicy};

use crate::attach::AttachExecutor;
use crate::control::Connector;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Control endpoint login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(agent: &config::Agent) -> Self {
        Self {
            username: agent.username.clone(),
            password: agent.password.clone(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// What a [`ManagedProcess`] needs to act on its agent.
#[derive(Clone)]
pub struct ProcessContext {
    pub attach: AttachExecutor,
    pub connector: Arc<dyn Connector>,
    pub credentials: Credentials,
    /// Modules left active by a degrade.
    pub degrade_keep: BTreeSet<String>,
    /// Runtime parameters per module name, pushed on a parameter update.
    pub parameters: BTreeMap<String, BTreeMap<String, String>>,
}

/// Parameters of every manifest module that has any.
pub fn module_parameters(modules: &[config::Module]) -> BTreeMap<String, BTreeMap<String, String>> {
    modules
        .iter()
        .filter(|module| !module.parameters.is_empty())
        .map(|module| (module.name.clone(), module.parameters.clone()))
        .collect()
}
