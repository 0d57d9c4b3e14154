#![forbid(unsafe_code)]

//! Remote control of injected agents.

mod client;
mod envelope;

pub use client::{AUTH_HEADER, ControlClient, HttpConnector};
pub use envelope::Envelope;

use crate::domain::{Dependency, Endpoint, ModuleInfo};
use crate::error::Error;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Outcome of a login call. The token is returned even when `code` is not 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub token: String,
    pub code: i64,
    pub message: String,
}

impl LoginReply {
    pub fn is_ok(&self) -> bool {
        self.code == Envelope::OK
    }
}

/// Operations on one agent's control endpoint. Every call except `login`
/// is authenticated with the token login returned.
#[async_trait]
pub trait AgentControl: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginReply, Error>;
    /// Fully disable the agent.
    async fn shutdown(&self, token: &str) -> Result<(), Error>;
    /// Ask the agent to reload its modules without forcing.
    async fn soft_flush(&self, token: &str) -> Result<(), Error>;
    /// Replace the runtime parameters of one module.
    async fn update_parameters(
        &self,
        token: &str,
        module: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), Error>;
    async fn list_modules(&self, token: &str) -> Result<Vec<ModuleInfo>, Error>;
    /// Deactivate the named modules. Succeeds without a request when
    /// `module_ids` is empty.
    async fn degrade(&self, token: &str, module_ids: &[String]) -> Result<(), Error>;
    async fn dependencies(&self, token: &str) -> Result<Vec<Dependency>, Error>;
}

/// Builds an [`AgentControl`] bound to an endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn AgentControl>, Error>;
}
