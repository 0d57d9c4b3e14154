use crate::agent_mode::AgentMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Agent {
    /// Injection mode. See [`AgentMode`].
    pub mode: AgentMode,

    /// Hour of the local day (0 to 23) during which dynamic attach is allowed.
    /// When unset, attach may happen at any time.
    ///
    /// ## Note
    ///
    /// The gate is checked on every injection tick, so a JVM discovered
    /// outside the allowed hour is attached on the first tick inside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_hour: Option<u8>,

    /// Namespace handed to the agent and echoed back in the token file.
    pub namespace: String,

    /// Whether the agent's control endpoint requires a login.
    pub enable_auth: bool,

    /// Control endpoint credentials.
    pub username: String,
    pub password: String,

    /// A JVM whose command line contains any of these substrings is tracked
    /// but never attached.
    pub cmdline_blacklist: Vec<String>,

    /// Modules left active when an operator degrades the agents. Every other
    /// activated module is deactivated.
    pub degrade_keep: Vec<String>,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            mode: AgentMode::default(),
            attach_hour: None,
            namespace: "jrasp".into(),
            enable_auth: true,
            username: "admin".into(),
            password: "123456".into(),
            cmdline_blacklist: Vec::new(),
            degrade_keep: Vec::new(),
        }
    }
}
