use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How the supervisor treats agents in discovered JVMs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentMode {
    /// Agents are loaded at JVM start by other means. The supervisor only
    /// tracks and reports; it never attaches or shuts anything down.
    #[default]
    #[serde(rename = "static")]
    Static,

    /// Attach the agent into every eligible JVM found by the scanner.
    #[serde(rename = "dynamic")]
    Dynamic,

    /// Shut down every agent the supervisor knows about.
    #[serde(rename = "disable")]
    Disable,
}

impl AgentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "disable" => Ok(Self::Disable),
            other => Err(Error::InvalidAgentMode(other.to_owned())),
        }
    }
}
