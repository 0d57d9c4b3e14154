#![forbid(unsafe_code)]

use serde::Serialize;
use std::fmt;

/// Injection lifecycle of one tracked process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InjectionStatus {
    #[default]
    #[serde(rename = "not inject")]
    NotInjected,
    #[serde(rename = "success inject")]
    SuccessInjected,
    #[serde(rename = "failed inject")]
    FailedInjected,
    #[serde(rename = "success exit inject")]
    SuccessExited,
    #[serde(rename = "failed exit")]
    FailedExited,
    #[serde(rename = "success degrade")]
    SuccessDegraded,
    #[serde(rename = "failed degrade")]
    FailedDegraded,
}

impl InjectionStatus {
    pub const ALL: [Self; 7] = [
        Self::NotInjected,
        Self::SuccessInjected,
        Self::FailedInjected,
        Self::SuccessExited,
        Self::FailedExited,
        Self::SuccessDegraded,
        Self::FailedDegraded,
    ];

    /// An attach attempt has been made, successful or not.
    pub fn is_injected(self) -> bool {
        matches!(self, Self::SuccessInjected | Self::FailedInjected)
    }

    /// The agent is up and answering control requests.
    pub fn is_serving(self) -> bool {
        matches!(self, Self::SuccessInjected | Self::SuccessDegraded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInjected => "not inject",
            Self::SuccessInjected => "success inject",
            Self::FailedInjected => "failed inject",
            Self::SuccessExited => "success exit inject",
            Self::FailedExited => "failed exit",
            Self::SuccessDegraded => "success degrade",
            Self::FailedDegraded => "failed degrade",
        }
    }
}

impl fmt::Display for InjectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
