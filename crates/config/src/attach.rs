use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Attach {
    /// Agent installation directory. Defaults to two levels above the
    /// supervisor executable (`<install>/bin/rasp-supervisor`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,

    /// Attach utility, relative to the install directory.
    pub utility: PathBuf,

    /// Agent payload, relative to the install directory.
    pub payload: PathBuf,

    /// The target JVM creates `<tmp>/.<socket_prefix>_pid<PID>` once its
    /// attach listener is up.
    pub socket_prefix: String,

    /// A process whose executable path ends with this suffix is a target.
    pub executable_suffix: String,

    /// The attach utility is killed when it runs longer than this.
    /// **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub timeout: Duration,
}

impl Default for Attach {
    fn default() -> Self {
        Self {
            install_dir: None,
            utility: PathBuf::from("bin/jattach"),
            payload: PathBuf::from("lib/jrasp-launcher.jar"),
            socket_prefix: "java".into(),
            executable_suffix: "bin/java".into(),
            timeout: Duration::from_secs(30),
        }
    }
}
