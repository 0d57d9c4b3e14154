use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Control {
    /// Upper bound on a whole control request. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub request_timeout: Duration,

    /// Upper bound on establishing the TCP connection. **Measured in
    /// seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub connect_timeout: Duration,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
        }
    }
}
