use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the module manifest pushed by the config collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Module {
    /// Module name, e.g. `rce-hook`.
    pub name: String,
    /// Where the distribution tooling fetches the module jar from. Carried
    /// in the snapshot only; the supervisor does not download modules.
    pub download_url: String,
    /// Expected digest of the module jar, checked by the distribution tooling.
    pub hash: String,
    /// Runtime parameters pushed to the agent on every parameter update.
    pub parameters: BTreeMap<String, String>,
}
