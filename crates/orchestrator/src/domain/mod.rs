#![forbid(unsafe_code)]

mod endpoint;
mod module;
mod status;

pub use endpoint::{Endpoint, HandshakeToken};
pub use module::{Dependency, ModuleInfo, ModuleSet};
pub use status::InjectionStatus;

/// OS process id.
pub type Pid = i32;
