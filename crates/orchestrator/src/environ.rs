#![forbid(unsafe_code)]

//! Facts about the host and the supervisor installation.

use crate::error::Error;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct Environ {
    pub install_dir: PathBuf,
    pub hostname: String,
    pub version: &'static str,
    /// SHA-256 of the running supervisor executable.
    pub exe_hash: String,
}

impl Environ {
    /// Collect facts about the running supervisor.
    ///
    /// Without an override, the install directory is two levels above the
    /// executable (`<install>/bin/<exe>`).
    pub fn discover(install_dir: Option<&Path>) -> Result<Self, Error> {
        let exe = std::env::current_exe()?;
        let install_dir = match install_dir {
            Some(dir) => dir.to_owned(),
            None => exe
                .parent()
                .and_then(Path::parent)
                .map(Path::to_owned)
                .unwrap_or_else(|| PathBuf::from("/")),
        };

        Ok(Self {
            install_dir,
            hostname: hostname(),
            version: VERSION,
            exe_hash: file_hash(&exe)?,
        })
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.to_lowercase())
        .unwrap_or_else(|| "unknown".into())
}

pub fn file_hash(path: &Path) -> Result<String, Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
