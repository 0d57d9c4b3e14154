use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use config::AgentMode;
use std::path::{Path, PathBuf};

/// rasp-supervisor: keeps a RASP agent in every JVM on the host
///
/// rasp-supervisor discovers running Java processes, attaches the RASP agent
/// to them according to the configured mode, and keeps reporting on the
/// agents it manages.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/rasp-supervisor/config.toml` and
    /// `/etc/rasp-supervisor/config.d/*.toml`, where the latter being a glob
    /// pattern. If they don't exist, the default configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    /// Installation directory holding `bin/`, `lib/` and `run/`.
    ///
    /// Overrides `attach.install_dir`. Defaults to two levels above the
    /// supervisor executable.
    #[arg(short, long, value_parser = validate_dir)]
    pub install_dir: Option<PathBuf>,

    /// Override the agent mode from the configuration.
    #[arg(short, long)]
    pub mode: Option<AgentMode>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.is_file() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

#[inline(always)]
fn validate_dir(dir: &str) -> Result<PathBuf, String> {
    let path = Path::new(dir);
    if path.is_dir() {
        Ok(path.to_owned())
    } else {
        Err(format!("Directory not found: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::ffi::OsString;
    use tempfile::tempdir;

    #[test]
    fn parses_overrides() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "").unwrap();

        let args: Vec<OsString> = vec![
            "rasp-supervisor".into(),
            "--config".into(),
            config.clone().into(),
            "--install-dir".into(),
            dir.path().into(),
            "--mode".into(),
            "Dynamic".into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config.as_deref(), Some(config.as_path()));
        assert_eq!(cli.install_dir.as_deref(), Some(dir.path()));
        assert_eq!(cli.mode, Some(AgentMode::Dynamic));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["rasp-supervisor", "--mode", "sometimes"]).is_err());
    }

    proptest! {
        #[test]
        fn missing_paths_are_rejected(name in "[a-z]{8,16}") {
            let path = format!("/nonexistent-{name}/config.toml");
            prop_assert!(validate_file(&path).is_err());
            prop_assert!(validate_dir(&path).is_err());
        }
    }
}
