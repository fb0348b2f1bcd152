//! rc configuration.
//!
//! Values come from built-in defaults, optionally overridden by a TOML file
//! (`/etc/buckos/rc.toml`) and then by command line flags.

use crate::error::{Error, Result};
use crate::process::DEFAULT_SHELL;
use crate::runlevel::{Runlevel, HALT, REBOOT};
use crate::shutdown::ShutdownConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default services directory.
pub const DEFAULT_SERVICES_DIR: &str = "/etc/inits.d";

/// Default log file.
pub const DEFAULT_LOG_FILE: &str = "/var/log/inits.log";

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/buckos/rc.toml";

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcConfig {
    /// Directory scanned for service scripts
    pub services_dir: PathBuf,
    /// Log file; stderr is used when it can't be opened
    pub log_file: PathBuf,
    /// Interpreter used to run scripts
    pub shell: PathBuf,
    /// Runlevels that end with a shutdown broadcast
    pub terminal_runlevels: Vec<Runlevel>,
    /// Shutdown grace windows
    pub shutdown: ShutdownConfig,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            services_dir: PathBuf::from(DEFAULT_SERVICES_DIR),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            shell: PathBuf::from(DEFAULT_SHELL),
            terminal_runlevels: vec![HALT, REBOOT],
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl RcConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load `path` if given, otherwise the default file if it exists.
    ///
    /// A file named explicitly must exist; a missing default file just
    /// means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!(path = %default.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Whether finishing `runlevel` triggers a shutdown broadcast.
    pub fn is_terminal(&self, runlevel: Runlevel) -> bool {
        self.terminal_runlevels.contains(&runlevel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn level(n: u8) -> Runlevel {
        Runlevel::new(n).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = RcConfig::default();
        assert_eq!(config.services_dir, PathBuf::from("/etc/inits.d"));
        assert_eq!(config.log_file, PathBuf::from("/var/log/inits.log"));
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert!(config.is_terminal(level(0)));
        assert!(config.is_terminal(level(6)));
        assert!(!config.is_terminal(level(3)));
        assert_eq!(config.shutdown.term_grace_secs, 10);
        assert_eq!(config.shutdown.kill_grace_secs, 15);
    }

    #[test]
    fn test_partial_toml() {
        let config = RcConfig::from_toml(
            r#"
services_dir = "/srv/rc.d"

[shutdown]
kill_grace_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(config.services_dir, PathBuf::from("/srv/rc.d"));
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert_eq!(config.shutdown.term_grace_secs, 10);
        assert_eq!(config.shutdown.kill_grace_secs, 5);
    }

    #[test]
    fn test_terminal_runlevels_toml() {
        let config = RcConfig::from_toml("terminal_runlevels = [1]").unwrap();
        assert!(config.is_terminal(level(1)));
        assert!(!config.is_terminal(level(0)));
    }

    #[test]
    fn test_out_of_range_runlevel_rejected() {
        assert!(RcConfig::from_toml("terminal_runlevels = [12]").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "shell = \"/bin/dash\"").unwrap();

        let config = RcConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.shell, PathBuf::from("/bin/dash"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = RcConfig::load(Some(Path::new("/nonexistent/rc.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
