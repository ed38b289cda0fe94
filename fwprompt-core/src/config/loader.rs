//! Configuration file loading

use super::schema::Config;
use crate::error::{PromptError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only source of prompt configuration.
///
/// Sessions call `load` once per prompt; a paused countdown calls it again
/// on every refill.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<Config>;
}

impl ConfigSource for Config {
    fn load(&self) -> Result<Config> {
        Ok(self.clone())
    }
}

/// Configuration backed by a TOML file, re-read on every load
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the explicit path if given, otherwise the default location
    pub fn from_path_or_default(path: Option<PathBuf>) -> Self {
        Self::new(path.unwrap_or_else(ConfigLoader::default_config_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfig {
    fn load(&self) -> Result<Config> {
        ConfigLoader::load_from(&self.path)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        // Priority order:
        // 1. $FWPROMPT_CONFIG
        // 2. $XDG_CONFIG_HOME/fwprompt/config.toml
        // 3. ~/.config/fwprompt/config.toml

        if let Ok(path) = env::var("FWPROMPT_CONFIG") {
            return PathBuf::from(path);
        }

        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("fwprompt/config.toml");
        }

        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(".config/fwprompt/config.toml");
        }

        PathBuf::from("config.toml")
    }

    /// Load config from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| PromptError::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config from a file, falling back to defaults if it does not exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();

        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, DurationOption};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.common.verbose);
        assert_eq!(config.prompt.default_timeout, 15);
        assert_eq!(config.prompt.action(), Ok(Action::Deny));
        assert_eq!(config.prompt.duration(), DurationOption::UntilRestart);
        assert_eq!(config.prompt.default_target, 0);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[common]
verbose = true

[prompt]
default_timeout = 30
default_action = "allow"
default_duration = "forever"
default_target = 3
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.common.verbose);
        assert_eq!(config.prompt.timeout_secs(), Ok(30));
        assert_eq!(config.prompt.action(), Ok(Action::Allow));
        assert_eq!(config.prompt.duration(), DurationOption::Always);
        assert_eq!(config.prompt.default_target, 3);
    }

    #[test]
    fn test_non_numeric_timeout_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[prompt]\ndefault_timeout = \"soon\"").unwrap();

        let result = FileConfig::new(file.path()).load();
        assert!(matches!(result, Err(PromptError::ConfigParse(_))));
    }

    #[test]
    fn test_file_config_rereads() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[prompt]\ndefault_timeout = 5").unwrap();

        let source = FileConfig::new(file.path());
        assert_eq!(source.load().unwrap().prompt.default_timeout, 5);

        std::fs::write(file.path(), "[prompt]\ndefault_timeout = 9\n").unwrap();
        assert_eq!(source.load().unwrap().prompt.default_timeout, 9);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.prompt.default_timeout, 15);
    }

    #[test]
    fn test_unknown_duration_falls_back() {
        let config: Config = toml::from_str("[prompt]\ndefault_duration = \"a while\"").unwrap();
        assert_eq!(config.prompt.duration(), DurationOption::UntilRestart);
    }
}
