use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};

const APP_NAME: &str = "cwt";

fn default_tool() -> String {
    "claude".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// User configuration from `~/.config/cwt/config.toml`. Every field has a
/// default; a missing file is not an error.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Command launched inside a worktree on resume
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Log level for the file logger (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            log_level: default_log_level(),
        }
    }
}

fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}

pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let path = match override_path {
        Some(path) => path.to_path_buf(),
        None => match config_file() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        if override_path.is_some() {
            anyhow::bail!("Config file not found at {}", path.display());
        }
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tool, "claude");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_load_missing_default_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert!(!config.tool.is_empty());
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "tool = \"vim\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.tool, "vim");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_load_missing_explicit_file_is_err() {
        assert!(load_config(Some(Path::new("/nonexistent/cwt.toml"))).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "unknown_key = 1\n").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }
}
