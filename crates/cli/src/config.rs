//! `warden.toml` configuration.
//!
//! Every field has a default, so an absent file or an empty one is valid.
//! Secrets never live here; they come from flags or the environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use github::GitHubConfig;
use llm::OpenAiConfig;
use middleware::ExecutorConfig;
use serde::Deserialize;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// GitHub API endpoints.
    pub github: GitHubConfig,
    /// Model provider settings.
    pub llm: OpenAiConfig,
    /// Checkpoint storage.
    pub checkpoint: CheckpointConfig,
    /// Model-loop limits.
    pub run: ExecutorConfig,
}

/// Where run checkpoints are stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory holding one JSON file per run.
    pub directory: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".warden/runs"),
        }
    }
}

impl WardenConfig {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, `warden.toml` in the
    /// working directory is used when present, and the defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parses TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = WardenConfig::parse("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.github.api_base_url, "https://api.github.com");
        assert_eq!(config.run.max_turns, 25);
    }

    #[test]
    fn sections_override_individual_fields() {
        let config = WardenConfig::parse(
            r#"
            [llm]
            model = "gpt-4.1"
            max_retries = 5

            [checkpoint]
            directory = "/var/lib/warden"

            [run]
            max_turns = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.max_retries, 5);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.checkpoint.directory, PathBuf::from("/var/lib/warden"));
        assert_eq!(config.run.max_turns, 8);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(WardenConfig::parse("[gitlab]\nurl = \"x\"").is_err());
    }

    #[test]
    fn explicit_path_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[github]\nuser_agent = \"warden-test\"").unwrap();
        let config = WardenConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.github.user_agent, "warden-test");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(WardenConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
