//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.sovereign.toml` in the working directory
//! 4. `~/.config/sovereign/config.toml` (global defaults)
//! 5. Built-in defaults
//!
//! Credentials come from the environment only and are never written to
//! disk or logged in plaintext.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants;
use crate::env::Env;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repo: RepoConfig,
    pub models: ModelsConfig,
    pub cycle: CycleConfig,
}

/// Target repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Repository identifier (`owner/name` or URL form).
    pub identifier: Option<String>,
    /// Branch override; the host's default branch when unset.
    pub branch: Option<String>,
}

/// Ordered model preference list for failover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub preferred: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            preferred: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
        }
    }
}

/// Processing-cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Seconds between timer ticks.
    pub interval_secs: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Opaque access credentials, read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub repo_token: Option<String>,
    pub model_key: Option<String>,
}

impl Credentials {
    /// Read credentials from the environment.
    pub fn from_env(env: &Env) -> Self {
        Self {
            repo_token: env.var_non_empty(constants::ENV_REPO_TOKEN),
            model_key: env.var_non_empty(constants::ENV_MODEL_KEY),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.repo_token.is_some() && self.model_key.is_some()
    }

    /// Drop both secrets from memory on session reset.
    pub fn clear(&mut self) {
        self.repo_token = None;
        self.model_key = None;
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("repo_token", &self.repo_token.as_ref().map(|_| "[REDACTED]"))
            .field("model_key", &self.model_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads global config, then working-directory config, then applies
    /// environment variable overrides. CLI flags are layered on top by
    /// the caller.
    pub fn load(cwd: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config = Self::merge(config, Self::read_file(&global_path)?);
            }
        }

        if let Some(cwd) = cwd {
            let local_path = cwd.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                config = Self::merge(config, Self::read_file(&local_path)?);
            }
        }

        config.apply_env(env);
        Ok(config)
    }

    /// Path of the global config file, if a config dir exists.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    fn read_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `layer` on `base`; set fields in `layer` win.
    fn merge(base: Config, layer: Config) -> Config {
        let defaults = Config::default();
        Config {
            repo: RepoConfig {
                identifier: layer.repo.identifier.or(base.repo.identifier),
                branch: layer.repo.branch.or(base.repo.branch),
            },
            models: if layer.models.preferred == defaults.models.preferred {
                base.models
            } else {
                layer.models
            },
            cycle: if layer.cycle.interval_secs == defaults.cycle.interval_secs {
                base.cycle
            } else {
                layer.cycle
            },
        }
    }

    fn apply_env(&mut self, env: &Env) {
        if let Some(repo) = env.var_non_empty(constants::ENV_REPO) {
            self.repo.identifier = Some(repo);
        }
        if let Some(model) = env.var_non_empty(constants::ENV_MODEL) {
            // The env-selected model becomes the primary; configured
            // models stay in the list as failover targets.
            self.models.preferred.retain(|m| *m != model);
            self.models.preferred.insert(0, model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.repo.identifier.is_none());
        assert!(!config.models.preferred.is_empty());
        assert_eq!(config.cycle.interval_secs, 30);
    }

    #[test]
    fn local_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(constants::CONFIG_FILENAME),
            r#"
[repo]
identifier = "owner/repo"

[cycle]
interval_secs = 5
"#,
        )
        .unwrap();

        let env = Env::mock(Vec::<(&str, &str)>::new());
        let config = Config::load(Some(dir.path()), &env).unwrap();
        assert_eq!(config.repo.identifier.as_deref(), Some("owner/repo"));
        assert_eq!(config.cycle.interval_secs, 5);
        // Untouched section keeps defaults.
        assert_eq!(config.models.preferred[0], "gemini-2.0-flash");
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(constants::CONFIG_FILENAME),
            "[repo]\nidentifier = \"from/file\"\n",
        )
        .unwrap();

        let env = Env::mock([(constants::ENV_REPO, "from/env")]);
        let config = Config::load(Some(dir.path()), &env).unwrap();
        assert_eq!(config.repo.identifier.as_deref(), Some("from/env"));
    }

    #[test]
    fn env_model_becomes_primary_without_duplicates() {
        let env = Env::mock([(constants::ENV_MODEL, "gemini-1.5-flash")]);
        let mut config = Config::default();
        config.apply_env(&env);
        assert_eq!(config.models.preferred[0], "gemini-1.5-flash");
        assert_eq!(
            config
                .models
                .preferred
                .iter()
                .filter(|m| *m == "gemini-1.5-flash")
                .count(),
            1
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(constants::CONFIG_FILENAME), "not [ toml").unwrap();
        let env = Env::mock(Vec::<(&str, &str)>::new());
        let result = Config::load(Some(dir.path()), &env);
        assert!(matches!(result, Err(ConfigError::ParseFile { .. })));
    }

    #[test]
    fn credentials_from_env_and_redacted_debug() {
        let env = Env::mock([
            (constants::ENV_REPO_TOKEN, "ghp_secret"),
            (constants::ENV_MODEL_KEY, "ai_secret"),
        ]);
        let creds = Credentials::from_env(&env);
        assert!(creds.is_complete());

        let debug = format!("{creds:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(!debug.contains("ai_secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn credentials_clear_drops_secrets() {
        let env = Env::mock([
            (constants::ENV_REPO_TOKEN, "t"),
            (constants::ENV_MODEL_KEY, "k"),
        ]);
        let mut creds = Credentials::from_env(&env);
        creds.clear();
        assert!(!creds.is_complete());
        assert!(creds.repo_token.is_none());
    }

    #[test]
    fn incomplete_credentials_detected() {
        let env = Env::mock([(constants::ENV_REPO_TOKEN, "t")]);
        let creds = Credentials::from_env(&env);
        assert!(!creds.is_complete());
    }
}
