//! Configuration loading.

mod loader;

pub use loader::{Config, ConfigError, Credentials, CycleConfig, ModelsConfig, RepoConfig};
