//! Command-line arguments.

use clap::Parser;

use crate::constants;

/// Autonomous repository evolution engine.
///
/// Discovers a work queue from the target repository, then on a fixed
/// interval sends one file at a time through the configured model
/// pipelines and commits accepted mutations back.
#[derive(Parser, Debug)]
#[command(name = constants::APP_NAME, version, about)]
pub struct Args {
    /// Target repository (`owner/name` or GitHub URL). Falls back to
    /// config / environment when omitted.
    pub repo: Option<String>,

    /// Model id to prefer, ahead of the configured failover list.
    #[arg(long, env = "SOVEREIGN_MODEL")]
    pub model: Option<String>,

    /// Seconds between processing cycles.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Resume the persisted cursor from a previous session against the
    /// same repository instead of starting from the top of the queue.
    #[arg(long)]
    pub resume: bool,

    /// Run exactly one processing cycle and exit.
    #[arg(long)]
    pub once: bool,
}

impl Args {
    /// Layer CLI flags over a loaded config (flags win).
    pub fn apply(&self, config: &mut crate::config::Config) {
        if let Some(ref repo) = self.repo {
            config.repo.identifier = Some(repo.clone());
        }
        if let Some(ref model) = self.model {
            config.models.preferred.retain(|m| m != model);
            config.models.preferred.insert(0, model.clone());
        }
        if let Some(interval) = self.interval {
            config.cycle.interval_secs = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args {
            repo: Some("cli/repo".into()),
            model: Some("cli-model".into()),
            interval: Some(7),
            resume: false,
            once: false,
        };
        let mut config = crate::config::Config::default();
        args.apply(&mut config);
        assert_eq!(config.repo.identifier.as_deref(), Some("cli/repo"));
        assert_eq!(config.models.preferred[0], "cli-model");
        assert_eq!(config.cycle.interval_secs, 7);
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let args = Args {
            repo: None,
            model: None,
            interval: None,
            resume: true,
            once: false,
        };
        let mut config = crate::config::Config::default();
        let before = config.cycle.interval_secs;
        args.apply(&mut config);
        assert!(config.repo.identifier.is_none());
        assert_eq!(config.cycle.interval_secs, before);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
