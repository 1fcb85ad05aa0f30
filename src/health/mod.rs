//! Per-model rate-limit circuit breaker.
//!
//! Tracks a blocked-until timestamp per model id. When the gateway
//! reports a rate limit, the orchestrator marks the model here and fails
//! over to the next configured model; the model becomes available again
//! once its cooldown window elapses.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Cooldown window applied after a rate-limit signal, in seconds.
pub const COOLDOWN_SECS: i64 = 300;

fn cooldown() -> Duration {
    Duration::seconds(COOLDOWN_SECS)
}

/// Availability tracker keyed by model id.
#[derive(Debug, Default)]
pub struct ModelHealth {
    blocked_until: HashMap<String, DateTime<Utc>>,
}

impl ModelHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a model may be used at `now`.
    pub fn is_available(&self, model: &str, now: DateTime<Utc>) -> bool {
        match self.blocked_until.get(model) {
            Some(until) => now >= *until,
            None => true,
        }
    }

    /// Record a rate-limit signal for a model at `now`.
    pub fn mark_rate_limited(&mut self, model: &str, now: DateTime<Utc>) {
        self.blocked_until.insert(model.to_string(), now + cooldown());
    }

    /// First available model from an ordered preference list, or `None`
    /// when every configured model is cooling down.
    pub fn first_available<'a>(
        &self,
        models: &'a [String],
        now: DateTime<Utc>,
    ) -> Option<&'a str> {
        models
            .iter()
            .map(String::as_str)
            .find(|m| self.is_available(m, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_is_available() {
        let health = ModelHealth::new();
        assert!(health.is_available("m1", Utc::now()));
    }

    #[test]
    fn rate_limited_model_blocked_for_cooldown() {
        let mut health = ModelHealth::new();
        let now = Utc::now();
        health.mark_rate_limited("m1", now);
        assert!(!health.is_available("m1", now));
        assert!(!health.is_available("m1", now + cooldown() - Duration::seconds(1)));
        assert!(health.is_available("m1", now + cooldown()));
    }

    #[test]
    fn failover_picks_next_available() {
        let mut health = ModelHealth::new();
        let now = Utc::now();
        let models = vec!["m1".to_string(), "m2".to_string()];
        assert_eq!(health.first_available(&models, now), Some("m1"));

        health.mark_rate_limited("m1", now);
        assert_eq!(health.first_available(&models, now), Some("m2"));

        health.mark_rate_limited("m2", now);
        assert_eq!(health.first_available(&models, now), None);
    }

    #[test]
    fn re_marking_extends_block() {
        let mut health = ModelHealth::new();
        let t0 = Utc::now();
        health.mark_rate_limited("m1", t0);
        let t1 = t0 + Duration::minutes(4);
        health.mark_rate_limited("m1", t1);
        assert!(!health.is_available("m1", t0 + cooldown()));
        assert!(health.is_available("m1", t1 + cooldown()));
    }
}
