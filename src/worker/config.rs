//! Engine configuration.
//!
//! - **Concurrency**: how many pull requests are evaluated at once across all
//!   repositories. 8 by default (configurable via `AUTO_MERGE_CONCURRENCY`).
//! - **Reschedule delay**: how long a pull request with pending conditions
//!   waits before it is evaluated again. 60 seconds by default (configurable
//!   via `AUTO_MERGE_RESCHEDULE_SECS`). A fresher trigger skips the wait.

use std::time::Duration;

/// Default number of concurrently evaluated pull requests.
const DEFAULT_CONCURRENCY: usize = 8;

/// Default backoff before re-evaluating a pending pull request (1 minute).
const DEFAULT_RESCHEDULE_SECS: u64 = 60;

/// Configuration for the scheduling engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on concurrently running evaluations.
    pub concurrency: usize,

    /// Delay before a rescheduled pull request is evaluated again.
    pub reschedule_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig {
            concurrency: DEFAULT_CONCURRENCY,
            reschedule_delay: Duration::from_secs(DEFAULT_RESCHEDULE_SECS),
        }
    }

    /// Reads `AUTO_MERGE_CONCURRENCY` and `AUTO_MERGE_RESCHEDULE_SECS`.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let concurrency = lookup("AUTO_MERGE_CONCURRENCY")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CONCURRENCY);
        let reschedule_secs = lookup("AUTO_MERGE_RESCHEDULE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RESCHEDULE_SECS);

        EngineConfig {
            concurrency,
            reschedule_delay: Duration::from_secs(reschedule_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.reschedule_delay, Duration::from_secs(60));
        assert_eq!(EngineConfig::from_lookup(lookup(&[])), config);
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("AUTO_MERGE_CONCURRENCY", "2"),
            ("AUTO_MERGE_RESCHEDULE_SECS", "5"),
        ]));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.reschedule_delay, Duration::from_secs(5));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("AUTO_MERGE_CONCURRENCY", "0"),
            ("AUTO_MERGE_RESCHEDULE_SECS", "soon"),
        ]));
        assert_eq!(config, EngineConfig::new());
    }
}
