//! Label conditions.

use crate::config::RepoConfig;
use crate::types::PullRequestSnapshot;

use super::ConditionResult;

/// Fails listing every required pattern that no label satisfies.
pub fn required_labels(config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    let missing: Vec<String> = config
        .required_labels
        .iter()
        .filter(|pattern| !snapshot.labels.iter().any(|label| pattern.matches(label)))
        .map(|pattern| pattern.to_string())
        .collect();

    if missing.is_empty() {
        ConditionResult::Success
    } else {
        ConditionResult::fail(format!("Required labels are missing: {}", missing.join(", ")))
    }
}

/// Fails listing every present label that matches a blocking pattern.
pub fn blocking_labels(config: &RepoConfig, snapshot: &PullRequestSnapshot) -> ConditionResult {
    let present: Vec<&str> = snapshot
        .labels
        .iter()
        .filter(|label| config.blocking_labels.iter().any(|p| p.matches(label)))
        .map(String::as_str)
        .collect();

    if present.is_empty() {
        ConditionResult::Success
    } else {
        ConditionResult::fail(format!("Blocking labels are present: {}", present.join(", ")))
    }
}
