//! Per-repository merge configuration.
//!
//! [`RepoConfig`] holds the thresholds, label patterns and flags consumed by
//! the conditions and the action planner. It deserializes from JSON with
//! camelCase keys; every field has a default, so `{}` is a valid config.
//!
//! ```
//! use auto_merge::config::RepoConfig;
//!
//! let config = RepoConfig::from_json(r#"{
//!     "minApprovals": { "COLLABORATOR": 2 },
//!     "blockingLabels": ["wip", { "regex": "^do not merge" }],
//!     "deleteBranchAfterMerge": true
//! }"#).unwrap();
//! assert!(config.delete_branch_after_merge);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::path::Path;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{AuthorAssociation, RepoId};

/// Default name of the check run created when `reportStatus` is enabled.
pub const DEFAULT_STATUS_CHECK_NAME: &str = "auto-merge";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config is not valid JSON or has invalid values (including bad regexes).
    #[error("invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// A label requirement: an exact label name or a regular expression.
///
/// In JSON, a plain string is an exact name and `{ "regex": "..." }` is a
/// pattern. Regexes are compiled when the config is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLabelPattern")]
pub enum LabelPattern {
    Name(String),
    Regex(Regex),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabelPattern {
    Name(String),
    Regex { regex: String },
}

impl TryFrom<RawLabelPattern> for LabelPattern {
    type Error = regex::Error;

    fn try_from(raw: RawLabelPattern) -> Result<Self, Self::Error> {
        match raw {
            RawLabelPattern::Name(name) => Ok(LabelPattern::Name(name)),
            RawLabelPattern::Regex { regex } => Ok(LabelPattern::Regex(Regex::new(&regex)?)),
        }
    }
}

impl LabelPattern {
    /// Returns true if `label` satisfies this pattern.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            LabelPattern::Name(name) => name == label,
            LabelPattern::Regex(regex) => regex.is_match(label),
        }
    }
}

impl fmt::Display for LabelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelPattern::Name(name) => write!(f, "{}", name),
            LabelPattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// How the pull request is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    /// Returns the value of the REST API's `merge_method` parameter.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

/// Merge configuration for one repository.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoConfig {
    /// Minimum number of approvals from reviewers with at least the given association.
    #[serde(deserialize_with = "association_thresholds")]
    pub min_approvals: BTreeMap<AuthorAssociation, u32>,

    /// Maximum number of change requests from reviewers with at least the given association.
    #[serde(deserialize_with = "association_thresholds")]
    pub max_requested_changes: BTreeMap<AuthorAssociation, u32>,

    /// Every pattern must match at least one label.
    pub required_labels: Vec<LabelPattern>,

    /// No label may match any of these patterns.
    pub blocking_labels: Vec<LabelPattern>,

    /// Update the head branch when it is behind a strict base branch.
    pub update_branch: bool,

    /// Delete the head branch after merging (never for forks).
    pub delete_branch_after_merge: bool,

    /// Publish the resolved status as a check run on the head commit.
    pub report_status: bool,

    pub merge_method: MergeMethod,

    /// Name of the status check run. Check runs with this name are ignored
    /// when evaluating checks.
    pub status_check_name: String,
}

/// Threshold keys must name a known association. `AuthorAssociation` itself
/// accepts anything as `Unknown`, which would rank below every reviewer.
fn association_thresholds<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<AuthorAssociation, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    const EXPECTED: &[&str] = &[
        "NONE",
        "FIRST_TIMER",
        "FIRST_TIME_CONTRIBUTOR",
        "CONTRIBUTOR",
        "COLLABORATOR",
        "MEMBER",
        "OWNER",
    ];

    let raw = BTreeMap::<String, u32>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, count)| {
            AuthorAssociation::ORDERED
                .into_iter()
                .find(|a| a.as_str() == key)
                .map(|association| (association, count))
                .ok_or_else(|| de::Error::unknown_variant(&key, EXPECTED))
        })
        .collect()
}

impl Default for RepoConfig {
    fn default() -> Self {
        RepoConfig {
            min_approvals: BTreeMap::from([(AuthorAssociation::Member, 1)]),
            max_requested_changes: BTreeMap::from([(AuthorAssociation::None, 0)]),
            required_labels: Vec::new(),
            blocking_labels: Vec::new(),
            update_branch: false,
            delete_branch_after_merge: false,
            report_status: false,
            merge_method: MergeMethod::default(),
            status_check_name: DEFAULT_STATUS_CHECK_NAME.to_string(),
        }
    }
}

impl RepoConfig {
    /// Parses a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

/// Supplies the merge configuration of a repository.
pub trait ConfigProvider: Send + Sync + 'static {
    fn config_for(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<RepoConfig, ConfigError>> + Send;
}

/// A fixed config, optionally overridden per repository.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    default: RepoConfig,
    overrides: HashMap<RepoId, RepoConfig>,
}

impl StaticConfig {
    pub fn new(default: RepoConfig) -> Self {
        StaticConfig {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Uses `config` for `repo` instead of the default.
    pub fn with_override(mut self, repo: RepoId, config: RepoConfig) -> Self {
        self.overrides.insert(repo, config);
        self
    }

    pub fn get(&self, repo: &RepoId) -> &RepoConfig {
        self.overrides.get(repo).unwrap_or(&self.default)
    }
}

impl ConfigProvider for StaticConfig {
    async fn config_for(&self, repo: &RepoId) -> Result<RepoConfig, ConfigError> {
        Ok(self.get(repo).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = RepoConfig::from_json("{}").unwrap();
        assert_eq!(
            config.min_approvals,
            BTreeMap::from([(AuthorAssociation::Member, 1)])
        );
        assert_eq!(
            config.max_requested_changes,
            BTreeMap::from([(AuthorAssociation::None, 0)])
        );
        assert!(!config.update_branch);
        assert!(!config.delete_branch_after_merge);
        assert_eq!(config.merge_method, MergeMethod::Merge);
        assert_eq!(config.status_check_name, "auto-merge");
    }

    #[test]
    fn parses_all_fields() {
        let config = RepoConfig::from_json(
            r#"{
                "minApprovals": { "OWNER": 1, "COLLABORATOR": 2 },
                "maxRequestedChanges": { "MEMBER": 1 },
                "requiredLabels": ["ready"],
                "blockingLabels": [{ "regex": "^wip" }],
                "updateBranch": true,
                "deleteBranchAfterMerge": true,
                "reportStatus": true,
                "mergeMethod": "squash",
                "statusCheckName": "merge-bot"
            }"#,
        )
        .unwrap();

        assert_eq!(config.min_approvals.len(), 2);
        assert_eq!(
            config.min_approvals.get(&AuthorAssociation::Collaborator),
            Some(&2)
        );
        assert_eq!(
            config.max_requested_changes.get(&AuthorAssociation::Member),
            Some(&1)
        );
        assert!(config.required_labels[0].matches("ready"));
        assert!(config.blocking_labels[0].matches("wip: later"));
        assert!(!config.blocking_labels[0].matches("not wip"));
        assert!(config.update_branch);
        assert!(config.delete_branch_after_merge);
        assert!(config.report_status);
        assert_eq!(config.merge_method.as_api_str(), "squash");
        assert_eq!(config.status_check_name, "merge-bot");
    }

    #[test]
    fn invalid_regex_is_rejected_at_load() {
        let result = RepoConfig::from_json(r#"{ "requiredLabels": [{ "regex": "(" }] }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_association_threshold_is_rejected() {
        let result = RepoConfig::from_json(r#"{ "minApprovals": { "OWNR": 1 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = RepoConfig::from_json(r#"{ "maxRequestedChanges": { "UNKNOWN": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_merge_method_is_rejected() {
        let result = RepoConfig::from_json(r#"{ "mergeMethod": "octopus" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn label_pattern_display() {
        let name = LabelPattern::Name("ready".to_string());
        let regex = LabelPattern::Regex(Regex::new("^wip").unwrap());
        assert_eq!(name.to_string(), "ready");
        assert_eq!(regex.to_string(), "/^wip/");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auto-merge.json");
        std::fs::write(&path, r#"{ "updateBranch": true }"#).unwrap();

        let config = RepoConfig::load(&path).unwrap();
        assert!(config.update_branch);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RepoConfig::load(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn static_config_prefers_overrides() {
        let special = RepoId::new("octocat", "special");
        let provider = StaticConfig::new(RepoConfig::default()).with_override(
            special.clone(),
            RepoConfig {
                update_branch: true,
                ..RepoConfig::default()
            },
        );

        let config = provider.config_for(&special).await.unwrap();
        assert!(config.update_branch);

        let other = provider
            .config_for(&RepoId::new("octocat", "other"))
            .await
            .unwrap();
        assert!(!other.update_branch);
    }
}
