//! Process configuration read from the environment.
//!
//! | Variable                    | Required | Default        |
//! |-----------------------------|----------|----------------|
//! | `GITHUB_TOKEN`              | yes      |                |
//! | `AUTO_MERGE_WEBHOOK_SECRET` | yes      |                |
//! | `AUTO_MERGE_CONFIG`         | no       | built-in       |
//! | `AUTO_MERGE_LISTEN`         | no       | `0.0.0.0:3000` |
//! | `AUTO_MERGE_APP_SLUG`       | no       |                |
//!
//! `AUTO_MERGE_CONFIG` points at a JSON [`RepoConfig`] applied to every
//! repository. `AUTO_MERGE_APP_SLUG` names the GitHub App the bot runs as;
//! check events from that app are not treated as triggers.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::{ConfigError, RepoConfig};
use crate::webhooks::WebhookSecret;

const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid AUTO_MERGE_LISTEN address {value:?}: {source}")]
    InvalidListen {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to load AUTO_MERGE_CONFIG: {0}")]
    RepoConfig(#[from] ConfigError),
}

/// Settings of the `auto-merge` binary.
#[derive(Clone)]
pub struct ServerConfig {
    pub github_token: String,
    pub webhook_secret: WebhookSecret,
    pub repo_config: RepoConfig,
    pub listen: SocketAddr,
    pub app_slug: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen", &self.listen)
            .field("repo_config", &self.repo_config)
            .field("app_slug", &self.app_slug)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ServerConfigError::Missing(name));

        let github_token = required("GITHUB_TOKEN")?;
        let webhook_secret = WebhookSecret::from(required("AUTO_MERGE_WEBHOOK_SECRET")?);

        let repo_config = match lookup("AUTO_MERGE_CONFIG") {
            Some(path) => RepoConfig::load(Path::new(&path))?,
            None => RepoConfig::default(),
        };

        let listen_value = lookup("AUTO_MERGE_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = listen_value
            .parse()
            .map_err(|source| ServerConfigError::InvalidListen {
                value: listen_value.clone(),
                source,
            })?;

        Ok(ServerConfig {
            github_token,
            webhook_secret,
            repo_config,
            listen,
            app_slug: lookup("AUTO_MERGE_APP_SLUG"),
        })
    }
}
