//! Provider selection from process environment.

use crate::domain::ProviderKind;
use crate::error::ConfigError;

const GITHUB_TOKEN_VAR: &str = "GITHUB_API_TOKEN";
const GITLAB_TOKEN_VAR: &str = "GITLAB_API_TOKEN";
const GITLAB_URL_VAR: &str = "GITLAB_URL";

/// Which hosting backend to talk to, and with what credential.
///
/// Resolved exactly once at startup; nothing downstream ever branches on
/// the environment again.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub token: String,

    /// Base URL of a self-hosted GitLab; `None` means gitlab.com. Ignored
    /// for GitHub.
    pub gitlab_url: Option<String>,
}

impl ProviderConfig {
    /// Select the provider from `GITHUB_API_TOKEN` / `GITLAB_API_TOKEN`.
    ///
    /// Exactly one of the two must be set; both or neither is a fatal
    /// configuration error. An empty value counts as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::select(
            std::env::var(GITHUB_TOKEN_VAR).ok(),
            std::env::var(GITLAB_TOKEN_VAR).ok(),
            std::env::var(GITLAB_URL_VAR).ok(),
        )
    }

    /// Pure selection rule, split out so tests can exercise it without
    /// touching the process environment.
    pub fn select(
        github_token: Option<String>,
        gitlab_token: Option<String>,
        gitlab_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let github_token = github_token.filter(|t| !t.is_empty());
        let gitlab_token = gitlab_token.filter(|t| !t.is_empty());

        match (github_token, gitlab_token) {
            (Some(_), Some(_)) => Err(ConfigError::BothTokensSet),
            (None, None) => Err(ConfigError::NoTokenSet),
            (Some(token), None) => Ok(Self {
                kind: ProviderKind::Github,
                token,
                gitlab_url: None,
            }),
            (None, Some(token)) => Ok(Self {
                kind: ProviderKind::Gitlab,
                token,
                gitlab_url: gitlab_url.filter(|u| !u.is_empty()),
            }),
        }
    }
}
