//! Target repository identity.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// The hosting backend a repository lives on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Github,
    Gitlab,
}

impl ProviderKind {
    /// Get the provider name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Github => "github",
            ProviderKind::Gitlab => "gitlab",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A target repository, resolved once by init and immutable thereafter.
///
/// Every later stage refers to the repository by `name` (namespace/name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Repo {
    /// Full "namespace/name" identifier
    pub name: String,

    /// Namespace (owner / group) part of `name`
    pub owner: String,

    /// Bare repository name part of `name`
    pub short_name: String,

    /// Which hosting backend this repo lives on
    pub provider: ProviderKind,

    /// Default branch reported by the provider; empty when init resolved the
    /// repo from a file without a provider lookup
    pub default_branch: String,

    /// HTTPS clone URL
    pub clone_url: String,

    /// Numeric project id (GitLab); absent for GitHub and for file-based init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
}

impl Repo {
    /// Split a "namespace/name" string into (owner, short_name).
    ///
    /// GitLab namespaces may nest ("group/subgroup/name"); the last segment
    /// is the repo, everything before it the namespace.
    pub fn split_full_name(full: &str) -> Result<(String, String), ProviderError> {
        match full.rsplit_once('/') {
            Some((owner, short)) if !owner.is_empty() && !short.is_empty() => {
                Ok((owner.to_string(), short.to_string()))
            }
            _ => Err(ProviderError::InvalidRepoName(full.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_name() {
        let (owner, short) = Repo::split_full_name("org/widget").unwrap();
        assert_eq!(owner, "org");
        assert_eq!(short, "widget");
    }

    #[test]
    fn test_split_nested_namespace() {
        let (owner, short) = Repo::split_full_name("group/subgroup/widget").unwrap();
        assert_eq!(owner, "group/subgroup");
        assert_eq!(short, "widget");
    }

    #[test]
    fn test_split_rejects_bare_names() {
        assert!(Repo::split_full_name("widget").is_err());
        assert!(Repo::split_full_name("/widget").is_err());
        assert!(Repo::split_full_name("org/").is_err());
        assert!(Repo::split_full_name("").is_err());
    }
}
