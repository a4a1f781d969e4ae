//! Error taxonomy for Armada.
//!
//! Components return structured errors; nothing below the CLI boundary ever
//! terminates the process. The CLI maps fatal variants (configuration,
//! version mismatch, missing init) to a non-zero exit with the message text
//! as remediation.

use std::path::PathBuf;

use armada_state::StoreError;

use crate::domain::ProviderKind;

/// Errors raised while selecting a hosting provider from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "GITHUB_API_TOKEN and GITLAB_API_TOKEN can't both be set; unset one to pick a provider"
    )]
    BothTokensSet,

    #[error(
        "neither GITHUB_API_TOKEN nor GITLAB_API_TOKEN is set.\n\
         To use Armada with GitHub, create a personal access token and export GITHUB_API_TOKEN.\n\
         To use Armada with GitLab, create a personal access token and export GITLAB_API_TOKEN."
    )]
    NoTokenSet,
}

/// Errors from the hosting-provider backends.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} rejected the search query: {detail}")]
    SearchRejected {
        provider: ProviderKind,
        detail: String,
    },

    #[error("{provider} api error ({status}): {detail}")]
    Api {
        provider: ProviderKind,
        status: u16,
        detail: String,
    },

    #[error("invalid repo name '{0}': expected namespace/name")]
    InvalidRepoName(String),

    #[error("unexpected {provider} response: {detail}")]
    UnexpectedResponse {
        provider: ProviderKind,
        detail: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Armada domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ArmadaError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(
        "the workflow directory {workdir} was created with armada {recorded}, \
         which is incompatible with this armada {running}. Either run again \
         with a matching version, or remove the directory and re-run init."
    )]
    VersionMismatch {
        workdir: PathBuf,
        recorded: String,
        running: String,
    },

    #[error("no workflow found in {workdir}: run `armada init` first")]
    InitMissing { workdir: PathBuf },

    #[error("usage error: {0}")]
    Usage(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("git error: {0}")]
    Git(String),

    #[error("merge blocked: {0}")]
    MergeBlocked(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Armada domain operations.
pub type Result<T> = std::result::Result<T, ArmadaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_names_both_versions() {
        let err = ArmadaError::VersionMismatch {
            workdir: PathBuf::from("/work/armada"),
            recorded: "1.0.0".to_string(),
            running: "1.1.0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("1.0.0"));
        assert!(msg.contains("1.1.0"));
        assert!(msg.contains("/work/armada"));
    }

    #[test]
    fn test_init_missing_points_at_init() {
        let err = ArmadaError::InitMissing {
            workdir: PathBuf::from("/work/armada"),
        };
        assert!(err.to_string().contains("armada init"));
    }

    #[test]
    fn test_config_errors_name_both_vars() {
        for err in [ConfigError::BothTokensSet, ConfigError::NoTokenSet] {
            let msg = err.to_string();
            assert!(msg.contains("GITHUB_API_TOKEN"));
            assert!(msg.contains("GITLAB_API_TOKEN"));
        }
    }
}
