//! Persisted stage records.
//!
//! Every stage writes one record per repository it processed; the record is
//! the only channel between stage invocations. Records are overwritten on
//! re-run, which is the supported recovery path.

use std::path::PathBuf;

use armada_state::StageName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::change::{BuildStatus, ChangeRequestState};
use crate::domain::repo::Repo;

/// The workflow-wide init record: the resolved repository set.
///
/// Written once by init; re-running init overwrites it wholesale, which
/// resets the whole workflow. Every other stage reads it for the repo set,
/// and the version gate reads it for the recorded tool version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitOutput {
    /// Armada version that created this workflow directory
    pub version: String,

    /// Search query used for discovery, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Repos file used instead of a search, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_file: Option<String>,

    /// The resolved target set, immutable until the next init
    pub repos: Vec<Repo>,
}

/// Generic per-repository, per-stage outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct StageRecord<T> {
    /// Full "namespace/name" of the repo this record belongs to
    pub repo: String,

    pub stage: StageName,

    /// Whether the stage completed for this repo
    pub success: bool,

    /// Failure detail; present exactly when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Stage-specific payload; present exactly when `success` is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<T>,

    pub recorded_at: DateTime<Utc>,
}

impl<T> StageRecord<T> {
    /// Record a successful outcome with its payload.
    pub fn success(repo: impl Into<String>, stage: StageName, output: T) -> Self {
        Self {
            repo: repo.into(),
            stage,
            success: true,
            error: None,
            output: Some(output),
            recorded_at: Utc::now(),
        }
    }

    /// Record a failure with human-readable detail.
    pub fn failure(repo: impl Into<String>, stage: StageName, detail: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            stage,
            success: false,
            error: Some(detail.into()),
            output: None,
            recorded_at: Utc::now(),
        }
    }
}

/// Clone stage payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloneOutput {
    /// Checkout directory under the workflow root
    pub path: PathBuf,

    /// HEAD commit of the fresh checkout
    pub head_sha: String,

    /// Branch the checkout landed on (the repo's actual default branch)
    pub default_branch: String,
}

/// Plan stage payload: the committed change, ready to push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanOutput {
    /// Scratch checkout holding the committed change
    pub path: PathBuf,

    /// Branch the change was committed to
    pub branch: String,

    /// Branch the change request will target
    pub base_branch: String,

    pub commit_sha: String,

    pub commit_message: String,

    /// `git show --stat` of the change commit, for humans
    pub diff_stat: String,
}

/// Push stage payload: the opened change request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushOutput {
    pub branch: String,

    /// PR number (GitHub) or MR iid (GitLab)
    pub number: u64,

    pub url: String,
}

/// Merge stage payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeOutput {
    pub merged: bool,
    pub number: u64,
    pub url: String,
}

/// Status stage payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusOutput {
    pub number: u64,
    pub url: String,
    pub state: ChangeRequestState,
    pub approved: bool,
    pub build: BuildStatus,
}
