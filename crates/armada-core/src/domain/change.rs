//! Change-request types shared by both provider backends.
//!
//! "Change request" covers GitHub pull requests and GitLab merge requests;
//! the pipeline never sees the difference.

use serde::{Deserialize, Serialize};

/// A change request opened by the push stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRequest {
    /// PR number (GitHub) or MR iid (GitLab)
    pub number: u64,

    /// Web URL for humans
    pub url: String,
}

/// Request to open a change request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewChangeRequest {
    pub title: String,
    pub body: String,
    pub source_branch: String,
    pub target_branch: String,
    pub assignee: Option<String>,
}

/// Lifecycle state of a change request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestState {
    Open,
    Merged,
    Closed,
}

/// Build/pipeline state on the change request's head commit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Success,
    Failure,
    /// The provider reported no build information
    Unknown,
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of a change request's mergeability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRequestStatus {
    pub state: ChangeRequestState,

    /// Whether review approval has been granted
    pub approved: bool,

    pub build: BuildStatus,
}

impl ChangeRequestStatus {
    /// Whether the merge stage may proceed, given the operator's gate toggles.
    pub fn mergeable(&self, ignore_approval: bool, ignore_build: bool) -> Result<(), String> {
        if self.state != ChangeRequestState::Open {
            return Err(format!("change request is not open (state: {:?})", self.state));
        }
        if !ignore_approval && !self.approved {
            return Err("review approval missing".to_string());
        }
        if !ignore_build && self.build != BuildStatus::Success {
            return Err(format!("build status is {}", self.build));
        }
        Ok(())
    }
}
