//! Stage vocabulary and record path layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Repo key of the single workflow-wide init record.
///
/// The init record is the only one that carries no repository name; every
/// other key is (repo, stage).
pub const INIT_KEY: &str = "";

/// The fixed stages of a workflow run, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Resolve the target repository set
    Init,

    /// Check out each repository
    Clone,

    /// Apply the scripted change and commit it
    Plan,

    /// Push the branch and open a change request
    Push,

    /// Merge the change request
    Merge,

    /// Query the change request's review/build state
    Status,
}

impl StageName {
    /// Get the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Init => "init",
            StageName::Clone => "clone",
            StageName::Plan => "plan",
            StageName::Push => "push",
            StageName::Merge => "merge",
            StageName::Status => "status",
        }
    }

    /// The stage whose record this stage consumes, if any.
    ///
    /// Status reads Push's record, same as Merge; neither depends on the
    /// other.
    pub fn predecessor(&self) -> Option<StageName> {
        match self {
            StageName::Init => None,
            StageName::Clone => Some(StageName::Init),
            StageName::Plan => Some(StageName::Clone),
            StageName::Push => Some(StageName::Plan),
            StageName::Merge | StageName::Status => Some(StageName::Push),
        }
    }

    /// Stages whose records reference this stage's output.
    ///
    /// Used to warn when a re-run leaves a downstream record pointing at a
    /// stale input.
    pub fn downstream(&self) -> &'static [StageName] {
        match self {
            StageName::Init => &[StageName::Clone],
            StageName::Clone => &[StageName::Plan],
            StageName::Plan => &[StageName::Push],
            StageName::Push => &[StageName::Merge, StageName::Status],
            StageName::Merge | StageName::Status => &[],
        }
    }

    /// Record path for (repo, stage) under the given workflow root.
    ///
    /// Layout: `<root>/init.json` for the init record, otherwise
    /// `<root>/<repo>/<stage>/<stage>.json`. Repo names contain a `/`
    /// (namespace/name), so records nest one level deeper than they look.
    pub fn record_path(&self, root: &Path, repo: &str) -> PathBuf {
        match self {
            StageName::Init => root.join("init.json"),
            stage => root
                .join(repo)
                .join(stage.as_str())
                .join(format!("{}.json", stage.as_str())),
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
