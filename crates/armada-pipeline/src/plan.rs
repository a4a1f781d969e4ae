//! Plan stage: apply the scripted change to a scratch checkout and commit it.
//!
//! The clone checkout is never mutated. Each repo gets a scratch checkout
//! cloned from it (git does the tree copy), the operator's command runs
//! inside that checkout on a fresh branch, and the result is committed. A
//! command that changes nothing fails the repo — an empty change request
//! would be noise.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use armada_core::domain::{CloneOutput, PlanOutput, Repo, StageRecord};
use armada_core::error::{ArmadaError, Result};
use armada_core::git;
use armada_state::{StageName, WorkflowStore};
use tokio::process::Command;

use crate::runner::{
    fan_out, outcome_from_record, read_predecessor, Predecessor, RepoOutcome, StageEnv,
    StageSummary,
};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Branch the change is committed to
    pub branch: String,

    /// Commit message
    pub message: String,

    /// Change command and its arguments, run inside the scratch checkout
    pub command: Vec<String>,
}

/// Run the plan stage for every repo with a successful clone record.
pub async fn run(env: &StageEnv, opts: PlanOptions) -> Result<StageSummary> {
    if opts.command.is_empty() {
        return Err(ArmadaError::Usage(
            "plan requires a change command, e.g. `armada plan -b update -m 'msg' -- ./change.sh`"
                .to_string(),
        ));
    }

    let repos = env.target_repos()?;
    let store = Arc::clone(&env.store);
    let limiter = Arc::clone(&env.limiter);
    let opts = Arc::new(opts);

    let summary = fan_out(StageName::Plan, repos, env.parallelism, move |repo| {
        let store = Arc::clone(&store);
        let limiter = Arc::clone(&limiter);
        let opts = Arc::clone(&opts);
        async move {
            let clone = match read_predecessor::<CloneOutput>(&store, &repo.name, StageName::Plan)
            {
                Predecessor::Ready(output) => output,
                Predecessor::Skip(reason) => return RepoOutcome::Skipped(reason),
                Predecessor::Corrupt(detail) => return RepoOutcome::Corrupt(detail),
            };

            limiter.acquire().await;

            let record = match do_plan(&store, &repo, &clone, &opts).await {
                Ok(output) => StageRecord::success(&repo.name, StageName::Plan, output),
                Err(e) => StageRecord::failure(&repo.name, StageName::Plan, e.to_string()),
            };
            outcome_from_record(&store, record)
        }
    })
    .await;

    Ok(summary)
}

/// Scratch checkout for a repo: `<root>/<repo>/plan/<short_name>`.
pub fn plan_dir(store: &WorkflowStore, repo: &Repo) -> PathBuf {
    store
        .root()
        .join(&repo.name)
        .join("plan")
        .join(&repo.short_name)
}

async fn do_plan(
    store: &WorkflowStore,
    repo: &Repo,
    clone: &CloneOutput,
    opts: &PlanOptions,
) -> Result<PlanOutput> {
    let dest = plan_dir(store, repo);
    if dest.exists() {
        std::fs::remove_dir_all(&dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    git::clone(&clone.path.to_string_lossy(), &dest).await?;
    let base_branch = git::current_branch(&dest).await?;
    git::create_branch(&dest, &opts.branch).await?;

    run_change_command(&dest, &opts.command).await?;

    git::add_all(&dest).await?;
    if !git::has_staged_changes(&dest).await? {
        return Err(ArmadaError::Git(
            "change command produced no diff".to_string(),
        ));
    }
    git::commit(&dest, &opts.message).await?;

    let commit_sha = git::head_sha(&dest).await?;
    let diff_stat = git::show_stat(&dest).await?;

    Ok(PlanOutput {
        path: dest,
        branch: opts.branch.clone(),
        base_branch,
        commit_sha,
        commit_message: opts.message.clone(),
        diff_stat,
    })
}

async fn run_change_command(dir: &PathBuf, command: &[String]) -> Result<()> {
    let output = Command::new(&command[0])
        .args(&command[1..])
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ArmadaError::Git(format!("failed to run change command: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ArmadaError::Git(format!(
            "change command exited with {}: {}",
            output.status.code().unwrap_or(-1),
            tail(stderr.trim(), 300)
        )));
    }
    Ok(())
}

/// Last `max_len` bytes of a string, for error detail.
fn tail(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        // Don't split a UTF-8 sequence.
        let mut start = s.len() - max_len;
        while !s.is_char_boundary(start) {
            start += 1;
        }
        &s[start..]
    }
}
