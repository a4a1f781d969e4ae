//! Git subprocess helpers for the clone/plan/push stages.
//!
//! Thin wrappers over the `git` binary; every failure carries the command
//! and its stderr so per-repo records stay debuggable.

use std::path::Path;

use tokio::process::Command;

use crate::error::{ArmadaError, Result};

async fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| ArmadaError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ArmadaError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Clone `url` into `dest`.
pub async fn clone(url: &str, dest: &Path) -> Result<()> {
    let dest = dest.to_string_lossy().to_string();
    run_git(None, &["clone", url, &dest]).await?;
    Ok(())
}

/// HEAD commit SHA of a checkout.
pub async fn head_sha(dir: &Path) -> Result<String> {
    run_git(Some(dir), &["rev-parse", "HEAD"]).await
}

/// Name of the currently checked-out branch.
pub async fn current_branch(dir: &Path) -> Result<String> {
    run_git(Some(dir), &["rev-parse", "--abbrev-ref", "HEAD"]).await
}

/// Create and check out a new branch.
pub async fn create_branch(dir: &Path, name: &str) -> Result<()> {
    run_git(Some(dir), &["checkout", "-b", name]).await?;
    Ok(())
}

/// Stage every change in the working tree.
pub async fn add_all(dir: &Path) -> Result<()> {
    run_git(Some(dir), &["add", "-A"]).await?;
    Ok(())
}

/// Whether anything is staged for commit.
pub async fn has_staged_changes(dir: &Path) -> Result<bool> {
    let mut cmd = Command::new("git");
    cmd.args(["diff", "--cached", "--quiet"]).current_dir(dir);
    let status = cmd
        .status()
        .await
        .map_err(|e| ArmadaError::Git(format!("failed to run git: {e}")))?;
    // Exit 1 means "differences found"; anything else is a real failure.
    match status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(ArmadaError::Git(
            "git diff --cached --quiet failed".to_string(),
        )),
    }
}

/// Commit staged changes.
pub async fn commit(dir: &Path, message: &str) -> Result<()> {
    run_git(Some(dir), &["commit", "-m", message]).await?;
    Ok(())
}

/// Stat summary of the HEAD commit.
pub async fn show_stat(dir: &Path) -> Result<String> {
    run_git(Some(dir), &["show", "--stat", "--format=", "HEAD"]).await
}

/// Point `origin` at a different URL.
pub async fn set_origin_url(dir: &Path, url: &str) -> Result<()> {
    run_git(Some(dir), &["remote", "set-url", "origin", url]).await?;
    Ok(())
}

/// Force-push a branch to `origin`.
pub async fn push_force(dir: &Path, branch: &str) -> Result<()> {
    run_git(Some(dir), &["push", "-f", "origin", branch]).await?;
    Ok(())
}
