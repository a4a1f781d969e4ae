//! Clone stage: check out every repository under the workflow directory.

use std::path::PathBuf;
use std::sync::Arc;

use armada_core::domain::{CloneOutput, Repo, StageRecord};
use armada_core::error::Result;
use armada_core::git;
use armada_core::limiter::RateLimiter;
use armada_core::provider::RepoProvider;
use armada_state::{StageName, WorkflowStore};

use crate::runner::{fan_out, outcome_from_record, RepoOutcome, StageEnv, StageSummary};

/// Run the clone stage for every repo in the init record.
pub async fn run(env: &StageEnv) -> Result<StageSummary> {
    let repos = env.target_repos()?;
    let store = Arc::clone(&env.store);
    let provider = Arc::clone(&env.provider);
    let limiter = Arc::clone(&env.limiter);

    let summary = fan_out(StageName::Clone, repos, env.parallelism, move |repo| {
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        let limiter = Arc::clone(&limiter);
        async move { clone_repo(&store, provider.as_ref(), &limiter, &repo).await }
    })
    .await;

    Ok(summary)
}

/// Checkout directory for a repo: `<root>/<repo>/clone/<short_name>`,
/// a sibling of the stage's record file.
pub fn checkout_dir(store: &WorkflowStore, repo: &Repo) -> PathBuf {
    store
        .root()
        .join(&repo.name)
        .join("clone")
        .join(&repo.short_name)
}

async fn clone_repo(
    store: &WorkflowStore,
    provider: &dyn RepoProvider,
    limiter: &RateLimiter,
    repo: &Repo,
) -> RepoOutcome {
    limiter.acquire().await;

    let record = match do_clone(store, provider, repo).await {
        Ok(output) => StageRecord::success(&repo.name, StageName::Clone, output),
        Err(e) => StageRecord::failure(&repo.name, StageName::Clone, e.to_string()),
    };
    outcome_from_record(store, record)
}

async fn do_clone(
    store: &WorkflowStore,
    provider: &dyn RepoProvider,
    repo: &Repo,
) -> Result<CloneOutput> {
    let dest = checkout_dir(store, repo);

    // A fresh checkout every run; stale checkouts from prior runs would
    // otherwise make git clone refuse the destination.
    if dest.exists() {
        std::fs::remove_dir_all(&dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    git::clone(&provider.authenticated_clone_url(repo), &dest).await?;

    let head_sha = git::head_sha(&dest).await?;
    let default_branch = git::current_branch(&dest).await?;

    Ok(CloneOutput {
        path: dest,
        head_sha,
        default_branch,
    })
}
