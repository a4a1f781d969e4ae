//! Push stage: push each planned branch and open a change request.
//!
//! Pushing and opening change requests are externally visible, so on top of
//! the global request pacer this stage honors the operator's throttle — one
//! repo's worth of side effects per throttle interval, across all workers.

use std::sync::Arc;
use std::time::Duration;

use armada_core::domain::{NewChangeRequest, PlanOutput, PushOutput, Repo, StageRecord};
use armada_core::error::Result;
use armada_core::git;
use armada_core::limiter::RateLimiter;
use armada_core::provider::RepoProvider;
use armada_state::StageName;

use crate::runner::{
    fan_out, outcome_from_record, read_predecessor, Predecessor, RepoOutcome, StageEnv,
    StageSummary,
};

#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Minimum spacing between change-request creations
    pub throttle: Duration,

    /// Username to assign the change request to
    pub assignee: Option<String>,

    /// File whose contents become the change-request body; the commit
    /// message is used when absent
    pub body_file: Option<std::path::PathBuf>,
}

/// Run the push stage for every repo with a successful plan record.
pub async fn run(env: &StageEnv, opts: PushOptions) -> Result<StageSummary> {
    let repos = env.target_repos()?;

    // Read the body once up front; an unreadable file is a usage problem,
    // not a per-repo failure.
    let body = match &opts.body_file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };

    let store = Arc::clone(&env.store);
    let provider = Arc::clone(&env.provider);
    let limiter = Arc::clone(&env.limiter);
    let throttle = Arc::new(RateLimiter::new(opts.throttle));
    let assignee = opts.assignee.clone();

    let summary = fan_out(StageName::Push, repos, env.parallelism, move |repo| {
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        let limiter = Arc::clone(&limiter);
        let throttle = Arc::clone(&throttle);
        let assignee = assignee.clone();
        let body = body.clone();
        async move {
            let plan = match read_predecessor::<PlanOutput>(&store, &repo.name, StageName::Push) {
                Predecessor::Ready(output) => output,
                Predecessor::Skip(reason) => return RepoOutcome::Skipped(reason),
                Predecessor::Corrupt(detail) => return RepoOutcome::Corrupt(detail),
            };

            throttle.acquire().await;
            limiter.acquire().await;

            let record =
                match do_push(provider.as_ref(), &repo, &plan, assignee.as_deref(), body).await {
                    Ok(output) => StageRecord::success(&repo.name, StageName::Push, output),
                    Err(e) => StageRecord::failure(&repo.name, StageName::Push, e.to_string()),
                };
            outcome_from_record(&store, record)
        }
    })
    .await;

    Ok(summary)
}

async fn do_push(
    provider: &dyn RepoProvider,
    repo: &Repo,
    plan: &PlanOutput,
    assignee: Option<&str>,
    body: Option<String>,
) -> Result<PushOutput> {
    // The scratch checkout's origin points at the local clone; re-point it
    // at the real remote before pushing.
    git::set_origin_url(&plan.path, &provider.authenticated_clone_url(repo)).await?;
    git::push_force(&plan.path, &plan.branch).await?;

    let title = plan
        .commit_message
        .lines()
        .next()
        .unwrap_or(&plan.commit_message)
        .to_string();

    let request = NewChangeRequest {
        title,
        body: body.unwrap_or_else(|| plan.commit_message.clone()),
        source_branch: plan.branch.clone(),
        target_branch: plan.base_branch.clone(),
        assignee: assignee.map(String::from),
    };

    let change = provider.open_change_request(repo, &request).await?;

    Ok(PushOutput {
        branch: plan.branch.clone(),
        number: change.number,
        url: change.url,
    })
}
