//! Merge stage: merge each pushed change request.
//!
//! Merging consults the change request's review approval and build status
//! first; the operator can lift either gate. Merges are externally visible,
//! so they honor the throttle on top of the global request pacer.

use std::sync::Arc;
use std::time::Duration;

use armada_core::domain::{ChangeRequestState, MergeOutput, PushOutput, Repo, StageRecord};
use armada_core::error::Result;
use armada_core::limiter::RateLimiter;
use armada_core::provider::RepoProvider;
use armada_state::StageName;

use crate::runner::{
    fan_out, outcome_from_record, read_predecessor, Predecessor, RepoOutcome, StageEnv,
    StageSummary,
};

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Minimum spacing between merges
    pub throttle: Duration,

    /// Merge without review approval
    pub ignore_review_approval: bool,

    /// Merge with a non-green build
    pub ignore_build_status: bool,
}

/// Run the merge stage for every repo with a successful push record.
pub async fn run(env: &StageEnv, opts: MergeOptions) -> Result<StageSummary> {
    let repos = env.target_repos()?;
    let store = Arc::clone(&env.store);
    let provider = Arc::clone(&env.provider);
    let throttle = Arc::new(RateLimiter::new(opts.throttle));
    let opts = Arc::new(opts);

    let summary = fan_out(StageName::Merge, repos, env.parallelism, move |repo| {
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        let throttle = Arc::clone(&throttle);
        let opts = Arc::clone(&opts);
        async move {
            let push = match read_predecessor::<PushOutput>(&store, &repo.name, StageName::Merge) {
                Predecessor::Ready(output) => output,
                Predecessor::Skip(reason) => return RepoOutcome::Skipped(reason),
                Predecessor::Corrupt(detail) => return RepoOutcome::Corrupt(detail),
            };

            let record = match do_merge(provider.as_ref(), &throttle, &repo, &push, &opts).await {
                Ok(output) => StageRecord::success(&repo.name, StageName::Merge, output),
                Err(e) => StageRecord::failure(&repo.name, StageName::Merge, e.to_string()),
            };
            outcome_from_record(&store, record)
        }
    })
    .await;

    Ok(summary)
}

async fn do_merge(
    provider: &dyn RepoProvider,
    throttle: &RateLimiter,
    repo: &Repo,
    push: &PushOutput,
    opts: &MergeOptions,
) -> Result<MergeOutput> {
    let status = provider.change_request_status(repo, push.number).await?;

    // Re-runs converge: a change request merged by a previous run (or by a
    // human) counts as success.
    if status.state == ChangeRequestState::Merged {
        return Ok(MergeOutput {
            merged: true,
            number: push.number,
            url: push.url.clone(),
        });
    }

    status
        .mergeable(opts.ignore_review_approval, opts.ignore_build_status)
        .map_err(armada_core::error::ArmadaError::MergeBlocked)?;

    throttle.acquire().await;
    let change = provider.merge_change_request(repo, push.number).await?;

    Ok(MergeOutput {
        merged: true,
        number: change.number,
        url: change.url,
    })
}
