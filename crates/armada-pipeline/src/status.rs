//! Status stage: snapshot each change request's review/build state.

use std::sync::Arc;

use armada_core::domain::{PushOutput, Repo, StageRecord, StatusOutput};
use armada_core::error::Result;
use armada_core::provider::RepoProvider;
use armada_state::StageName;

use crate::runner::{
    fan_out, outcome_from_record, read_predecessor, Predecessor, RepoOutcome, StageEnv,
    StageSummary,
};

/// Run the status stage for every repo with a successful push record.
pub async fn run(env: &StageEnv) -> Result<StageSummary> {
    let repos = env.target_repos()?;
    let store = Arc::clone(&env.store);
    let provider = Arc::clone(&env.provider);

    let summary = fan_out(StageName::Status, repos, env.parallelism, move |repo| {
        let store = Arc::clone(&store);
        let provider = Arc::clone(&provider);
        async move {
            let push = match read_predecessor::<PushOutput>(&store, &repo.name, StageName::Status)
            {
                Predecessor::Ready(output) => output,
                Predecessor::Skip(reason) => return RepoOutcome::Skipped(reason),
                Predecessor::Corrupt(detail) => return RepoOutcome::Corrupt(detail),
            };

            let record = match do_status(provider.as_ref(), &repo, &push).await {
                Ok(output) => StageRecord::success(&repo.name, StageName::Status, output),
                Err(e) => StageRecord::failure(&repo.name, StageName::Status, e.to_string()),
            };
            outcome_from_record(&store, record)
        }
    })
    .await;

    Ok(summary)
}

async fn do_status(
    provider: &dyn RepoProvider,
    repo: &Repo,
    push: &PushOutput,
) -> Result<StatusOutput> {
    let status = provider.change_request_status(repo, push.number).await?;
    Ok(StatusOutput {
        number: push.number,
        url: push.url.clone(),
        state: status.state,
        approved: status.approved,
        build: status.build,
    })
}
