//! Per-repository fan-out shared by every stage.
//!
//! A bounded worker pool processes the repository set; each repo's outcome
//! lands in its own record, so one repo's failure never blocks or rolls back
//! another's success. Outcomes may complete in any order.

use std::future::Future;
use std::sync::Arc;

use armada_core::domain::{InitOutput, Repo, StageRecord};
use armada_core::error::{ArmadaError, Result};
use armada_core::limiter::RateLimiter;
use armada_core::provider::RepoProvider;
use armada_state::{StageName, StoreError, WorkflowStore, INIT_KEY};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Everything a stage needs: the store, the provider, the shared pacer, and
/// the operator's concurrency/filter settings.
pub struct StageEnv {
    pub store: Arc<WorkflowStore>,
    pub provider: Arc<dyn RepoProvider>,
    pub limiter: Arc<RateLimiter>,
    pub parallelism: usize,

    /// Restrict the stage to a single repository from the init set.
    pub repo_filter: Option<String>,
}

impl StageEnv {
    /// Read the init record; its absence means "run init first".
    pub fn load_init(&self) -> Result<InitOutput> {
        match self.store.try_read::<InitOutput>(INIT_KEY, StageName::Init)? {
            Some(init) => Ok(init),
            None => Err(ArmadaError::InitMissing {
                workdir: self.store.root().to_path_buf(),
            }),
        }
    }

    /// The repositories this stage invocation will process.
    pub fn target_repos(&self) -> Result<Vec<Repo>> {
        let init = self.load_init()?;
        match &self.repo_filter {
            None => Ok(init.repos),
            Some(name) => {
                let repos: Vec<Repo> =
                    init.repos.into_iter().filter(|r| &r.name == name).collect();
                if repos.is_empty() {
                    return Err(ArmadaError::Usage(format!(
                        "repo '{name}' is not part of this workflow; re-run init to change the set"
                    )));
                }
                Ok(repos)
            }
        }
    }
}

/// Outcome of one repository within one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoOutcome {
    /// Stage ran and a success record was written
    Succeeded,

    /// Stage ran and a failure record was written
    Failed(String),

    /// Predecessor record missing or failed; nothing written
    Skipped(String),

    /// A persisted record exists but cannot be parsed; nothing written
    Corrupt(String),
}

/// Aggregate view of a stage invocation, reported to the operator at the end.
#[derive(Debug, Clone)]
pub struct StageSummary {
    pub stage: StageName,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
    pub corrupt: Vec<(String, String)>,
}

impl StageSummary {
    fn new(stage: StageName) -> Self {
        Self {
            stage,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            corrupt: Vec::new(),
        }
    }

    fn record(&mut self, repo: String, outcome: RepoOutcome) {
        match outcome {
            RepoOutcome::Succeeded => self.succeeded.push(repo),
            RepoOutcome::Failed(detail) => self.failed.push((repo, detail)),
            RepoOutcome::Skipped(reason) => self.skipped.push((repo, reason)),
            RepoOutcome::Corrupt(detail) => self.corrupt.push((repo, detail)),
        }
    }

    /// Corrupt records need operator attention and fail the whole command,
    /// unlike ordinary per-repo failures.
    pub fn has_corruption(&self) -> bool {
        !self.corrupt.is_empty()
    }

    /// Human-readable account of the invocation.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {} succeeded, {} failed, {} skipped",
            self.stage,
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        );
        for (repo, detail) in &self.failed {
            out.push_str(&format!("\n  failed  {repo}: {detail}"));
        }
        for (repo, reason) in &self.skipped {
            out.push_str(&format!("\n  skipped {repo}: {reason}"));
        }
        for (repo, detail) in &self.corrupt {
            out.push_str(&format!("\n  corrupt {repo}: {detail}"));
        }
        out
    }
}

/// Run `per_repo` for every repo on a bounded worker pool.
///
/// Never fails fast: every repo gets its turn, outcomes land as they
/// complete, and the summary holds them all.
pub async fn fan_out<F, Fut>(
    stage: StageName,
    repos: Vec<Repo>,
    parallelism: usize,
    per_repo: F,
) -> StageSummary
where
    F: Fn(Repo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RepoOutcome> + Send + 'static,
{
    let total = repos.len();
    let sem = Arc::new(Semaphore::new(parallelism.max(1)));
    let per_repo = Arc::new(per_repo);
    let mut tasks = FuturesUnordered::new();

    for repo in repos {
        let sem = Arc::clone(&sem);
        let per_repo = Arc::clone(&per_repo);
        let name = repo.name.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore never closed");
            let outcome = per_repo(repo).await;
            (name, outcome)
        }));
    }

    let mut summary = StageSummary::new(stage);
    while let Some(joined) = tasks.next().await {
        match joined {
            Ok((name, outcome)) => {
                debug!(stage = %stage, repo = %name, outcome = ?outcome, "repo processed");
                summary.record(name, outcome);
            }
            Err(e) => warn!(stage = %stage, "worker panicked: {e}"),
        }
    }

    info!(
        stage = %stage,
        total,
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        skipped = summary.skipped.len(),
        "stage complete"
    );
    summary
}

/// How a stage sees its predecessor's record for one repo.
pub enum Predecessor<T> {
    /// Predecessor succeeded; here is its payload
    Ready(T),

    /// Predecessor record missing or unsuccessful; skip with this reason
    Skip(String),

    /// Predecessor record unparsable; surface, never treat as absence
    Corrupt(String),
}

/// Read the predecessor record for `stage` and `repo`.
pub fn read_predecessor<T: DeserializeOwned>(
    store: &WorkflowStore,
    repo: &str,
    stage: StageName,
) -> Predecessor<T> {
    let pred = stage
        .predecessor()
        .expect("every non-init stage has a predecessor");

    match store.try_read::<StageRecord<T>>(repo, pred) {
        Ok(Some(record)) if record.success => match record.output {
            Some(output) => Predecessor::Ready(output),
            None => Predecessor::Corrupt(format!(
                "{pred} record for {repo} is marked successful but has no output"
            )),
        },
        Ok(Some(record)) => Predecessor::Skip(format!(
            "{pred} failed: {}",
            record.error.unwrap_or_else(|| "no detail".to_string())
        )),
        Ok(None) => Predecessor::Skip(format!("no {pred} record")),
        Err(e) => Predecessor::Corrupt(e.to_string()),
    }
}

/// Persist a stage record, warning when a downstream record now references a
/// stale input.
///
/// Re-running an earlier stage never deletes downstream records: a push
/// record is the only pointer to an already-opened change request.
/// Re-running the downstream stage overwrites them.
pub fn write_record<T: Serialize>(
    store: &WorkflowStore,
    record: &StageRecord<T>,
) -> std::result::Result<(), StoreError> {
    for downstream in record.stage.downstream() {
        if store.contains(&record.repo, *downstream) {
            warn!(
                repo = %record.repo,
                stage = %record.stage,
                downstream = %downstream,
                "overwriting record; existing downstream record now references a stale input"
            );
        }
    }
    store.write(&record.repo, record.stage, record)
}

/// Fold a record write into the repo's outcome: a write failure is a
/// per-repo failure, not a crash.
pub fn outcome_from_record<T: Serialize>(
    store: &WorkflowStore,
    record: StageRecord<T>,
) -> RepoOutcome {
    let outcome = if record.success {
        RepoOutcome::Succeeded
    } else {
        RepoOutcome::Failed(
            record
                .error
                .clone()
                .unwrap_or_else(|| "no detail".to_string()),
        )
    };
    match write_record(store, &record) {
        Ok(()) => outcome,
        Err(e) => RepoOutcome::Failed(format!("failed to persist record: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_core::domain::{CloneOutput, ProviderKind};

    fn repo(name: &str) -> Repo {
        let (owner, short_name) = Repo::split_full_name(name).unwrap();
        Repo {
            name: name.to_string(),
            owner,
            short_name,
            provider: ProviderKind::Github,
            default_branch: "main".to_string(),
            clone_url: format!("https://github.com/{name}.git"),
            project_id: None,
        }
    }

    #[tokio::test]
    async fn fan_out_collects_all_outcomes() {
        let repos = vec![repo("org/a"), repo("org/b"), repo("org/c")];
        let summary = fan_out(StageName::Clone, repos, 2, |repo| async move {
            match repo.name.as_str() {
                "org/a" => RepoOutcome::Succeeded,
                "org/b" => RepoOutcome::Failed("boom".to_string()),
                _ => RepoOutcome::Skipped("no clone record".to_string()),
            }
        })
        .await;

        assert_eq!(summary.succeeded, vec!["org/a".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert!(!summary.has_corruption());
    }

    #[tokio::test]
    async fn fan_out_does_not_fail_fast() {
        let repos: Vec<Repo> = (0..8).map(|i| repo(&format!("org/r{i}"))).collect();
        let summary = fan_out(StageName::Plan, repos, 3, |_repo| async move {
            RepoOutcome::Failed("every repo fails".to_string())
        })
        .await;
        assert_eq!(summary.failed.len(), 8);
    }

    #[test]
    fn read_predecessor_maps_three_ways() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::open(dir.path().join("armada")).unwrap();

        // Missing record: skip with a "no clone record" reason.
        match read_predecessor::<CloneOutput>(&store, "org/a", StageName::Plan) {
            Predecessor::Skip(reason) => assert_eq!(reason, "no clone record"),
            _ => panic!("expected Skip"),
        }

        // Failed predecessor: skip, reason carries the failure detail.
        let failed: StageRecord<CloneOutput> =
            StageRecord::failure("org/a", StageName::Clone, "repository deleted");
        store.write("org/a", StageName::Clone, &failed).unwrap();
        match read_predecessor::<CloneOutput>(&store, "org/a", StageName::Plan) {
            Predecessor::Skip(reason) => assert!(reason.contains("repository deleted")),
            _ => panic!("expected Skip"),
        }

        // Corrupt predecessor: surfaced, never treated as absence.
        let path = StageName::Clone.record_path(store.root(), "org/a");
        std::fs::write(path, b"{ nope").unwrap();
        match read_predecessor::<CloneOutput>(&store, "org/a", StageName::Plan) {
            Predecessor::Corrupt(detail) => assert!(detail.contains("corrupt")),
            _ => panic!("expected Corrupt"),
        }
    }

    #[test]
    fn summary_render_lists_reasons() {
        let mut summary = StageSummary::new(StageName::Push);
        summary.record("org/a".to_string(), RepoOutcome::Succeeded);
        summary.record(
            "org/b".to_string(),
            RepoOutcome::Skipped("no plan record".to_string()),
        );
        let text = summary.render();
        assert!(text.contains("push: 1 succeeded, 0 failed, 1 skipped"));
        assert!(text.contains("skipped org/b: no plan record"));
    }
}
