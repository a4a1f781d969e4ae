//! In-memory fakes for the provider trait (testing only)
//!
//! `ScriptedProvider` satisfies [`RepoProvider`](crate::provider::RepoProvider)
//! without any network: search results and per-repo clone URLs are scripted
//! up front, and side-effecting calls are recorded for assertions. Point a
//! repo's clone URL at a local fixture repository and the clone/plan/push
//! git mechanics run for real against the filesystem.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    BuildStatus, ChangeRequest, ChangeRequestState, ChangeRequestStatus, NewChangeRequest,
    ProviderKind, Repo,
};
use crate::error::ProviderError;
use crate::provider::RepoProvider;

/// Scripted stand-in for a hosting backend.
pub struct ScriptedProvider {
    kind: ProviderKind,
    search_results: Vec<Repo>,
    clone_urls: HashMap<String, String>,
    fail_open_for: HashSet<String>,
    statuses: Mutex<HashMap<String, ChangeRequestStatus>>,
    numbers: Mutex<HashMap<String, u64>>,
    next_number: AtomicU64,
    opened: Mutex<Vec<(String, NewChangeRequest)>>,
    merged: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            search_results: Vec::new(),
            clone_urls: HashMap::new(),
            fail_open_for: HashSet::new(),
            statuses: Mutex::new(HashMap::new()),
            numbers: Mutex::new(HashMap::new()),
            next_number: AtomicU64::new(1),
            opened: Mutex::new(Vec::new()),
            merged: Mutex::new(Vec::new()),
        }
    }

    /// Script the repos returned by `search`.
    pub fn with_search_results(mut self, repos: Vec<Repo>) -> Self {
        self.search_results = repos;
        self
    }

    /// Map a repo name to a clone URL (usually a local fixture path).
    /// Unmapped repos get a path that does not exist, so their clone fails.
    pub fn with_clone_url(mut self, name: &str, url: &str) -> Self {
        self.clone_urls.insert(name.to_string(), url.to_string());
        self
    }

    /// Make `open_change_request` fail for a repo.
    pub fn with_open_failure(mut self, name: &str) -> Self {
        self.fail_open_for.insert(name.to_string());
        self
    }

    /// Script the status reported for a repo's change request.
    /// Unscripted repos report open, approved, build green.
    pub fn with_status(self, name: &str, status: ChangeRequestStatus) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
        self
    }

    /// Change requests opened so far, in call order.
    pub fn opened(&self) -> Vec<(String, NewChangeRequest)> {
        self.opened.lock().unwrap().clone()
    }

    /// Repos whose change requests were merged, in call order.
    pub fn merged(&self) -> Vec<String> {
        self.merged.lock().unwrap().clone()
    }

    fn number_for(&self, name: &str) -> u64 {
        let mut numbers = self.numbers.lock().unwrap();
        *numbers
            .entry(name.to_string())
            .or_insert_with(|| self.next_number.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl RepoProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn search(&self, _query: &str) -> Result<Vec<Repo>, ProviderError> {
        Ok(self.search_results.clone())
    }

    async fn repos_from_names(&self, names: &[String]) -> Result<Vec<Repo>, ProviderError> {
        names
            .iter()
            .map(|full| {
                let (owner, short_name) = Repo::split_full_name(full)?;
                let clone_url = self
                    .clone_urls
                    .get(full)
                    .cloned()
                    .unwrap_or_else(|| format!("/nonexistent/{full}"));
                Ok(Repo {
                    name: full.clone(),
                    owner,
                    short_name,
                    provider: self.kind,
                    default_branch: String::new(),
                    clone_url,
                    project_id: None,
                })
            })
            .collect()
    }

    fn authenticated_clone_url(&self, repo: &Repo) -> String {
        repo.clone_url.clone()
    }

    async fn open_change_request(
        &self,
        repo: &Repo,
        new: &NewChangeRequest,
    ) -> Result<ChangeRequest, ProviderError> {
        if self.fail_open_for.contains(&repo.name) {
            return Err(ProviderError::Api {
                provider: self.kind,
                status: 500,
                detail: "scripted failure".to_string(),
            });
        }
        self.opened
            .lock()
            .unwrap()
            .push((repo.name.clone(), new.clone()));
        let number = self.number_for(&repo.name);
        Ok(ChangeRequest {
            number,
            url: format!("https://example.com/{}/pull/{number}", repo.name),
        })
    }

    async fn change_request_status(
        &self,
        repo: &Repo,
        _number: u64,
    ) -> Result<ChangeRequestStatus, ProviderError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(&repo.name)
            .cloned()
            .unwrap_or(ChangeRequestStatus {
                state: ChangeRequestState::Open,
                approved: true,
                build: BuildStatus::Success,
            }))
    }

    async fn merge_change_request(
        &self,
        repo: &Repo,
        number: u64,
    ) -> Result<ChangeRequest, ProviderError> {
        self.merged.lock().unwrap().push(repo.name.clone());
        Ok(ChangeRequest {
            number,
            url: format!("https://example.com/{}/pull/{number}", repo.name),
        })
    }
}
