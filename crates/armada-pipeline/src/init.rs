//! Init stage: resolve the target repository set.
//!
//! Two mutually exclusive inputs: a provider search query, or a repos file
//! with one "namespace/name" per line. Writes the workflow-wide init record;
//! re-running init overwrites it wholesale, resetting the workflow.

use std::path::PathBuf;

use armada_core::domain::InitOutput;
use armada_core::error::{ArmadaError, Result};
use armada_core::provider::RepoProvider;
use armada_state::{StageName, WorkflowStore, INIT_KEY};
use tracing::info;

pub struct InitInputs {
    pub query: Option<String>,
    pub repo_file: Option<PathBuf>,
}

/// Resolve the repository set and persist the init record.
///
/// The caller prints the resolved repo names; returning the output keeps
/// this testable without capturing stdout.
pub async fn run(
    store: &WorkflowStore,
    provider: &dyn RepoProvider,
    version: &str,
    inputs: InitInputs,
) -> Result<InitOutput> {
    let output = match (&inputs.query, &inputs.repo_file) {
        (Some(query), None) => {
            info!(query = %query, "resolving repos via provider search");
            let repos = provider.search(query).await?;
            InitOutput {
                version: version.to_string(),
                query: Some(query.clone()),
                repo_file: None,
                repos,
            }
        }
        (None, Some(file)) => {
            let names = read_repo_names(file)?;
            info!(file = %file.display(), count = names.len(), "resolving repos from file");
            let repos = provider.repos_from_names(&names).await?;
            InitOutput {
                version: version.to_string(),
                query: None,
                repo_file: Some(file.display().to_string()),
                repos,
            }
        }
        _ => {
            return Err(ArmadaError::Usage(
                "to init via search, pass a search query; otherwise specify a repos file \
                 with --file (exactly one of the two)"
                    .to_string(),
            ))
        }
    };

    store.write(INIT_KEY, StageName::Init, &output)?;
    info!(repos = output.repos.len(), "workflow initialized");
    Ok(output)
}

/// Parse a repos file: one "namespace/name" per line, blank lines and
/// `#` comments ignored.
fn read_repo_names(file: &PathBuf) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(file)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
