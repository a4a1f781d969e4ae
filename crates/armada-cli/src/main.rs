//! Armada - fleet-wide git change automation.
//!
//! The `armada` command makes one scripted change across many repositories:
//!
//! - `init`: resolve the target repository set (search or file)
//! - `clone`: check out every repository
//! - `plan`: run the change command and commit the result
//! - `push`: push branches and open change requests
//! - `merge` / `status`: merge or inspect the change requests
//!
//! Progress is persisted per repository under the workflow directory, so any
//! stage can be re-run to retry its failures without redoing earlier stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use armada_core::domain::{InitOutput, StageRecord, StatusOutput};
use armada_core::{
    provider_from_config, ProviderConfig, RateLimiter, VersionGate, PROVIDER_REQUEST_INTERVAL,
};
use armada_pipeline::{
    run_clone, run_init, run_merge, run_plan, run_push, run_status, InitInputs, MergeOptions,
    PlanOptions, PushOptions, StageEnv, StageSummary,
};
use armada_state::{StageName, WorkflowStore, INIT_KEY};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "armada")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Armada makes git changes across many repos", long_about = None)]
struct Cli {
    /// Single repo to operate on (namespace/name)
    #[arg(short = 'r', long, global = true)]
    repo: Option<String>,

    /// Workflow directory holding persisted run state
    #[arg(long, global = true, default_value = "armada")]
    workdir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a workflow
    ///
    /// There are two ways to init, either from a file or via search.
    ///
    /// Init from file: `armada init -f repos.txt`, where repos.txt has one
    /// namespace/name per line.
    ///
    /// Init via search: `armada init "org:acme filename:ci.yml"`. On GitHub
    /// the query is code-search syntax. On gitlab.com it matches project
    /// names/paths; on a self-hosted GitLab (GITLAB_URL) it goes through the
    /// advanced search API.
    Init {
        /// Provider search query
        query: Option<String>,

        /// Get repos from a file instead of searching
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Clone all repos
    Clone {
        /// Number of repos processed in parallel
        #[arg(short, long, default_value_t = 10)]
        parallelism: usize,
    },

    /// Run the change command in each checkout and commit the result
    Plan {
        /// Git branch to commit to
        #[arg(short, long)]
        branch: String,

        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Number of repos processed in parallel
        #[arg(short, long, default_value_t = 10)]
        parallelism: usize,

        /// Change command, run with each scratch checkout as working directory
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Push branches and open change requests
    Push {
        /// Throttle pushes, e.g. '30s' means one push per 30 seconds
        #[arg(short, long, default_value = "30s", value_parser = humantime::parse_duration)]
        throttle: Duration,

        /// User to assign the change request to
        #[arg(short, long)]
        assignee: Option<String>,

        /// File with the change request body
        #[arg(short, long)]
        body_file: Option<PathBuf>,

        /// Number of repos processed in parallel
        #[arg(short, long, default_value_t = 10)]
        parallelism: usize,
    },

    /// Merge open change requests
    Merge {
        /// Throttle merges, e.g. '30s' means one merge per 30 seconds
        #[arg(short, long, default_value = "30s", value_parser = humantime::parse_duration)]
        throttle: Duration,

        /// Ignore whether or not the review has been approved
        #[arg(long)]
        ignore_review_approval: bool,

        /// Ignore whether or not builds are passing
        #[arg(long)]
        ignore_build_status: bool,

        /// Number of repos processed in parallel
        #[arg(short, long, default_value_t = 10)]
        parallelism: usize,
    },

    /// Show change request status for all repos
    Status {
        /// Number of repos processed in parallel
        #[arg(short, long, default_value_t = 10)]
        parallelism: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    armada_core::init_tracing(cli.json, cli.verbose);

    let version = env!("CARGO_PKG_VERSION");

    // Credentials are validated before any disk or network activity.
    let config = ProviderConfig::from_env()?;

    let workdir = resolve_workdir(&cli.workdir)?;
    let store = Arc::new(
        WorkflowStore::open(&workdir)
            .with_context(|| format!("failed to open workflow directory {}", workdir.display()))?,
    );

    // A workdir created by an incompatible armada version refuses every
    // command, init included.
    VersionGate::check(&store, version)?;

    let limiter = Arc::new(RateLimiter::new(PROVIDER_REQUEST_INTERVAL));
    let provider = provider_from_config(&config, Arc::clone(&limiter));

    let stage_env = |parallelism: usize| StageEnv {
        store: Arc::clone(&store),
        provider: Arc::clone(&provider),
        limiter: Arc::clone(&limiter),
        parallelism,
        repo_filter: cli.repo.clone(),
    };

    match cli.command {
        Commands::Init { query, file } => {
            let output = run_init(
                &store,
                provider.as_ref(),
                version,
                InitInputs {
                    query,
                    repo_file: file,
                },
            )
            .await?;
            for repo in &output.repos {
                println!("{}", repo.name);
            }
            Ok(())
        }

        Commands::Clone { parallelism } => finish(run_clone(&stage_env(parallelism)).await?),

        Commands::Plan {
            branch,
            message,
            parallelism,
            command,
        } => finish(
            run_plan(
                &stage_env(parallelism),
                PlanOptions {
                    branch,
                    message,
                    command,
                },
            )
            .await?,
        ),

        Commands::Push {
            throttle,
            assignee,
            body_file,
            parallelism,
        } => finish(
            run_push(
                &stage_env(parallelism),
                PushOptions {
                    throttle,
                    assignee,
                    body_file,
                },
            )
            .await?,
        ),

        Commands::Merge {
            throttle,
            ignore_review_approval,
            ignore_build_status,
            parallelism,
        } => finish(
            run_merge(
                &stage_env(parallelism),
                MergeOptions {
                    throttle,
                    ignore_review_approval,
                    ignore_build_status,
                },
            )
            .await?,
        ),

        Commands::Status { parallelism } => {
            let summary = run_status(&stage_env(parallelism)).await?;
            print_statuses(&store)?;
            finish(summary)
        }
    }
}

/// Resolve the workflow directory relative to the current directory.
fn resolve_workdir(workdir: &Path) -> Result<PathBuf> {
    if workdir.is_absolute() {
        Ok(workdir.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("failed to resolve current directory")?
            .join(workdir))
    }
}

/// Report a stage's aggregate outcome and decide the exit status.
///
/// Per-repository failures are reported but do not fail the command;
/// corrupt records do, since silently proceeding could skip repos that
/// should have been processed.
fn finish(summary: StageSummary) -> Result<()> {
    println!("{}", summary.render());
    if summary.has_corruption() {
        anyhow::bail!(
            "{} corrupt record(s); re-run the stage that produced them or remove the workflow directory",
            summary.corrupt.len()
        );
    }
    Ok(())
}

/// Print one status line per repo from the freshly written status records.
fn print_statuses(store: &WorkflowStore) -> Result<()> {
    let init: InitOutput = store.read(INIT_KEY, StageName::Init)?;
    for repo in &init.repos {
        let record: Option<StageRecord<StatusOutput>> =
            store.try_read(&repo.name, StageName::Status)?;
        match record {
            Some(StageRecord {
                success: true,
                output: Some(status),
                ..
            }) => {
                println!(
                    "{}: {:?} approved={} build={} {}",
                    repo.name, status.state, status.approved, status.build, status.url
                );
            }
            Some(record) => {
                println!(
                    "{}: status check failed: {}",
                    repo.name,
                    record.error.unwrap_or_else(|| "no detail".to_string())
                );
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_workdir_absolute_passthrough() {
        let abs = if cfg!(windows) {
            PathBuf::from(r"C:\work\armada")
        } else {
            PathBuf::from("/work/armada")
        };
        assert_eq!(resolve_workdir(&abs).unwrap(), abs);
    }

    #[test]
    fn test_resolve_workdir_relative_joins_cwd() {
        let resolved = resolve_workdir(Path::new("armada")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("armada"));
    }

    #[test]
    fn test_cli_parses_stage_commands() {
        let cli = Cli::try_parse_from([
            "armada", "plan", "-b", "update", "-m", "msg", "--", "sh", "-c", "true",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan {
                branch,
                message,
                command,
                ..
            } => {
                assert_eq!(branch, "update");
                assert_eq!(message, "msg");
                assert_eq!(command, vec!["sh", "-c", "true"]);
            }
            _ => panic!("expected plan"),
        }

        let cli = Cli::try_parse_from(["armada", "merge", "-t", "45s", "--ignore-build-status"])
            .unwrap();
        match cli.command {
            Commands::Merge {
                throttle,
                ignore_build_status,
                ignore_review_approval,
                ..
            } => {
                assert_eq!(throttle, Duration::from_secs(45));
                assert!(ignore_build_status);
                assert!(!ignore_review_approval);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn test_cli_repo_filter_is_global() {
        let cli = Cli::try_parse_from(["armada", "-r", "org/a", "status"]).unwrap();
        assert_eq!(cli.repo.as_deref(), Some("org/a"));
    }
}
