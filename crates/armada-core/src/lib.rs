//! Armada Core - domain model and provider integration.
//!
//! Armada fans a scripted change out across many repositories. This crate
//! holds everything the stage pipeline builds on:
//!
//! - the domain model (repositories, per-stage records, change requests)
//! - the hosting-provider abstraction and its GitHub/GitLab backends
//! - the global request pacer shared by every provider call
//! - the workflow-directory version gate
//! - git subprocess helpers

pub mod config;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod git;
pub mod limiter;
pub mod provider;
pub mod telemetry;

pub use config::ProviderConfig;
pub use domain::{
    BuildStatus, ChangeRequest, ChangeRequestState, ChangeRequestStatus, CloneOutput, InitOutput,
    MergeOutput, NewChangeRequest, PlanOutput, ProviderKind, PushOutput, Repo, StageRecord,
    StatusOutput,
};
pub use error::{ArmadaError, ConfigError, ProviderError, Result};
pub use gate::VersionGate;
pub use limiter::{RateLimiter, PROVIDER_REQUEST_INTERVAL};
pub use provider::{provider_from_config, RepoProvider};
pub use telemetry::init_tracing;
