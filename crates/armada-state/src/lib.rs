//! Armada-State: Workflow Persistence for Armada
//!
//! This crate provides the persistence layer for a workflow run. All state a
//! run ever produces lives under one workflow directory as plain JSON files,
//! keyed by (repository name, stage name).
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: durable per-repository records that survive process exits, so any
//! stage can be re-run or resumed without re-running its predecessors.
//!
//! ## Key Components
//!
//! - `WorkflowStore`: atomic write / three-way read of stage records
//! - `StageName`: the fixed stage vocabulary and record path layout

mod error;
mod stage;
mod store;

pub use error::StoreError;
pub use stage::{StageName, INIT_KEY};
pub use store::WorkflowStore;

/// Result type for armada-state operations
pub type Result<T> = std::result::Result<T, StoreError>;
