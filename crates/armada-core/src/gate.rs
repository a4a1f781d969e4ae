//! Workflow-directory version gate.
//!
//! A workflow directory carries the armada version that created it (inside
//! the init record). Record formats may drift between versions, so a
//! mismatched directory refuses every command until the operator either runs
//! the matching version or removes the directory.

use armada_state::{StageName, WorkflowStore, INIT_KEY};

use crate::domain::InitOutput;
use crate::error::{ArmadaError, Result};

pub struct VersionGate;

impl VersionGate {
    /// Check the workflow directory against the running version.
    ///
    /// - no init record yet: first run, proceed
    /// - recorded version equals `running_version`: proceed
    /// - otherwise: [`ArmadaError::VersionMismatch`]
    ///
    /// A corrupt init record surfaces as a storage error rather than being
    /// treated as a first run.
    pub fn check(store: &WorkflowStore, running_version: &str) -> Result<()> {
        match store.try_read::<InitOutput>(INIT_KEY, StageName::Init)? {
            None => Ok(()),
            Some(init) if init.version == running_version => Ok(()),
            Some(init) => Err(ArmadaError::VersionMismatch {
                workdir: store.root().to_path_buf(),
                recorded: init.version,
                running: running_version.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_version(version: &str) -> (tempfile::TempDir, WorkflowStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::open(dir.path().join("armada")).unwrap();
        let init = InitOutput {
            version: version.to_string(),
            query: None,
            repo_file: None,
            repos: vec![],
        };
        store.write(INIT_KEY, StageName::Init, &init).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_init_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::open(dir.path().join("armada")).unwrap();
        assert!(VersionGate::check(&store, "1.0.0").is_ok());
    }

    #[test]
    fn test_matching_version_proceeds() {
        let (_dir, store) = store_with_version("1.0.0");
        assert!(VersionGate::check(&store, "1.0.0").is_ok());
    }

    #[test]
    fn test_mismatch_is_fatal_and_names_versions() {
        let (_dir, store) = store_with_version("1.0.0");
        let err = VersionGate::check(&store, "1.1.0").unwrap_err();
        match err {
            ArmadaError::VersionMismatch {
                recorded, running, ..
            } => {
                assert_eq!(recorded, "1.0.0");
                assert_eq!(running, "1.1.0");
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_init_is_not_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::open(dir.path().join("armada")).unwrap();
        std::fs::write(store.root().join("init.json"), b"{ nope").unwrap();
        let err = VersionGate::check(&store, "1.0.0").unwrap_err();
        assert!(matches!(err, ArmadaError::Store(_)), "got {err:?}");
    }
}
