//! Filesystem-backed workflow record store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::stage::{StageName, INIT_KEY};
use crate::Result;

/// Durable key-value store for stage records, rooted at a workflow directory.
///
/// Keys are (repo name, stage name), plus the sentinel ("", init) for the
/// single workflow-wide init record. Values are JSON. Writes are atomic from
/// a reader's point of view; overwriting is silent and is the supported
/// re-run/recovery mechanism.
pub struct WorkflowStore {
    root: PathBuf,
}

impl WorkflowStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The workflow directory this store is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_key(repo: &str, stage: StageName) -> Result<()> {
        match stage {
            StageName::Init if repo != INIT_KEY => Err(StoreError::InvalidKey(format!(
                "the init record takes no repo name, got '{repo}'"
            ))),
            StageName::Init => Ok(()),
            _ if repo.is_empty() => Err(StoreError::InvalidKey(format!(
                "a {stage} record requires a repo name"
            ))),
            _ => Ok(()),
        }
    }

    /// Serialize `value` and store it at the path derived from (repo, stage).
    ///
    /// Creates missing intermediate directories and silently overwrites any
    /// prior record. The value is written to a temp file in the target
    /// directory and renamed into place, so a concurrent reader never
    /// observes a partially written file.
    pub fn write<T: Serialize>(&self, repo: &str, stage: StageName, value: &T) -> Result<()> {
        Self::check_key(repo, stage)?;
        let path = stage.record_path(&self.root, repo);

        let dir = path.parent().expect("record path always has parent");
        fs::create_dir_all(dir)?;

        let data = serde_json::to_vec_pretty(value)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        Ok(())
    }

    /// Read and deserialize the record for (repo, stage).
    ///
    /// Three-way outcome: `Ok` when present and valid, `StoreError::NotFound`
    /// when no record has been written yet, `StoreError::Corrupt` when a
    /// record exists but cannot be parsed.
    pub fn read<T: DeserializeOwned>(&self, repo: &str, stage: StageName) -> Result<T> {
        Self::check_key(repo, stage)?;
        let path = stage.record_path(&self.root, repo);

        let data = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    repo: repo.to_string(),
                    stage: stage.as_str().to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;

        serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
            stage: stage.as_str().to_string(),
            path,
            detail: e.to_string(),
        })
    }

    /// Like [`read`](Self::read), but maps the not-found case to `None`.
    ///
    /// Corruption still surfaces as an error.
    pub fn try_read<T: DeserializeOwned>(
        &self,
        repo: &str,
        stage: StageName,
    ) -> Result<Option<T>> {
        match self.read(repo, stage) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether a record exists for (repo, stage), without parsing it.
    pub fn contains(&self, repo: &str, stage: StageName) -> bool {
        stage.record_path(&self.root, repo).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        sha: String,
        ok: bool,
    }

    fn make_store() -> (tempfile::TempDir, WorkflowStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStore::open(dir.path().join("armada")).unwrap();
        (dir, store)
    }

    #[test]
    fn record_roundtrip() {
        let (_dir, store) = make_store();
        let value = Payload {
            sha: "abc123".to_string(),
            ok: true,
        };
        store.write("org/a", StageName::Clone, &value).unwrap();
        let got: Payload = store.read("org/a", StageName::Clone).unwrap();
        assert_eq!(got, value);
    }

    #[test]
    fn read_missing_returns_not_found() {
        let (_dir, store) = make_store();
        let err = store.read::<Payload>("org/a", StageName::Clone).unwrap_err();
        assert!(err.is_not_found(), "expected NotFound, got {err:?}");
    }

    #[test]
    fn try_read_missing_is_none() {
        let (_dir, store) = make_store();
        let got: Option<Payload> = store.try_read("org/a", StageName::Plan).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn corrupt_record_is_not_absence() {
        let (_dir, store) = make_store();
        let path = StageName::Clone.record_path(store.root(), "org/a");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{ not json").unwrap();

        let err = store.read::<Payload>("org/a", StageName::Clone).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {err:?}");

        // try_read must surface corruption too, never map it to None.
        let err = store
            .try_read::<Payload>("org/a", StageName::Clone)
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn overwrite_replaces_record() {
        let (_dir, store) = make_store();
        let first = Payload {
            sha: "old".to_string(),
            ok: false,
        };
        let second = Payload {
            sha: "new".to_string(),
            ok: true,
        };
        store.write("org/a", StageName::Push, &first).unwrap();
        store.write("org/a", StageName::Push, &second).unwrap();

        let got: Payload = store.read("org/a", StageName::Push).unwrap();
        assert_eq!(got, second);

        // Exactly one record file in the stage directory, no stale leftovers.
        let stage_dir = StageName::Push
            .record_path(store.root(), "org/a")
            .parent()
            .unwrap()
            .to_path_buf();
        let entries: Vec<_> = fs::read_dir(stage_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn init_record_lives_at_root() {
        let (_dir, store) = make_store();
        store
            .write(INIT_KEY, StageName::Init, &serde_json::json!({"version": "0.2.0"}))
            .unwrap();
        assert!(store.root().join("init.json").exists());
    }

    #[test]
    fn init_key_rejects_repo_name() {
        let (_dir, store) = make_store();
        let err = store
            .write("org/a", StageName::Init, &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn stage_key_requires_repo_name() {
        let (_dir, store) = make_store();
        let err = store
            .write(INIT_KEY, StageName::Clone, &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn records_partition_by_repo_and_stage() {
        let (_dir, store) = make_store();
        let a = Payload {
            sha: "a".to_string(),
            ok: true,
        };
        let b = Payload {
            sha: "b".to_string(),
            ok: true,
        };
        store.write("org/a", StageName::Clone, &a).unwrap();
        store.write("org/b", StageName::Clone, &b).unwrap();
        store.write("org/a", StageName::Plan, &b).unwrap();

        let got: Payload = store.read("org/a", StageName::Clone).unwrap();
        assert_eq!(got.sha, "a");
        let got: Payload = store.read("org/b", StageName::Clone).unwrap();
        assert_eq!(got.sha, "b");
        let got: Payload = store.read("org/a", StageName::Plan).unwrap();
        assert_eq!(got.sha, "b");
    }
}
