use std::path::{Path, PathBuf};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::errors::ConclaveError;
use super::{Checkpoint, CheckpointBackend};

const MESSAGE_PREFIX: &str = "[checkpoint]";
const TAG_NAMESPACE: &str = "ckpt";

/// Snapshot store backed by a git repository: every checkpoint is a
/// commit (the commit id is the content address), named checkpoints are
/// lightweight tags under `ckpt/`.
pub struct GitCheckpointBackend {
    working_dir: PathBuf,
}

impl GitCheckpointBackend {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: working_dir.into() }
    }

    fn open_repo(&self) -> Result<git2::Repository, ConclaveError> {
        git2::Repository::open(&self.working_dir)
            .map_err(|_| ConclaveError::NotVersioned(self.working_dir.display().to_string()))
    }

    fn signature(repo: &git2::Repository) -> git2::Signature<'static> {
        repo.signature()
            .unwrap_or_else(|_| git2::Signature::now("conclave", "conclave@localhost").unwrap())
    }

    fn stage_all(repo: &git2::Repository) -> Result<git2::Oid, ConclaveError> {
        let mut index = repo.index()
            .map_err(|e| ConclaveError::Git(format!("Failed to get index: {}", e)))?;

        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| ConclaveError::Git(format!("Failed to add files: {}", e)))?;

        index.write()
            .map_err(|e| ConclaveError::Git(format!("Failed to write index: {}", e)))?;

        index.write_tree()
            .map_err(|e| ConclaveError::Git(format!("Failed to write tree: {}", e)))
    }

    fn checkpoint_from_commit(commit: &git2::Commit) -> Option<Checkpoint> {
        // Message format: "[checkpoint] <session>#<ordinal>: <label>"
        let message = commit.message()?;
        let rest = message.strip_prefix(MESSAGE_PREFIX)?.trim_start();
        let (head, label) = rest.split_once(": ")?;
        let (session_id, ordinal) = head.split_once('#')?;
        let ordinal: u32 = ordinal.parse().ok()?;

        let created_at = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)?;

        Some(Checkpoint {
            id: commit.id().to_string(),
            label: label.trim_end().to_string(),
            ordinal,
            session_id: session_id.to_string(),
            created_at,
        })
    }

    fn find_checkpoint_commit<'r>(
        repo: &'r git2::Repository,
        checkpoint_id: &str,
    ) -> Result<git2::Commit<'r>, ConclaveError> {
        let oid: git2::Oid = checkpoint_id
            .parse()
            .map_err(|_| ConclaveError::NotFound(format!("checkpoint {}", checkpoint_id)))?;
        repo.find_commit(oid)
            .map_err(|_| ConclaveError::NotFound(format!("checkpoint {}", checkpoint_id)))
    }

    /// Report uncommitted changes in the working tree. A checkpoint
    /// sweeps them up; a restore discards them.
    pub fn check_clean(working_dir: &Path) -> Option<String> {
        let repo = git2::Repository::open(working_dir).ok()?;
        let statuses = repo.statuses(None).ok()?;
        if statuses.is_empty() {
            None
        } else {
            Some(format!(
                "Working directory has {} uncommitted change(s)",
                statuses.len()
            ))
        }
    }
}

#[async_trait]
impl CheckpointBackend for GitCheckpointBackend {
    async fn checkpoint(
        &self,
        label: &str,
        ordinal: u32,
        session_id: &str,
    ) -> Result<Checkpoint, ConclaveError> {
        let repo = self.open_repo()?;
        let tree_oid = Self::stage_all(&repo)?;
        let tree = repo.find_tree(tree_oid)
            .map_err(|e| ConclaveError::Git(format!("Failed to find tree: {}", e)))?;

        let head = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let sig = Self::signature(&repo);
        let message = format!("{} {}#{}: {}", MESSAGE_PREFIX, session_id, ordinal, label);

        let parents: Vec<&git2::Commit> = head.iter().collect();
        let oid = repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)
            .map_err(|e| ConclaveError::Git(format!("Failed to create checkpoint: {}", e)))?;

        info!(session = %session_id, ordinal, label, id = %oid, "Checkpoint created");

        Ok(Checkpoint {
            id: oid.to_string(),
            label: label.to_string(),
            ordinal,
            session_id: session_id.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn restore(&self, checkpoint_id: &str) -> Result<Checkpoint, ConclaveError> {
        let repo = self.open_repo()?;
        let commit = Self::find_checkpoint_commit(&repo, checkpoint_id)?;

        let checkpoint = Self::checkpoint_from_commit(&commit).ok_or_else(|| {
            ConclaveError::NotFound(format!("{} is not a checkpoint commit", checkpoint_id))
        })?;

        repo.reset(commit.as_object(), git2::ResetType::Hard, None)
            .map_err(|e| ConclaveError::Git(format!("Failed to restore: {}", e)))?;

        warn!(id = %checkpoint_id, label = %checkpoint.label, "Working directory restored to checkpoint");
        Ok(checkpoint)
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>, ConclaveError> {
        let repo = self.open_repo()?;

        let mut walk = repo.revwalk()
            .map_err(|e| ConclaveError::Git(format!("Failed to walk history: {}", e)))?;
        if walk.push_head().is_err() {
            // Empty repository: no commits yet
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for oid in walk.flatten() {
            if let Ok(commit) = repo.find_commit(oid) {
                if let Some(cp) = Self::checkpoint_from_commit(&commit) {
                    if cp.session_id == session_id {
                        checkpoints.push(cp);
                    }
                }
            }
        }
        // Oldest first
        checkpoints.reverse();
        Ok(checkpoints)
    }

    async fn tag(&self, checkpoint_id: &str, name: &str) -> Result<(), ConclaveError> {
        let repo = self.open_repo()?;
        let commit = Self::find_checkpoint_commit(&repo, checkpoint_id)?;

        repo.tag_lightweight(
            &format!("{}/{}", TAG_NAMESPACE, name),
            commit.as_object(),
            true,
        ).map_err(|e| ConclaveError::Git(format!("Failed to tag checkpoint: {}", e)))?;

        info!(id = %checkpoint_id, name, "Checkpoint tagged");
        Ok(())
    }

    async fn get_by_tag(&self, name: &str) -> Result<Checkpoint, ConclaveError> {
        let repo = self.open_repo()?;
        let reference = repo
            .find_reference(&format!("refs/tags/{}/{}", TAG_NAMESPACE, name))
            .map_err(|_| ConclaveError::NotFound(format!("tag {}", name)))?;
        let commit = reference.peel_to_commit()
            .map_err(|e| ConclaveError::Git(format!("Tag does not point at a commit: {}", e)))?;

        Self::checkpoint_from_commit(&commit)
            .ok_or_else(|| ConclaveError::NotFound(format!("{} is not a checkpoint commit", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo(dir: &TempDir) -> PathBuf {
        let path = dir.path().to_path_buf();
        let repo = git2::Repository::init(&path).unwrap();
        // Baseline commit so HEAD exists
        std::fs::write(path.join("state.json"), "{}").unwrap();
        let mut index = repo.index().unwrap();
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = git2::Signature::now("test", "test@localhost").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_checkpoint_and_restore() {
        let dir = TempDir::new().unwrap();
        let path = init_repo(&dir);
        let backend = GitCheckpointBackend::new(&path);

        std::fs::write(path.join("state.json"), r#"{"step": 1}"#).unwrap();
        let cp = backend.checkpoint("after step 1", 1, "session-a").await.unwrap();
        assert_eq!(cp.label, "after step 1");
        assert_eq!(cp.ordinal, 1);

        std::fs::write(path.join("state.json"), r#"{"step": 2, "broken": true}"#).unwrap();
        let restored = backend.restore(&cp.id).await.unwrap();
        assert_eq!(restored.id, cp.id);

        let content = std::fs::read_to_string(path.join("state.json")).unwrap();
        assert_eq!(content, r#"{"step": 1}"#);
    }

    #[tokio::test]
    async fn test_not_versioned_directory() {
        let dir = TempDir::new().unwrap();
        let backend = GitCheckpointBackend::new(dir.path());

        let err = backend.checkpoint("x", 0, "s").await.unwrap_err();
        assert!(matches!(err, ConclaveError::NotVersioned(_)));

        let err = backend.list("s").await.unwrap_err();
        assert!(matches!(err, ConclaveError::NotVersioned(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_session() {
        let dir = TempDir::new().unwrap();
        let path = init_repo(&dir);
        let backend = GitCheckpointBackend::new(&path);

        backend.checkpoint("one", 1, "session-a").await.unwrap();
        backend.checkpoint("two", 2, "session-a").await.unwrap();
        backend.checkpoint("other", 1, "session-b").await.unwrap();

        let listed = backend.list("session-a").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].label, "one"); // oldest first
        assert_eq!(listed[1].label, "two");
    }

    #[tokio::test]
    async fn test_tag_and_lookup() {
        let dir = TempDir::new().unwrap();
        let path = init_repo(&dir);
        let backend = GitCheckpointBackend::new(&path);

        let cp = backend.checkpoint("stable", 3, "session-a").await.unwrap();
        backend.tag(&cp.id, "before-rollout").await.unwrap();

        let found = backend.get_by_tag("before-rollout").await.unwrap();
        assert_eq!(found.id, cp.id);
        assert_eq!(found.label, "stable");

        let err = backend.get_by_tag("missing").await.unwrap_err();
        assert!(matches!(err, ConclaveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_restore_unknown_id() {
        let dir = TempDir::new().unwrap();
        let path = init_repo(&dir);
        let backend = GitCheckpointBackend::new(&path);

        let err = backend.restore("deadbeef").await.unwrap_err();
        assert!(matches!(err, ConclaveError::NotFound(_)));
    }
}
