//! Artifact storage: file-backed with an in-memory recent-first index
//!
//! One markdown file per artifact plus a JSON metadata sidecar. The sidecar
//! makes artifacts recoverable across restarts; the index keeps listing
//! cheap within a process.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Artifact;

pub struct ArtifactStore {
    root: PathBuf,
    /// Insertion-ordered; list() walks it in reverse so same-timestamp
    /// saves come back newest-insertion-first.
    index: RwLock<Vec<Artifact>>,
}

impl ArtifactStore {
    /// Open (and create) the store directory, rebuilding the index from
    /// metadata sidecars left by previous runs.
    pub async fn open(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let mut index = Vec::new();
        let mut entries = tokio::fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_meta.json"));
            if !is_meta {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(json) => match serde_json::from_str::<Artifact>(&json) {
                    Ok(artifact) => index.push(artifact),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable artifact metadata")
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable artifact metadata")
                }
            }
        }
        index.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(Self {
            root: root.to_path_buf(),
            index: RwLock::new(index),
        })
    }

    /// Persist the completed text of an execution under a fresh id.
    pub async fn save(&self, execution_id: &str, content: &str) -> Result<Artifact> {
        let artifact_id = format!("art_{}", &Uuid::new_v4().simple().to_string()[..12]);
        let created_at = Utc::now();
        let filename = format!(
            "{}_{}.md",
            artifact_id,
            created_at.format("%Y%m%d_%H%M%S")
        );

        tokio::fs::write(self.root.join(&filename), content).await?;

        let artifact = Artifact {
            artifact_id: artifact_id.clone(),
            execution_id: execution_id.to_string(),
            filename,
            content: content.to_string(),
            created_at,
            size_bytes: content.len() as u64,
        };

        let meta_path = self.root.join(format!("{artifact_id}_meta.json"));
        let json = serde_json::to_string_pretty(&artifact)
            .map_err(|e| Error::Storage(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        tokio::fs::write(&meta_path, json).await?;

        self.index.write().await.push(artifact.clone());
        Ok(artifact)
    }

    /// Look up an artifact by id, falling back to the on-disk sidecar for
    /// artifacts saved by a previous process.
    pub async fn get(&self, artifact_id: &str) -> Result<Artifact> {
        if let Some(found) = self
            .index
            .read()
            .await
            .iter()
            .find(|a| a.artifact_id == artifact_id)
        {
            return Ok(found.clone());
        }

        let meta_path = self.root.join(format!("{artifact_id}_meta.json"));
        match tokio::fs::read_to_string(&meta_path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|_| Error::NotFound(format!("artifact {artifact_id}"))),
            Err(_) => Err(Error::NotFound(format!("artifact {artifact_id}"))),
        }
    }

    /// Most-recent-first listing, bounded by `limit`. Ties on creation time
    /// resolve to reverse insertion order.
    pub async fn list(&self, limit: usize) -> Vec<Artifact> {
        let index = self.index.read().await;
        index.iter().rev().take(limit).cloned().collect()
    }
}
