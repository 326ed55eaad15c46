//! Local filesystem checkpoint store.
//!
//! One JSON file, rewritten atomically: the document is serialized in full,
//! written to a sibling `.tmp` file, flushed, then renamed over the real
//! path. A crash mid-save leaves the previous checkpoint intact.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{Checkpoint, CheckpointStore};

pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        self.ensure_parent().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Organization;
    use chrono::{NaiveDate, Utc};
    use tempfile::TempDir;

    fn org(login: &str) -> Organization {
        Organization {
            login: login.to_string(),
            name: None,
            avatar_url: format!("https://avatars.example/{login}"),
            html_url: format!("https://github.com/{login}"),
            blog: None,
            location: None,
            email: None,
            bio: None,
            twitter_username: None,
            created_at: Utc::now(),
            public_repos: 1,
            total_repo_stars: 0,
            total_repo_watchers: 0,
            total_repo_forks: 0,
            total_repo_open_issues: 0,
            total_repo_recent_events: 0,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn load_returns_none_before_first_save() {
        let tmp = TempDir::new().unwrap();
        let store = JsonCheckpointStore::new(tmp.path().join("result.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = JsonCheckpointStore::new(tmp.path().join("result.json"));

        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        checkpoint.append(org("acme"));
        checkpoint.advance_page();
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.page_cursor(), 2);
        assert_eq!(loaded.window_end(), date("2024-06-30"));
        assert_eq!(loaded.organizations(), checkpoint.organizations());
        // The seen index came back with the file.
        assert!(loaded.contains("acme"));
    }

    #[tokio::test]
    async fn save_replaces_and_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("result.json");
        let store = JsonCheckpointStore::new(&path);

        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        store.save(&checkpoint).await.unwrap();

        checkpoint.append(org("acme"));
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/result.json");
        let store = JsonCheckpointStore::new(&path);

        store.save(&Checkpoint::fresh(date("2024-06-30"))).await.unwrap();
        assert!(path.exists());
    }
}
