//! Checkpoint persistence for resumable crawls.
//!
//! The whole crawl state lives in one JSON document: the traversal cursor
//! plus every organization collected so far. The document is rewritten after
//! every appended entity and every cursor advance, so a crash or Ctrl-C
//! loses at most the entity currently in flight and a rerun picks up where
//! the file says.

pub mod local;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Organization;

pub use local::JsonCheckpointStore;

/// Resumable crawl state.
///
/// `window_end` is the inclusive end of the date window currently being
/// searched and only ever moves backwards in time; `page_cursor` is the
/// 1-based search page within that window. `seen` mirrors the logins in
/// `organizations` and is rebuilt whenever a checkpoint is deserialized,
/// so the two cannot drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CheckpointData")]
pub struct Checkpoint {
    page_cursor: u32,
    window_end: NaiveDate,
    organizations: Vec<Organization>,

    #[serde(skip)]
    seen: HashSet<String>,
}

/// Wire shape of a persisted checkpoint; converting into [`Checkpoint`]
/// restores the derived `seen` index and enforces the cursor bound.
#[derive(Deserialize)]
struct CheckpointData {
    page_cursor: u32,
    window_end: NaiveDate,
    organizations: Vec<Organization>,
}

impl TryFrom<CheckpointData> for Checkpoint {
    type Error = AppError;

    fn try_from(data: CheckpointData) -> Result<Self> {
        // Search pages are 1-based; a zero cursor would underflow the
        // scanned-result arithmetic on the first fetch.
        if data.page_cursor < 1 {
            return Err(AppError::validation(
                "checkpoint page_cursor must be at least 1",
            ));
        }
        let seen = data
            .organizations
            .iter()
            .map(|org| org.login.clone())
            .collect();
        Ok(Self {
            page_cursor: data.page_cursor,
            window_end: data.window_end,
            organizations: data.organizations,
            seen,
        })
    }
}

impl Checkpoint {
    /// Start a brand-new crawl whose first window ends at `window_end`.
    pub fn fresh(window_end: NaiveDate) -> Self {
        Self {
            page_cursor: 1,
            window_end,
            organizations: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn page_cursor(&self) -> u32 {
        self.page_cursor
    }

    pub fn window_end(&self) -> NaiveDate {
        self.window_end
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }

    /// Whether a login has already been collected in any window.
    pub fn contains(&self, login: &str) -> bool {
        self.seen.contains(login)
    }

    /// Record one collected organization. Appending a login that is already
    /// present is a no-op, so duplicates are structurally impossible.
    pub fn append(&mut self, org: Organization) {
        if self.seen.insert(org.login.clone()) {
            self.organizations.push(org);
        }
    }

    /// Move to the next search page inside the current window.
    pub fn advance_page(&mut self) {
        self.page_cursor += 1;
    }

    /// Slide the window back by `window_days` and restart paging at 1.
    pub fn advance_window(&mut self, window_days: u32) {
        self.window_end -= chrono::Duration::days(i64::from(window_days));
        self.page_cursor = 1;
    }
}

/// Trait for checkpoint storage backends.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the persisted checkpoint, or `None` when no crawl has run yet.
    async fn load(&self) -> Result<Option<Checkpoint>>;

    /// Durably replace the persisted checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn org(login: &str) -> Organization {
        Organization {
            login: login.to_string(),
            name: Some(login.to_uppercase()),
            avatar_url: format!("https://avatars.example/{login}"),
            html_url: format!("https://github.com/{login}"),
            blog: None,
            location: Some("Brazil".to_string()),
            email: None,
            bio: None,
            twitter_username: None,
            created_at: Utc::now(),
            public_repos: 2,
            total_repo_stars: 10,
            total_repo_watchers: 10,
            total_repo_forks: 1,
            total_repo_open_issues: 0,
            total_repo_recent_events: 3,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn fresh_checkpoint_starts_at_page_one() {
        let checkpoint = Checkpoint::fresh(date("2024-06-30"));
        assert_eq!(checkpoint.page_cursor(), 1);
        assert_eq!(checkpoint.window_end(), date("2024-06-30"));
        assert!(checkpoint.is_empty());
    }

    #[test]
    fn append_tracks_seen_logins() {
        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        checkpoint.append(org("acme"));

        assert!(checkpoint.contains("acme"));
        assert!(!checkpoint.contains("globex"));
        assert_eq!(checkpoint.len(), 1);
    }

    #[test]
    fn append_ignores_duplicate_logins() {
        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        checkpoint.append(org("acme"));
        checkpoint.append(org("acme"));

        assert_eq!(checkpoint.len(), 1);
    }

    #[test]
    fn advance_window_moves_back_and_resets_the_page() {
        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        checkpoint.advance_page();
        checkpoint.advance_page();
        assert_eq!(checkpoint.page_cursor(), 3);

        checkpoint.advance_window(7);
        assert_eq!(checkpoint.window_end(), date("2024-06-23"));
        assert_eq!(checkpoint.page_cursor(), 1);
    }

    #[test]
    fn deserializing_rebuilds_the_seen_index() {
        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        checkpoint.append(org("acme"));
        checkpoint.append(org("globex"));

        let json = serde_json::to_string(&checkpoint).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();

        assert!(restored.contains("acme"));
        assert!(restored.contains("globex"));
        assert_eq!(restored.organizations(), checkpoint.organizations());
    }

    #[test]
    fn deserialization_rejects_zero_page_cursor() {
        let result: std::result::Result<Checkpoint, _> = serde_json::from_str(
            r#"{"page_cursor": 0, "window_end": "2024-06-30", "organizations": []}"#,
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("page_cursor"));
    }

    #[test]
    fn persisted_shape_uses_plain_field_names() {
        let mut checkpoint = Checkpoint::fresh(date("2024-06-30"));
        checkpoint.append(org("acme"));

        let value: serde_json::Value =
            serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["page_cursor"], 1);
        assert_eq!(value["window_end"], "2024-06-30");
        assert_eq!(value["organizations"][0]["login"], "acme");
        // The derived index never reaches disk.
        assert!(value.get("seen").is_none());
    }
}
