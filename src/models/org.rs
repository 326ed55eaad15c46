//! Organization and repository data structures.
//!
//! Wire-facing types (`SearchPage`, `SearchUser`, `OrgProfile`, `Repo`)
//! mirror the fields this crawler actually reads from the API; unknown
//! fields are ignored on deserialization. `Organization` is the enriched
//! entity that lands in the checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    /// Total matches for the whole query, not just this page
    pub total_count: u64,

    /// The hits on this page
    pub items: Vec<SearchUser>,
}

/// A bare search hit. Only the identity survives into enrichment.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchUser {
    pub login: String,
}

/// Full public profile of an organization.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: String,
    pub html_url: String,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub twitter_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub public_repos: u32,
}

/// A repository owned by an organization.
///
/// Count fields are optional on the wire; the aggregator treats absent
/// counts as zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repo {
    pub name: String,
    #[serde(default)]
    pub stargazers_count: Option<u64>,
    #[serde(default)]
    pub watchers_count: Option<u64>,
    #[serde(default)]
    pub forks_count: Option<u64>,
    #[serde(default)]
    pub open_issues_count: Option<u64>,
}

/// A repository paired with its fetched recent-activity count.
#[derive(Debug, Clone)]
pub struct RepoActivity {
    pub repo: Repo,
    pub recent_events: u64,
}

/// A fully enriched organization: profile fields plus aggregated
/// repository totals. Immutable once appended to the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    /// Stable identity; the dedup key across runs
    pub login: String,

    /// Display name, if set
    pub name: Option<String>,

    pub avatar_url: String,
    pub html_url: String,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub twitter_username: Option<String>,

    /// Account creation instant; drives the crawl's terminal condition
    pub created_at: DateTime<Utc>,

    /// Public repository count as reported by the profile
    pub public_repos: u32,

    /// Stars summed across owned repositories
    pub total_repo_stars: u64,

    /// Watchers summed across owned repositories
    pub total_repo_watchers: u64,

    /// Forks summed across owned repositories
    pub total_repo_forks: u64,

    /// Open issues summed across owned repositories
    pub total_repo_open_issues: u64,

    /// Recent events summed across owned repositories
    pub total_repo_recent_events: u64,
}

impl Organization {
    /// Dedup identity for the checkpoint's seen-set.
    pub fn key(&self) -> &str {
        &self.login
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_page_ignores_unknown_fields() {
        let page: SearchPage = serde_json::from_str(
            r#"{
                "total_count": 42,
                "incomplete_results": false,
                "items": [
                    {"login": "acme", "id": 1, "type": "Organization"},
                    {"login": "globex", "id": 2, "type": "Organization"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(page.total_count, 42);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].login, "acme");
    }

    #[test]
    fn profile_tolerates_null_fields() {
        let profile: OrgProfile = serde_json::from_str(
            r#"{
                "login": "acme",
                "name": null,
                "avatar_url": "https://example.com/a.png",
                "html_url": "https://example.com/acme",
                "blog": null,
                "location": "Recife",
                "email": null,
                "bio": null,
                "twitter_username": null,
                "created_at": "2014-03-01T12:00:00Z",
                "public_repos": 7
            }"#,
        )
        .unwrap();

        assert_eq!(profile.login, "acme");
        assert!(profile.name.is_none());
        assert_eq!(profile.location.as_deref(), Some("Recife"));
        assert_eq!(profile.public_repos, 7);
    }

    #[test]
    fn repo_defaults_missing_counts() {
        let repo: Repo = serde_json::from_str(r#"{"name": "widget"}"#).unwrap();
        assert_eq!(repo.name, "widget");
        assert!(repo.stargazers_count.is_none());
    }
}
