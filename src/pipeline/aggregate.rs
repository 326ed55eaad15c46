// src/pipeline/aggregate.rs

//! Folds a profile and its repository activity into one census entity.

use crate::models::{Organization, OrgProfile, RepoActivity};

/// Combine a fetched profile with per-repository activity. Counts the API
/// omitted fold in as zero, so a sparse repository never poisons a total.
pub fn aggregate_organization(profile: OrgProfile, activity: &[RepoActivity]) -> Organization {
    let total_repo_stars = activity
        .iter()
        .map(|a| a.repo.stargazers_count.unwrap_or(0))
        .sum();
    let total_repo_watchers = activity
        .iter()
        .map(|a| a.repo.watchers_count.unwrap_or(0))
        .sum();
    let total_repo_forks = activity
        .iter()
        .map(|a| a.repo.forks_count.unwrap_or(0))
        .sum();
    let total_repo_open_issues = activity
        .iter()
        .map(|a| a.repo.open_issues_count.unwrap_or(0))
        .sum();
    let total_repo_recent_events = activity.iter().map(|a| a.recent_events).sum();

    Organization {
        login: profile.login,
        name: profile.name,
        avatar_url: profile.avatar_url,
        html_url: profile.html_url,
        blog: profile.blog,
        location: profile.location,
        email: profile.email,
        bio: profile.bio,
        twitter_username: profile.twitter_username,
        created_at: profile.created_at,
        public_repos: profile.public_repos,
        total_repo_stars,
        total_repo_watchers,
        total_repo_forks,
        total_repo_open_issues,
        total_repo_recent_events,
    }
}
