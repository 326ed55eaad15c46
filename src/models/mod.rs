// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod org;

// Re-export all public types
pub use config::{Config, CrawlerConfig, OutputConfig, SearchConfig};
pub use org::{OrgProfile, Organization, Repo, RepoActivity, SearchPage, SearchUser};
