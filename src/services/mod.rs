//! Service layer for the crawler application.
//!
//! This module contains the remote-facing machinery:
//! - Token pool with per-token rate-limit tracking (`TokenPool`)
//! - Rate-limit aware request dispatch (`Dispatcher`)
//! - GitHub REST client behind the `GithubApi` trait (`GithubClient`)

mod dispatch;
mod github;
mod tokens;

pub use dispatch::Dispatcher;
pub use github::{ApiResponse, CallError, CallResult, GithubApi, GithubClient, RateInfo, SearchOrder};
pub use tokens::TokenPool;
