// src/services/github.rs

//! GitHub REST API client.
//!
//! Every remote call goes through the [`GithubApi`] trait so the dispatcher
//! and controller can be exercised against scripted fakes. The real client
//! reduces each HTTP exchange to [`ApiResponse`] / [`CallError`] right here
//! at the transport boundary: rate-limit headers and the "access blocked"
//! body signal are extracted once, and nothing downstream ever inspects a
//! raw response.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::{OrgProfile, Repo, SearchPage};

const API_ROOT: &str = "https://api.github.com";

/// Body message the API uses to mark a permanently inaccessible repository.
const BLOCKED_MESSAGE: &str = "Repository access blocked";

/// Rate-limit metadata carried by every API response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateInfo {
    /// Requests left in the current window, if the header was present
    pub remaining: Option<u32>,

    /// Epoch seconds at which the window resets, if the header was present
    pub reset: Option<i64>,
}

/// A successful API attempt: payload plus rate metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub data: T,
    pub rate: RateInfo,
}

/// A failed API attempt, before the dispatcher classifies it.
///
/// The HTTP status, when the server answered at all, is baked into
/// `message`; classification only needs the rate headers and the block
/// signal.
#[derive(Debug)]
pub struct CallError {
    /// Rate headers from the error response
    pub rate: RateInfo,

    /// Machine-readable block reason when the resource is permanently gone
    pub block_reason: Option<String>,

    /// Human-readable context for logs and terminal errors
    pub message: String,
}

impl CallError {
    fn transport(path: &str, err: &reqwest::Error) -> Self {
        Self {
            rate: RateInfo::default(),
            block_reason: None,
            message: format!("GET {path}: {err}"),
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err.block_reason {
            Some(reason) => AppError::Blocked { reason },
            None => AppError::Api(err.message),
        }
    }
}

/// Result of one API attempt.
pub type CallResult<T> = Result<ApiResponse<T>, CallError>;

/// Sort order for entity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrder {
    /// Default relevance order
    BestMatch,

    /// Oldest account first; used once to find the crawl floor
    OldestFirst,
}

/// Abstract remote API surface.
///
/// `token` is always the credential chosen by the dispatcher for this
/// attempt; implementations must not rotate credentials themselves.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Fetch one page of the organization search.
    async fn search_orgs(
        &self,
        token: &str,
        query: &str,
        page: u32,
        per_page: u32,
        order: SearchOrder,
    ) -> CallResult<SearchPage>;

    /// Fetch the full public profile for a login.
    async fn get_profile(&self, token: &str, login: &str) -> CallResult<OrgProfile>;

    /// List the repositories owned by a login.
    async fn list_repos(&self, token: &str, login: &str) -> CallResult<Vec<Repo>>;

    /// Count recent events for one repository.
    async fn count_recent_events(&self, token: &str, owner: &str, repo: &str) -> CallResult<u64>;
}

/// Real API client over a shared reqwest [`Client`].
pub struct GithubClient {
    client: Client,
}

impl GithubClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> CallResult<T> {
        let url = format!("{API_ROOT}{path}");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| CallError::transport(path, &e))?;

        let rate = rate_from_headers(response.headers());
        let status = response.status();

        if status.is_success() {
            match response.json::<T>().await {
                Ok(data) => Ok(ApiResponse { data, rate }),
                Err(e) => Err(CallError {
                    rate,
                    block_reason: None,
                    message: format!("GET {path}: invalid response body: {e}"),
                }),
            }
        } else {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            Err(CallError {
                rate,
                block_reason: block_reason(&body),
                message: format!("GET {path} returned HTTP {status}: {}", body.message),
            })
        }
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn search_orgs(
        &self,
        token: &str,
        query: &str,
        page: u32,
        per_page: u32,
        order: SearchOrder,
    ) -> CallResult<SearchPage> {
        let mut params = vec![
            ("q", query.to_string()),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        if order == SearchOrder::OldestFirst {
            params.push(("sort", "joined".to_string()));
            params.push(("order", "asc".to_string()));
        }
        self.get_json(token, "/search/users", &params).await
    }

    async fn get_profile(&self, token: &str, login: &str) -> CallResult<OrgProfile> {
        self.get_json(token, &format!("/users/{login}"), &[]).await
    }

    async fn list_repos(&self, token: &str, login: &str) -> CallResult<Vec<Repo>> {
        self.get_json(
            token,
            &format!("/users/{login}/repos"),
            &[("per_page", "100".to_string())],
        )
        .await
    }

    async fn count_recent_events(&self, token: &str, owner: &str, repo: &str) -> CallResult<u64> {
        // The events feed covers roughly the last 90 days; the count is all
        // we keep, so the payload is never deserialized beyond an array.
        let response: ApiResponse<Vec<serde_json::Value>> = self
            .get_json(
                token,
                &format!("/repos/{owner}/{repo}/events"),
                &[("per_page", "100".to_string())],
            )
            .await?;

        Ok(ApiResponse {
            data: response.data.len() as u64,
            rate: response.rate,
        })
    }
}

/// Error body shape of a failed API response.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,

    #[serde(default)]
    block: Option<BlockInfo>,
}

#[derive(Debug, Deserialize)]
struct BlockInfo {
    #[serde(default)]
    reason: Option<String>,
}

fn block_reason(body: &ErrorBody) -> Option<String> {
    if body.message != BLOCKED_MESSAGE {
        return None;
    }
    Some(
        body.block
            .as_ref()
            .and_then(|b| b.reason.clone())
            .unwrap_or_else(|| "unspecified".to_string()),
    )
}

fn rate_from_headers(headers: &HeaderMap) -> RateInfo {
    RateInfo {
        remaining: header_number(headers, "x-ratelimit-remaining"),
        reset: header_number(headers, "x-ratelimit-reset"),
    }
}

fn header_number<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn rate_headers_parse_when_present() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_static("1756100000"),
        );

        let rate = rate_from_headers(&headers);
        assert_eq!(rate.remaining, Some(0));
        assert_eq!(rate.reset, Some(1_756_100_000));
    }

    #[test]
    fn rate_headers_absent_become_none() {
        let rate = rate_from_headers(&HeaderMap::new());
        assert!(rate.remaining.is_none());
        assert!(rate.reset.is_none());
    }

    #[test]
    fn rate_headers_garbage_become_none() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("soon"));

        let rate = rate_from_headers(&headers);
        assert!(rate.remaining.is_none());
    }

    #[test]
    fn block_reason_extracted_from_blocked_body() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"message": "Repository access blocked", "block": {"reason": "dmca"}}"#,
        )
        .unwrap();
        assert_eq!(block_reason(&body).as_deref(), Some("dmca"));
    }

    #[test]
    fn block_reason_defaults_when_reason_missing() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message": "Repository access blocked"}"#).unwrap();
        assert_eq!(block_reason(&body).as_deref(), Some("unspecified"));
    }

    #[test]
    fn ordinary_error_body_is_not_blocked() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message": "Validation Failed"}"#).unwrap();
        assert!(block_reason(&body).is_none());
    }

    #[test]
    fn call_error_maps_into_app_error() {
        let blocked = CallError {
            rate: RateInfo::default(),
            block_reason: Some("dmca".to_string()),
            message: "GET /repos/a/b/events returned HTTP 451".to_string(),
        };
        assert!(matches!(
            AppError::from(blocked),
            AppError::Blocked { ref reason } if reason == "dmca"
        ));

        let plain = CallError {
            rate: RateInfo::default(),
            block_reason: None,
            message: "GET /users/acme returned HTTP 500".to_string(),
        };
        assert!(matches!(AppError::from(plain), AppError::Api(_)));
    }
}
