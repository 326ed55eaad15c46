// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use crate::error::Result;
use crate::models::CrawlerConfig;

const API_MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Create the shared asynchronous HTTP client.
///
/// Every request carries the API media type and version headers;
/// authorization is attached per request with whichever token the
/// dispatcher selected.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(API_MEDIA_TYPE));
    headers.insert(
        "x-github-api-version",
        HeaderValue::from_static(API_VERSION),
    );

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()?;
    Ok(client)
}
