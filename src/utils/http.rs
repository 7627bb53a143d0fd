// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body as text, failing on non-success status codes.
///
/// Returns the final URL after redirects alongside the body.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<(String, String)> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::navigation(url, format!("HTTP {status}")));
    }
    let final_url = response.url().to_string();
    let body = response.text().await?;
    Ok((final_url, body))
}
