//! Shared HTTP plumbing for retrievers and scrapers.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;

use crate::error::RetrieverError;
use crate::retry::RetryPolicy;

/// User agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("research-rs/", env!("CARGO_PKG_VERSION"));

/// Builds a client with the crate's user agent and the given timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, RetrieverError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| RetrieverError::Http(e.to_string()))
}

/// A failed fetch.
#[derive(Debug, Error)]
pub(crate) enum FetchError {
    /// Connection, timeout or body error.
    #[error("request failed: {0}")]
    Transport(String),
    /// Non-success status.
    #[error("HTTP {0}")]
    Status(u16),
}

impl FetchError {
    /// Rate limiting, server errors and transport failures are worth retrying.
    pub(crate) const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
        }
    }
}

/// Sends the request built by `build`, retrying transient failures.
pub(crate) async fn send_with_retry(
    policy: &RetryPolicy,
    label: &str,
    build: impl Fn() -> RequestBuilder,
) -> Result<Response, FetchError> {
    policy
        .run(label, FetchError::is_transient, || async {
            let response = build()
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                Err(FetchError::Status(status.as_u16()))
            }
        })
        .await
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase)
}

/// Fetches a URL as text, retrying transient failures.
pub(crate) async fn get_text(
    client: &Client,
    policy: &RetryPolicy,
    url: &str,
) -> Result<(String, Option<String>), FetchError> {
    let response = send_with_retry(policy, url, || client.get(url)).await?;
    let content_type = content_type(&response);
    let body = response
        .text()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    Ok((body, content_type))
}

/// Fetches a URL as raw bytes, retrying transient failures.
pub(crate) async fn get_bytes(
    client: &Client,
    policy: &RetryPolicy,
    url: &str,
) -> Result<(Vec<u8>, Option<String>), FetchError> {
    let response = send_with_retry(policy, url, || client.get(url)).await?;
    let content_type = content_type(&response);
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    Ok((body.to_vec(), content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(FetchError::Status(429), true)]
    #[test_case(FetchError::Status(503), true)]
    #[test_case(FetchError::Status(404), false)]
    #[test_case(FetchError::Status(401), false)]
    #[test_case(FetchError::Transport("reset".to_string()), true)]
    fn test_transient_classification(err: FetchError, expected: bool) {
        assert_eq!(err.is_transient(), expected);
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
