//! Shared plumbing for the HTTP-backed providers.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{RagError, Result};

/// Build a client whose every request is bounded by `timeout`.
pub(crate) fn build_client(
    timeout: Duration,
    headers: &[(String, String)],
) -> Result<reqwest::Client> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RagError::ConfigError(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RagError::ConfigError(format!("invalid value for header '{name}': {e}")))?;
        default_headers.insert(name, value);
    }

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(default_headers)
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Describe a failed send, distinguishing the client-side timeout.
pub(crate) fn describe_send_error(e: &reqwest::Error) -> String {
    if e.is_timeout() { format!("request timed out: {e}") } else { format!("request failed: {e}") }
}
