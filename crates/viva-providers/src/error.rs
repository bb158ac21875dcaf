//! Provider and configuration error types.

use thiserror::Error;

pub use viva_core::error::ProviderError;

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Errors raised while turning configuration into a provider.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested provider has no entry in the configuration.
    #[error("provider '{0}' is not configured (add it to viva.toml or set its VIVA_*_KEY variable)")]
    UnknownProvider(String),

    /// The provider entry exists but its API key is empty.
    #[error("no API key for provider '{0}'")]
    MissingApiKey(String),
}

/// Map a transport failure to a [`ProviderError`].
pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(e.to_string())
    }
}

/// Turn a non-success HTTP response into a [`ProviderError`].
///
/// Returns the response unchanged when the status is below 400.
/// `extract_message` pulls a readable message out of a provider-specific
/// error body, falling back to the raw body.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
    extract_message: fn(&str) -> Option<String>,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after_secs * 1000,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or(body);
    Err(match status {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError { status, message },
    })
}
