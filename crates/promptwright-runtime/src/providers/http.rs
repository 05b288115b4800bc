//! HTTP helpers shared by the reference adapters.
//!
//! Status classification is always compiled so that adapters written
//! outside this crate map HTTP failures the same way.

use std::time::Duration;

use super::ProviderError;

/// Map an unsuccessful HTTP status to a [`ProviderError`].
///
/// `retry_after` is only used for 429 responses.
pub fn classify_status(
    status: u16,
    retry_after: Option<Duration>,
    message: impl Into<String>,
) -> ProviderError {
    let message = message.into();
    match status {
        401 | 403 => ProviderError::Authentication(message),
        404 => ProviderError::ModelNotFound(message),
        429 => ProviderError::RateLimited { retry_after },
        408 | 504 => ProviderError::Timeout(format!("HTTP {status}: {message}")),
        400..=499 if mentions_missing_model(&message) => ProviderError::ModelNotFound(message),
        400..=499 => ProviderError::InvalidRequest(message),
        _ => ProviderError::Network(format!("HTTP {status}: {message}")),
    }
}

/// Parse a `retry-after` header value given in (possibly fractional) seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

// Some backends answer 400 instead of 404 for an unknown model.
fn mentions_missing_model(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("model")
        && (lower.contains("not found") || lower.contains("does not exist"))
}

#[cfg(any(feature = "anthropic", feature = "openai"))]
pub(crate) use transport::*;

#[cfg(any(feature = "anthropic", feature = "openai"))]
mod transport {
    use std::time::Duration;

    use eventsource_stream::{Event, Eventsource};
    use futures::{Stream, StreamExt};

    use super::{classify_status, parse_retry_after};
    use crate::providers::ProviderError;

    /// Normalise a transport-level failure.
    pub(crate) fn map_transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(format!("no response within {timeout:?}"))
        } else if error.is_decode() {
            ProviderError::Network(format!("Malformed response body: {error}"))
        } else {
            ProviderError::Network(error.to_string())
        }
    }

    /// Turn a non-success response into a [`ProviderError`], reading the
    /// vendor's error message from the body when there is one.
    pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);

        classify_status(status, retry_after, message)
    }

    /// Decode a response body as server-sent events.
    pub(crate) fn sse_events(
        response: reqwest::Response,
    ) -> impl Stream<Item = Result<Event, ProviderError>> + Send {
        response
            .bytes_stream()
            .eventsource()
            .map(|event| event.map_err(|e| ProviderError::Network(format!("SSE stream error: {e}"))))
    }
}
