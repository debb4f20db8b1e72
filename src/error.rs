//! Errors raised at the backend boundary.
//!
//! Everything above the HTTP client works with `anyhow`; this enum exists so
//! the controller can tell a server-supplied `detail` apart from a transport
//! failure when it builds the message shown to the user.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status {
        url: String,
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid backend URL '{0}'")]
    InvalidUrl(String),

    #[error("cannot save '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Human-readable `detail` supplied by the server, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Pull a string `detail` out of an error body (`{"detail": "..."}`).
///
/// Validation errors carry a list under `detail`; those are not meant for end
/// users and are ignored.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|d| d.as_str())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_read_from_string_field_only() {
        assert_eq!(
            extract_detail(r#"{"detail":"Task not found"}"#).as_deref(),
            Some("Task not found")
        );
        assert_eq!(extract_detail(r#"{"detail":[{"loc":["body","input"]}]}"#), None);
        assert_eq!(extract_detail("<html>bad gateway</html>"), None);
        assert_eq!(extract_detail(r#"{"detail":"  "}"#), None);
    }

    #[test]
    fn status_error_message_includes_detail() {
        let err = ApiError::Status {
            url: "http://localhost:8000/process".into(),
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: Some("input is required".into()),
        };
        assert_eq!(err.detail(), Some("input is required"));
        assert!(err.to_string().ends_with(": input is required"));
    }
}
