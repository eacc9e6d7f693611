use crate::models::{ErrorBody, ErrorResponse};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures reported by an upstream provider client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Unavailable("request timed out".to_string())
        } else if err.is_decode() {
            UpstreamError::MalformedResponse(err.to_string())
        } else {
            UpstreamError::Unavailable(err.without_url().to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::MalformedResponse(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Error taxonomy surfaced to callers of the query service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    UpstreamRateLimited(String),

    #[error("{0}")]
    UpstreamMalformedResponse(String),

    #[error("{0}")]
    CacheUnavailable(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::UpstreamUnavailable(_) => "upstream_unavailable",
            ApiError::UpstreamRateLimited(_) => "upstream_rate_limited",
            ApiError::UpstreamMalformedResponse(_) => "upstream_malformed_response",
            ApiError::CacheUnavailable(_) => "cache_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamMalformedResponse(_) => StatusCode::BAD_GATEWAY,
            ApiError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// Messages stay generic: upstream detail goes to the log, not the caller.
impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unavailable(_) => {
                ApiError::UpstreamUnavailable("music provider is unavailable".to_string())
            }
            UpstreamError::RateLimited(_) => {
                ApiError::UpstreamRateLimited("music provider quota exhausted".to_string())
            }
            UpstreamError::MalformedResponse(_) => ApiError::UpstreamMalformedResponse(
                "music provider returned an unexpected response".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
