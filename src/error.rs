//! Error taxonomy for the load balancer, mapped to HTTP status codes at the router boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("upstream unreachable")]
    UpstreamUnreachable,

    #[error("no healthy servers available")]
    NoHealthyBackends,

    #[error("invalid key")]
    InvalidKey,

    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("metrics fetch failed: {0}")]
    MetricsFailed(String),

    #[error("rebuild failed: {0}")]
    RebuildFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for failures the control loop should treat as "use the default and keep going"
    /// rather than abort the current iteration.
    pub fn is_isolatable(&self) -> bool {
        matches!(
            self,
            Error::DiscoveryFailed(_) | Error::MetricsFailed(_) | Error::RebuildFailed(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::InvalidKey => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::NoHealthyBackends => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no healthy servers available".to_string(),
            ),
            Error::UpstreamUnreachable => {
                (StatusCode::BAD_GATEWAY, "upstream unreachable".to_string())
            }
            Error::RegistryUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            Error::RebuildFailed(_) | Error::Config(_) | Error::Http(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Error::DiscoveryFailed(_) | Error::MetricsFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
