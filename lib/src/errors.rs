//! Error type shared by the upstream client, the graph pipeline and the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::warn;

#[derive(thiserror::Error, Debug)]
pub enum CatalogueError {
    #[error("Not found upstream: {0}")]
    UpstreamNotFound(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),
    #[error("Malformed upstream data: {0}")]
    UpstreamData(String),
    #[error("Bad request: {0}")]
    Validation(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to serialize graph: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T, E = CatalogueError> = std::result::Result<T, E>;

impl CatalogueError {
    pub fn status(&self) -> StatusCode {
        match self {
            CatalogueError::UpstreamNotFound(_) => StatusCode::NOT_FOUND,
            CatalogueError::UpstreamUnavailable(_) | CatalogueError::UpstreamData(_) => {
                StatusCode::BAD_GATEWAY
            }
            CatalogueError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CatalogueError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogueError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            CatalogueError::Serialization(_) | CatalogueError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for CatalogueError {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "upstream".to_string());
        if err.is_timeout() {
            CatalogueError::UpstreamTimeout(target)
        } else if err.is_decode() {
            CatalogueError::UpstreamData(format!("{target}: {err}"))
        } else {
            CatalogueError::UpstreamUnavailable(format!("{target}: {err}"))
        }
    }
}

impl From<oxigraph::io::RdfParseError> for CatalogueError {
    fn from(err: oxigraph::io::RdfParseError) -> Self {
        CatalogueError::UpstreamData(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogueError {
    fn from(err: serde_json::Error) -> Self {
        CatalogueError::UpstreamData(err.to_string())
    }
}

impl IntoResponse for CatalogueError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("{self}");
        }
        (status, self.to_string()).into_response()
    }
}
