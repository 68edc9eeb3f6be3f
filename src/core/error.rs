use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Closed error taxonomy for the whole pipeline. Every stage maps its
/// failures into one of these kinds; HTTP status translation happens only at
/// the boundary (`IntoResponse`). Internal sources are logged, never
/// serialized.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("no concepts extracted: {0}")]
    NoConceptsExtracted(String),

    #[error("embedding dimension mismatch: {0}")]
    EmbeddingDimensionMismatch(String),

    #[error("url fetch failed: {0}")]
    UrlFetch(String),

    #[error("content extraction failed: {0}")]
    ContentExtraction(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model service error: {0}")]
    ModelService(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("request cancelled")]
    Cancelled,
}

impl AtlasError {
    /// Short machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            AtlasError::NoConceptsExtracted(_) => "NoConceptsExtracted",
            AtlasError::EmbeddingDimensionMismatch(_) => "EmbeddingDimensionMismatch",
            AtlasError::UrlFetch(_) => "UrlFetch",
            AtlasError::ContentExtraction(_) => "ContentExtraction",
            AtlasError::InvalidRequest(_) => "InvalidRequest",
            AtlasError::ModelService(_) => "ModelService",
            AtlasError::Storage(_) => "Storage",
            AtlasError::Cancelled => "Cancelled",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AtlasError::NoConceptsExtracted(_)
            | AtlasError::EmbeddingDimensionMismatch(_)
            | AtlasError::UrlFetch(_)
            | AtlasError::ContentExtraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AtlasError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AtlasError::ModelService(_) | AtlasError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            // Nginx convention for "client closed request".
            AtlasError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for AtlasError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
