//! HTTP boundary. Handlers validate and translate; all real work lives in
//! the pipeline. Error kinds map to status codes here and nowhere else.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::core::error::AtlasError;
use crate::core::types::{
    parse_user_id, ApiSuccess, ConceptGroup, TextReference, TextsByConceptQuery, VectorizeRequest,
};
use crate::core::AppState;
use crate::pipeline;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/vectorize", post(vectorize_handler))
        .route("/api/texts-by-concept", get(texts_by_concept_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "concept-atlas",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn vectorize_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VectorizeRequest>,
) -> Result<Json<ApiSuccess<Vec<ConceptGroup>>>, AtlasError> {
    let (source, user_id, filename) = request.into_source()?;
    let groups = pipeline::vectorize(&state, source, user_id, filename)
        .await
        .inspect_err(|e| error!("vectorize failed: {e}"))?;
    Ok(Json(ApiSuccess::new(groups)))
}

pub async fn texts_by_concept_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TextsByConceptQuery>,
) -> Result<Json<ApiSuccess<Vec<TextReference>>>, AtlasError> {
    let user_id = parse_user_id(&query.user_id)?;
    let texts = pipeline::texts_by_concept(&state, user_id, &query.concept)
        .await
        .inspect_err(|e| error!("texts-by-concept failed: {e}"))?;
    Ok(Json(ApiSuccess::new(texts)))
}
