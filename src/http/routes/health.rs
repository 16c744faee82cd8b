use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::http::HttpServerState;

/// GET /health
pub async fn health_handler(State(state): State<HttpServerState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "chart_cache_entries": state.stats_service.chart_cache().len(),
    }))
}
