//! Service banner.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Handler for GET /
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        success: true,
        message: "Coffee Shop authorization gate",
    })
}
