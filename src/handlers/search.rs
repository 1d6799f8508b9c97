//! Product search HTTP handlers.
//!
//! This module implements the search endpoints:
//! - GET /api/v1/search/{region} - Public search with fixed sample filters
//! - POST /api/v1/search - Key-gated search with caller-supplied filters

use std::time::Instant;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::search::{SearchResponse, elapsed_ms, sample_payload},
    state::AppState,
};

/// Public search for a region using fixed sample filters.
///
/// # Endpoint
///
/// `GET /api/v1/search/{region}`
///
/// # Authentication
///
/// None. No key is required and no quota is charged.
///
/// # Response
///
/// - **Success (200 OK)**: items returned by the upstream
/// - **Error (400)**: unsupported region, or no items found
/// - **Error (500)**: upstream failure
pub async fn public_search(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Result<Json<SearchResponse>, AppError> {
    let started = Instant::now();

    let items = state.gate.search(&sample_payload(&region)).await?;

    Ok(Json(SearchResponse::new(elapsed_ms(started), items)))
}

/// Search on behalf of an API key.
///
/// # Endpoint
///
/// `POST /api/v1/search`
///
/// # Authentication
///
/// Requires a valid, active key in the `X-API-Key` header.
///
/// # Request Body
///
/// ```json
/// {
///   "limit": 10,
///   "minPrice": 10,
///   "maxPrice": 2000,
///   "includeCategories": ["3686"],
///   "sort": "RELEVANCE",
///   "region": "AT"
/// }
/// ```
///
/// The body is taken as raw bytes: the quota is checked before it is decoded.
///
/// # Response
///
/// - **Success (200 OK)**: items; one request is charged to the key
/// - **Error (400)**: invalid payload, or no items found
/// - **Error (415)**: body is not JSON
/// - **Error (429)**: quota exhausted until the reset time in the message
/// - **Error (500)**: upstream failure
pub async fn gated_search(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError> {
    let started = Instant::now();

    let items = state.gate.gated_search(&auth.api_key, &body).await?;

    Ok(Json(SearchResponse::new(elapsed_ms(started), items)))
}
