//! API key authentication middleware.
//!
//! This middleware intercepts every gated request to:
//! 1. Extract the API key from the `X-API-Key` header
//! 2. Check it is a UUID v4 and belongs to an active key
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, models::api_key::ApiKey, state::AppState};

/// Header carrying the subscriber's credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers extract it with
/// `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The key as loaded during authentication, including its quota snapshot.
    pub api_key: ApiKey,
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Read the `X-API-Key` header
/// 2. Resolve it to an active key through the access gate
/// 3. If found: inject `AuthContext` into request, call next handler
/// 4. If not: return 401 with a message naming the failed check
///
/// # Headers
///
/// ```text
/// X-API-Key: 0f8fad5b-d9cb-469f-a165-70867728950e
/// ```
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // A header that is not valid ASCII counts as malformed, not missing
    let presented = match request.headers().get(API_KEY_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| AppError::MalformedApiKey)?),
        None => None,
    };

    let api_key = state.gate.authenticate(presented).await.map_err(|e| {
        tracing::debug!(error = %e, "API key rejected");
        e
    })?;

    request.extensions_mut().insert(AuthContext { api_key });

    Ok(next.run(request).await)
}
