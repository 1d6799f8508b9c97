//! API key issuance handler.
//!
//! - POST /api/v1/keys - Issue a key for an email address

use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::{
    error::AppError,
    models::{
        api_key::{CreateApiKeyRequest, CreateApiKeyResponse, SubscriptionType},
        search::elapsed_ms,
    },
    state::AppState,
};

type HmacSha256 = Hmac<Sha256>;

/// Issue a new API key.
///
/// # Endpoint
///
/// `POST /api/v1/keys`
///
/// # Authorization
///
/// - The peer address must be allow-listed (checked by middleware, 403 otherwise)
/// - The `Authorization` header must equal the shared admin secret (401 otherwise)
///
/// # Request Body
///
/// ```json
/// {
///   "email": "someone@example.com",
///   "subscriptionType": "free"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "success": true,
///   "processingTimeMs": 3.41,
///   "apiKey": "0f8fad5b-d9cb-469f-a165-70867728950e"
/// }
/// ```
///
/// The raw key is returned only here; the store keeps its hash.
pub async fn create_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreateApiKeyResponse>, AppError> {
    let started = Instant::now();

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !secret_matches(&state.admin_secret, presented) {
        return Err(AppError::Unauthorized);
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|_| AppError::MalformedBody)?;
    let request: CreateApiKeyRequest = serde_json::from_value(payload).map_err(|_| {
        AppError::InvalidRequest("email and subscriptionType must be strings".to_string())
    })?;

    let email = request
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Email is required!".to_string()))?;

    let subscription_type = request
        .subscription_type
        .filter(|tier| !tier.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Subscription type is required!".to_string()))?
        .parse::<SubscriptionType>()
        .map_err(|_| AppError::InvalidRequest("Subscription type is invalid!".to_string()))?;

    let issued = state.key_store.create(&email, subscription_type).await?;

    Ok(Json(CreateApiKeyResponse {
        success: true,
        processing_time_ms: elapsed_ms(started),
        api_key: issued.token,
    }))
}

/// Compare the presented secret with the expected one in constant time.
///
/// Both values are MACed under the expected secret, so the comparison time does
/// not depend on how much of the presented value matches.
fn secret_matches(expected: &str, presented: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let tag = |value: &str| {
        let mut mac = HmacSha256::new_from_slice(expected.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(value.as_bytes());
        mac
    };

    let expected_tag = tag(expected).finalize().into_bytes();
    tag(presented).verify_slice(&expected_tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_must_match_exactly() {
        assert!(secret_matches("s3cret", "s3cret"));
        assert!(!secret_matches("s3cret", "s3cre"));
        assert!(!secret_matches("s3cret", "s3cret "));
        assert!(!secret_matches("s3cret", ""));
    }

    #[test]
    fn empty_secret_never_matches() {
        assert!(!secret_matches("", ""));
    }
}
