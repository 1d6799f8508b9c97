//! Access gate for the product search.
//!
//! # Flow
//!
//! 1. Authenticate: header present, UUID v4, active key exists
//! 2. Refuse keys whose quota is exhausted for the running window
//! 3. Decode the body, validate it, build the upstream request, fetch
//! 4. Charge one request, but only if the fetch returned items
//!
//! A charge that loses the race for a key's last unit withholds the data and
//! reports the quota error, so no key is ever served without being charged.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::{Uuid, Version};

use crate::{
    error::AppError,
    models::api_key::{ApiKey, QuotaState, hash_token},
    services::{
        fetch_client::{FetchOutcome, SearchClient},
        key_store::{KeyStore, QuotaOutcome},
        query_builder, validator,
    },
};

/// A charge re-runs at most once, after rolling an expired window over.
const CHARGE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct AccessGate {
    key_store: Arc<dyn KeyStore>,
    client: Arc<dyn SearchClient>,
}

impl AccessGate {
    pub fn new(key_store: Arc<dyn KeyStore>, client: Arc<dyn SearchClient>) -> Self {
        Self { key_store, client }
    }

    /// Resolve a presented credential to an active key.
    ///
    /// # Errors
    ///
    /// - `MissingApiKey`: nothing was presented
    /// - `MalformedApiKey`: not a UUID v4
    /// - `InvalidApiKey`: no active key with this token
    pub async fn authenticate(&self, presented: Option<&str>) -> Result<ApiKey, AppError> {
        let presented = presented
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AppError::MissingApiKey)?;

        let token = parse_uuid_v4(presented).ok_or(AppError::MalformedApiKey)?;

        self.key_store
            .find_active_by_hash(&hash_token(&token))
            .await?
            .ok_or(AppError::InvalidApiKey)
    }

    /// Reject keys that are exhausted and still inside their window.
    ///
    /// Exhausted keys whose window ended pass; the charge rolls their window over.
    pub fn check_quota(&self, api_key: &ApiKey, now: i64) -> Result<(), AppError> {
        match api_key.quota_state(now) {
            QuotaState::ExhaustedWaiting { resets_at } => {
                tracing::debug!(api_key_id = %api_key.id, resets_at, "Quota exhausted");
                Err(AppError::QuotaExceeded { resets_at })
            }
            QuotaState::Available | QuotaState::ExhaustedResettable => Ok(()),
        }
    }

    /// Validate a payload and run it against the upstream. Charges nothing.
    pub async fn search(&self, payload: &Value) -> Result<Vec<Value>, AppError> {
        let request = validator::validate(payload)?;
        let wire_request = query_builder::build(&request)?;

        match self.client.send(&wire_request).await {
            FetchOutcome::Success(items) => Ok(items),
            FetchOutcome::EmptySuccess => Err(AppError::NoItems),
            FetchOutcome::TransportError(detail) => Err(AppError::Transport(detail)),
            FetchOutcome::UpstreamError(detail) => Err(AppError::Upstream(detail)),
        }
    }

    /// Run a search on behalf of an authenticated key and charge it on success.
    pub async fn gated_search(&self, api_key: &ApiKey, body: &[u8]) -> Result<Vec<Value>, AppError> {
        self.check_quota(api_key, Utc::now().timestamp())?;

        let payload: Value = serde_json::from_slice(body).map_err(|_| AppError::MalformedBody)?;
        let items = self.search(&payload).await?;

        let requests_left = self.charge(api_key.id).await?;
        tracing::debug!(api_key_id = %api_key.id, requests_left, items = items.len(), "Search served");

        Ok(items)
    }

    /// Charge one request, rolling an expired window over first if needed.
    async fn charge(&self, id: Uuid) -> Result<i32, AppError> {
        for _ in 0..CHARGE_ATTEMPTS {
            match self.key_store.consume_one_request(id).await? {
                QuotaOutcome::Consumed { requests_left } => return Ok(requests_left),
                QuotaOutcome::WindowReset => continue,
                QuotaOutcome::Exceeded { resets_at } => {
                    return Err(AppError::QuotaExceeded { resets_at });
                }
            }
        }

        Err(AppError::Internal(format!(
            "quota window of key {} reset more than once in one charge",
            id
        )))
    }
}

/// Parse a credential and accept it only if it is a version 4 UUID.
fn parse_uuid_v4(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value)
        .ok()
        .filter(|uuid| uuid.get_version() == Some(Version::Random))
}
