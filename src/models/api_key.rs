//! API Key model for authentication and quota metering.
//!
//! API keys authenticate subscribers of the search API. They are stored in the database as SHA-256 hashes;
//! the raw token is only ever shown once, in the issuance response.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Subscription tier of an API key. Determines the quota ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Free,
    Basic,
    Premium,
}

impl SubscriptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::Free => "free",
            SubscriptionType::Basic => "basic",
            SubscriptionType::Premium => "premium",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored or requested tier name is not one of `free`, `basic`, `premium`.
#[derive(Debug, thiserror::Error)]
#[error("unknown subscription type '{0}'")]
pub struct UnknownSubscriptionType(pub String);

impl FromStr for SubscriptionType {
    type Err = UnknownSubscriptionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionType::Free),
            "basic" => Ok(SubscriptionType::Basic),
            "premium" => Ok(SubscriptionType::Premium),
            other => Err(UnknownSubscriptionType(other.to_string())),
        }
    }
}

impl TryFrom<String> for SubscriptionType {
    type Error = UnknownSubscriptionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `email`: Contact address, unique across active and inactive keys
/// - `subscription_type`: `free`, `basic` or `premium`
/// - `is_active`: Whether the key is currently valid
/// - `requests_left`: Requests remaining in the current quota window
/// - `expiry`: Epoch second at which the window may be rolled over
///
/// `created_at` is filled in by the database and is not loaded.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// SHA-256 hash of the token (64 hex characters)
    ///
    /// When a request comes in with `X-API-Key: <uuid>`, we:
    /// 1. Check the token is a UUID v4
    /// 2. Hash its hyphenated lowercase form
    /// 3. Look up this hash among active keys
    pub key_hash: String,

    pub email: String,

    #[sqlx(try_from = "String")]
    pub subscription_type: SubscriptionType,

    /// Inactive keys are rejected during authentication. Toggled by administrators only.
    pub is_active: bool,

    /// Never negative. Starts at the tier ceiling.
    pub requests_left: i32,

    pub expiry: i64,
}

/// Position of a key in its quota cycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaState {
    /// `requests_left > 0`
    Available,
    /// Exhausted and the window has not ended yet.
    ExhaustedWaiting { resets_at: i64 },
    /// Exhausted and the window has ended; the next charge rolls it over.
    ExhaustedResettable,
}

impl QuotaState {
    pub fn classify(requests_left: i32, expiry: i64, now: i64) -> Self {
        if requests_left > 0 {
            QuotaState::Available
        } else if now < expiry {
            QuotaState::ExhaustedWaiting { resets_at: expiry }
        } else {
            QuotaState::ExhaustedResettable
        }
    }
}

impl ApiKey {
    pub fn quota_state(&self, now: i64) -> QuotaState {
        QuotaState::classify(self.requests_left, self.expiry, now)
    }
}

/// Generate a fresh token. Returns the raw token and its stored hash.
pub fn generate_token() -> (Uuid, String) {
    let token = Uuid::new_v4();
    let hash = hash_token(&token);
    (token, hash)
}

/// SHA-256 of the hyphenated lowercase token, hex encoded.
pub fn hash_token(token: &Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.hyphenated().to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Request body for issuing a key.
///
/// # JSON Example
///
/// ```json
/// {
///   "email": "someone@example.com",
///   "subscriptionType": "basic"
/// }
/// ```
///
/// Both fields are optional at the decoding layer so that their absence is reported
/// with a dedicated message instead of a generic decoding failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub email: Option<String>,

    #[serde(alias = "subscription_type")]
    pub subscription_type: Option<String>,
}

/// Response body for a freshly issued key. This is the only time the raw token is returned.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyResponse {
    pub success: bool,
    pub processing_time_ms: f64,
    pub api_key: Uuid,
}

/// A newly created key together with its raw token.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub api_key: ApiKey,
    pub token: Uuid,
}
