//! API key storage and quota accounting.
//!
//! This service handles:
//! - Key issuance with unique email addresses
//! - Lookup of active keys by token
//! - Atomic quota charges and window roll-over
//!
//! # Atomicity Guarantees
//!
//! Quota charges lock the key row (`SELECT ... FOR UPDATE`) inside a PostgreSQL
//! transaction, so concurrent charges against one key are serialized and can never
//! push `requests_left` below zero or roll a window over twice.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::QuotaPolicy,
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, IssuedKey, QuotaState, SubscriptionType, generate_token},
};

/// Result of [`KeyStore::consume_one_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// One request was charged.
    Consumed { requests_left: i32 },
    /// The window was rolled over instead of charging; charge again.
    WindowReset,
    /// Nothing left until `resets_at` (epoch seconds).
    Exceeded { resets_at: i64 },
}

/// Owns API key records. The only writer of the `api_keys` table.
#[async_trait]
pub trait KeyStore: Send + Sync + std::fmt::Debug {
    /// Issue a key for `email`. Fails with `DuplicateEmail` if any key, active or not, uses it.
    async fn create(
        &self,
        email: &str,
        subscription_type: SubscriptionType,
    ) -> Result<IssuedKey, AppError>;

    /// Find the active key whose token hashes to `key_hash`.
    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError>;

    /// Charge one request against the key.
    ///
    /// - `requests_left > 0`: decrement, `Consumed`
    /// - exhausted and window over: refill to the tier ceiling, move expiry, `WindowReset`
    /// - exhausted and window running: `Exceeded`
    async fn consume_one_request(&self, id: Uuid) -> Result<QuotaOutcome, AppError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Decide what a charge does to a key in the given state. Shared by every store.
pub(crate) fn plan_charge(
    policy: &QuotaPolicy,
    tier: SubscriptionType,
    requests_left: i32,
    expiry: i64,
    now: i64,
) -> (QuotaOutcome, i32, i64) {
    match QuotaState::classify(requests_left, expiry, now) {
        QuotaState::Available => (
            QuotaOutcome::Consumed {
                requests_left: requests_left - 1,
            },
            requests_left - 1,
            expiry,
        ),
        QuotaState::ExhaustedResettable => (
            QuotaOutcome::WindowReset,
            policy.ceiling(tier),
            policy.next_expiry(now),
        ),
        QuotaState::ExhaustedWaiting { resets_at } => (
            QuotaOutcome::Exceeded { resets_at },
            requests_left,
            expiry,
        ),
    }
}

/// PostgreSQL-backed key store.
#[derive(Debug, Clone)]
pub struct PgKeyStore {
    pool: DbPool,
    policy: QuotaPolicy,
}

impl PgKeyStore {
    pub fn new(pool: DbPool, policy: QuotaPolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn create(
        &self,
        email: &str,
        subscription_type: SubscriptionType,
    ) -> Result<IssuedKey, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_keys WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            return Err(AppError::DuplicateEmail);
        }

        let (token, key_hash) = generate_token();
        let now = Utc::now().timestamp();

        let inserted = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (key_hash, email, subscription_type, requests_left, expiry)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, key_hash, email, subscription_type, is_active, requests_left, expiry
            "#,
        )
        .bind(&key_hash)
        .bind(email)
        .bind(subscription_type.as_str())
        .bind(self.policy.ceiling(subscription_type))
        .bind(self.policy.next_expiry(now))
        .fetch_one(&self.pool)
        .await;

        let api_key = match inserted {
            Ok(api_key) => api_key,
            // A concurrent issuance for the same email won the race
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        };

        let issued = IssuedKey { api_key, token };
        tracing::info!(
            api_key_id = %issued.api_key.id,
            subscription_type = %issued.api_key.subscription_type,
            "API key issued"
        );

        Ok(issued)
    }

    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let api_key = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, key_hash, email, subscription_type, is_active, requests_left, expiry
            FROM api_keys
            WHERE key_hash = $1 AND is_active = true
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(api_key)
    }

    async fn consume_one_request(&self, id: Uuid) -> Result<QuotaOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the key row; concurrent charges on this key wait here
        let api_key = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, key_hash, email, subscription_type, is_active, requests_left, expiry
            FROM api_keys
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::InvalidApiKey)?;

        let now = Utc::now().timestamp();
        let (outcome, requests_left, expiry) = plan_charge(
            &self.policy,
            api_key.subscription_type,
            api_key.requests_left,
            api_key.expiry,
            now,
        );

        if matches!(outcome, QuotaOutcome::Exceeded { .. }) {
            tx.rollback().await?;
            return Ok(outcome);
        }

        sqlx::query("UPDATE api_keys SET requests_left = $1, expiry = $2 WHERE id = $3")
            .bind(requests_left)
            .bind(expiry)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if outcome == QuotaOutcome::WindowReset {
            tracing::info!(api_key_id = %id, requests_left, "Quota window rolled over");
        }

        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
