//! In-memory key store.
//!
//! Every mutation takes the single write lock, which gives the same per-key
//! linearizability as the row lock in [`PgKeyStore`](super::key_store::PgKeyStore).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::QuotaPolicy;
use crate::error::AppError;
use crate::models::api_key::{ApiKey, IssuedKey, SubscriptionType, generate_token};
use crate::services::key_store::{KeyStore, QuotaOutcome, plan_charge};

#[derive(Debug, Clone)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<HashMap<Uuid, ApiKey>>>,
    policy: QuotaPolicy,
}

impl InMemoryKeyStore {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    /// Store a key with an arbitrary quota state and return its raw token.
    pub async fn seed(
        &self,
        email: &str,
        subscription_type: SubscriptionType,
        requests_left: i32,
        expiry: i64,
        is_active: bool,
    ) -> (Uuid, ApiKey) {
        let (token, key_hash) = generate_token();
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            key_hash,
            email: email.to_string(),
            subscription_type,
            is_active,
            requests_left,
            expiry,
        };

        self.keys.write().await.insert(api_key.id, api_key.clone());
        (token, api_key)
    }

    pub async fn get(&self, id: Uuid) -> Option<ApiKey> {
        self.keys.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn create(
        &self,
        email: &str,
        subscription_type: SubscriptionType,
    ) -> Result<IssuedKey, AppError> {
        let mut keys = self.keys.write().await;

        if keys.values().any(|k| k.email == email) {
            return Err(AppError::DuplicateEmail);
        }

        let (token, key_hash) = generate_token();
        let now = Utc::now().timestamp();
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            key_hash,
            email: email.to_string(),
            subscription_type,
            is_active: true,
            requests_left: self.policy.ceiling(subscription_type),
            expiry: self.policy.next_expiry(now),
        };

        keys.insert(api_key.id, api_key.clone());
        Ok(IssuedKey { api_key, token })
    }

    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .find(|k| k.key_hash == key_hash && k.is_active)
            .cloned())
    }

    async fn consume_one_request(&self, id: Uuid) -> Result<QuotaOutcome, AppError> {
        let mut keys = self.keys.write().await;
        let api_key = keys.get_mut(&id).ok_or(AppError::InvalidApiKey)?;

        let (outcome, requests_left, expiry) = plan_charge(
            &self.policy,
            api_key.subscription_type,
            api_key.requests_left,
            api_key.expiry,
            Utc::now().timestamp(),
        );

        api_key.requests_left = requests_left;
        api_key.expiry = expiry;
        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::hash_token;

    fn store() -> InMemoryKeyStore {
        InMemoryKeyStore::new(QuotaPolicy::default())
    }

    #[tokio::test]
    async fn create_starts_at_tier_ceiling_with_thirty_day_window() {
        let store = store();
        let before = Utc::now().timestamp();

        let issued = store
            .create("a@example.com", SubscriptionType::Basic)
            .await
            .unwrap();

        assert_eq!(issued.api_key.requests_left, 5000);
        assert!(issued.api_key.is_active);
        assert!(issued.api_key.expiry >= before + 30 * 86_400);
        assert_eq!(issued.api_key.key_hash, hash_token(&issued.token));
        assert_eq!(issued.token.get_version_num(), 4);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_for_any_tier() {
        let store = store();
        store
            .create("dup@example.com", SubscriptionType::Free)
            .await
            .unwrap();

        for tier in [
            SubscriptionType::Free,
            SubscriptionType::Basic,
            SubscriptionType::Premium,
        ] {
            let result = store.create("dup@example.com", tier).await;
            assert!(matches!(result, Err(AppError::DuplicateEmail)));
        }
    }

    #[tokio::test]
    async fn duplicate_email_includes_inactive_keys() {
        let store = store();
        store
            .seed("gone@example.com", SubscriptionType::Free, 10, 0, false)
            .await;

        let result = store
            .create("gone@example.com", SubscriptionType::Premium)
            .await;
        assert!(matches!(result, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn lookup_skips_inactive_keys() {
        let store = store();
        let (active, _) = store
            .seed("on@example.com", SubscriptionType::Free, 10, 0, true)
            .await;
        let (inactive, _) = store
            .seed("off@example.com", SubscriptionType::Free, 10, 0, false)
            .await;

        assert!(
            store
                .find_active_by_hash(&hash_token(&active))
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .find_active_by_hash(&hash_token(&inactive))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn exhausted_key_waits_for_window() {
        let store = store();
        let expiry = Utc::now().timestamp() + 3600;
        let (_, key) = store
            .seed("w@example.com", SubscriptionType::Free, 0, expiry, true)
            .await;

        assert_eq!(
            store.consume_one_request(key.id).await.unwrap(),
            QuotaOutcome::Exceeded { resets_at: expiry }
        );
        assert_eq!(store.get(key.id).await.unwrap().requests_left, 0);
    }

    #[tokio::test]
    async fn expired_window_resets_then_charges() {
        let store = store();
        let (_, key) = store
            .seed("r@example.com", SubscriptionType::Free, 0, 1, true)
            .await;
        let now = Utc::now().timestamp();

        assert_eq!(
            store.consume_one_request(key.id).await.unwrap(),
            QuotaOutcome::WindowReset
        );
        assert_eq!(
            store.consume_one_request(key.id).await.unwrap(),
            QuotaOutcome::Consumed { requests_left: 999 }
        );

        let stored = store.get(key.id).await.unwrap();
        assert_eq!(stored.requests_left, 999);
        assert!(stored.expiry >= now + 30 * 86_400);
    }

    #[tokio::test]
    async fn concurrent_charges_take_the_last_unit_once() {
        let store = store();
        let expiry = Utc::now().timestamp() + 3600;
        let (_, key) = store
            .seed("c@example.com", SubscriptionType::Free, 1, expiry, true)
            .await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.consume_one_request(key.id).await.unwrap() })
            })
            .collect();

        let mut consumed = 0;
        for handle in handles {
            if let QuotaOutcome::Consumed { requests_left } = handle.await.unwrap() {
                assert_eq!(requests_left, 0);
                consumed += 1;
            }
        }

        assert_eq!(consumed, 1);
        assert_eq!(store.get(key.id).await.unwrap().requests_left, 0);
    }
}
