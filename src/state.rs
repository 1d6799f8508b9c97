//! Shared application state handed to every handler and middleware.

use std::net::IpAddr;
use std::sync::Arc;

use crate::{
    config::Config,
    services::{access_gate::AccessGate, fetch_client::SearchClient, key_store::KeyStore},
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub gate: AccessGate,
    pub key_store: Arc<dyn KeyStore>,
    /// Expected value of the `Authorization` header on key issuance.
    pub admin_secret: Arc<str>,
    /// Peer addresses allowed to issue keys.
    pub allowed_origins: Arc<[IpAddr]>,
}

impl AppState {
    pub fn new(
        config: &Config,
        key_store: Arc<dyn KeyStore>,
        client: Arc<dyn SearchClient>,
    ) -> Self {
        Self {
            gate: AccessGate::new(key_store.clone(), client),
            key_store,
            admin_secret: Arc::from(config.admin_secret.as_str()),
            allowed_origins: Arc::from(config.allowed_origins.as_slice()),
        }
    }
}
