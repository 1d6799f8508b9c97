//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::models::api_key::SubscriptionType;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Longest accepted quota window. Keeps `now + window` far away from `i64::MAX`.
const MAX_QUOTA_WINDOW_DAYS: i64 = 36_500;

/// Error raised when the environment cannot be turned into a usable [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{name} must not be negative, got {value}")]
    NegativeQuota { name: &'static str, value: i32 },

    #[error("QUOTA_WINDOW_DAYS must be between 1 and {max}, got {0}", max = MAX_QUOTA_WINDOW_DAYS)]
    QuotaWindow(i64),
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `ADMIN_SECRET` (required): shared secret expected in the `Authorization` header of key issuance requests
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `ALLOWED_ORIGINS` (optional): comma separated peer IPs allowed to issue keys, defaults to `127.0.0.1`
/// - `UPSTREAM_URL` (optional): product search endpoint
/// - `UPSTREAM_TIMEOUT_SECS` (optional): outbound request timeout, defaults to 10
/// - `FREE_QUOTA`, `BASIC_QUOTA`, `PREMIUM_QUOTA` (optional): requests per window for each tier
/// - `QUOTA_WINDOW_DAYS` (optional): length of the quota window, defaults to 30
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub admin_secret: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<IpAddr>,

    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_free_quota")]
    pub free_quota: i32,

    #[serde(default = "default_basic_quota")]
    pub basic_quota: i32,

    #[serde(default = "default_premium_quota")]
    pub premium_quota: i32,

    #[serde(default = "default_quota_window_days")]
    pub quota_window_days: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_allowed_origins() -> Vec<IpAddr> {
    vec![IpAddr::from([127, 0, 0, 1])]
}

fn default_upstream_url() -> String {
    "https://app.idealo.de/app-backend/api".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_free_quota() -> i32 {
    1000
}

fn default_basic_quota() -> i32 {
    5000
}

fn default_premium_quota() -> i32 {
    10000
}

fn default_quota_window_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL, ADMIN_SECRET)
    /// - Environment variable values cannot be parsed into expected types
    /// - A tier quota is negative or the quota window is outside 1..=36500 days
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()?.validated()
    }

    /// Reject tier tables that would break `0 <= requests_left <= ceiling`
    /// or make exhausted keys resettable at once.
    pub fn validated(self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("FREE_QUOTA", self.free_quota),
            ("BASIC_QUOTA", self.basic_quota),
            ("PREMIUM_QUOTA", self.premium_quota),
        ] {
            if value < 0 {
                return Err(ConfigError::NegativeQuota { name, value });
            }
        }

        if !(1..=MAX_QUOTA_WINDOW_DAYS).contains(&self.quota_window_days) {
            return Err(ConfigError::QuotaWindow(self.quota_window_days));
        }

        Ok(self)
    }

    /// Quota rules derived from the tier table and window length.
    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            free: self.free_quota,
            basic: self.basic_quota,
            premium: self.premium_quota,
            window_seconds: self.quota_window_days * SECONDS_PER_DAY,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Tier ceilings and window length handed to the key store and the access gate.
///
/// Ceilings are read at reset time, so changing a tier's quota also changes
/// the ceiling that already issued keys reset to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub free: i32,
    pub basic: i32,
    pub premium: i32,
    pub window_seconds: i64,
}

impl QuotaPolicy {
    /// Maximum `requests_left` for a subscription tier.
    pub fn ceiling(&self, tier: SubscriptionType) -> i32 {
        match tier {
            SubscriptionType::Free => self.free,
            SubscriptionType::Basic => self.basic,
            SubscriptionType::Premium => self.premium,
        }
    }

    /// Epoch seconds at which a window opened at `now` may be rolled over.
    pub fn next_expiry(&self, now: i64) -> i64 {
        now + self.window_seconds
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            free: default_free_quota(),
            basic: default_basic_quota(),
            premium: default_premium_quota(),
            window_seconds: default_quota_window_days() * SECONDS_PER_DAY,
        }
    }
}
