//! Data models representing database entities and API payloads.

/// API key authentication and quota model
pub mod api_key;
/// Product search request and response types
pub mod search;
