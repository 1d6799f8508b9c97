//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (body, path params, headers)
//! 2. Delegates to the access gate or key store
//! 3. Returns a JSON response or an `AppError`

/// Service health endpoint
pub mod health;
/// API key issuance endpoint
pub mod keys;
/// Product search endpoints
pub mod search;
