//! HTTP middleware components.
//!
//! Middleware run before route handlers and short-circuit requests that
//! are not allowed through.

/// API key authentication middleware
pub mod auth;
/// Peer address allow-list for key issuance
pub mod origin;
