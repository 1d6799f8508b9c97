//! Business logic services.
//!
//! Services contain the core logic separated from HTTP handlers: payload
//! validation, upstream request construction and fetching, key storage and
//! the access gate that ties them together.

pub mod access_gate;
pub mod fetch_client;
pub mod key_store;
#[cfg(test)]
pub mod memory_key_store;
pub mod query_builder;
pub mod validator;
