//! Peer address allow-list for administrative routes.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState};

/// Reject requests whose peer IP is not in `ALLOWED_ORIGINS` with HTTP 403.
///
/// Requires the server to be started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn allow_listed_origin(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = peer.ip().to_canonical();

    if !state.allowed_origins.contains(&ip) {
        tracing::warn!(peer = %ip, "Key issuance from non allow-listed origin");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
