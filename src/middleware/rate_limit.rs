use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::client_ip;
use crate::error::AppError;
use crate::rate_limit::ClientRateLimiter;
use crate::state::SharedState;

/// Global limit for every request under `/api/`, routed or not.
pub async fn limit_api(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }
    enforce(
        &state,
        &state.api_limiter,
        "Too many requests from this IP, please try again later.",
        req,
        next,
    )
    .await
}

/// Stricter limit in front of password-reset emails.
pub async fn limit_password_reset(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    enforce(
        &state,
        &state.reset_limiter,
        "Too many password reset attempts, please try again later.",
        req,
        next,
    )
    .await
}

async fn enforce(
    state: &SharedState,
    limiter: &ClientRateLimiter,
    message: &str,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip::resolve(req.headers(), peer, &state.config.trusted_proxies);

    match limiter.check(ip) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!("Rate limited {ip} on {}", req.uri().path());
            AppError::RateLimited {
                message: message.to_string(),
                retry_after,
            }
            .into_response()
        }
    }
}
