pub mod auth;
pub mod client_ip;
pub mod config;
pub mod email;
pub mod error;
pub mod extract;
pub mod identity;
pub mod middleware;
pub mod rate_limit;
pub mod reset;
pub mod routes;
pub mod state;

use std::any::Any;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::email::ResetMailer;
use crate::identity::IdentityProvider;
use crate::middleware::rate_limit::limit_api;
use crate::rate_limit::ClientRateLimiter;
use crate::reset::flow::{ResetFlow, ResetSettings};
use crate::reset::store::MemoryTokenStore;
use crate::state::{AppState, SharedState};

pub fn build_app(
    config: Config,
    identity: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn ResetMailer>,
) -> (Router, SharedState) {
    let reset = ResetFlow::new(
        Arc::new(MemoryTokenStore::new()),
        identity.clone(),
        mailer,
        ResetSettings {
            token_ttl: config.reset_token_ttl,
            app_scheme: config.app_scheme.clone(),
            call_timeout: config.provider_timeout,
        },
    );

    let state: SharedState = Arc::new(AppState {
        api_limiter: Arc::new(ClientRateLimiter::new(
            config.rate_limit.api_max,
            config.rate_limit.window,
        )),
        reset_limiter: Arc::new(ClientRateLimiter::new(
            config.rate_limit.reset_max,
            config.rate_limit.window,
        )),
        identity,
        reset: Arc::new(reset),
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ));

    let app = Router::new()
        .merge(routes::api_routes(&state))
        .route("/health", axum::routing::get(routes::health::health))
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::not_found)
        .layer(axum::middleware::from_fn_with_state(state.clone(), limit_api))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(security_headers)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Unhandled error: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({
            "error": "Internal Server Error",
            "message": "Something went wrong!",
        })),
    )
        .into_response()
}
