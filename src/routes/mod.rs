pub mod account;
pub mod health;
pub mod reset;

use axum::Router;
use axum::http::Uri;
use axum::routing::{get, post};

use crate::error::AppError;
use crate::middleware::rate_limit::limit_password_reset;
use crate::state::SharedState;

pub fn api_routes(state: &SharedState) -> Router<SharedState> {
    Router::new()
        // Password reset
        .route(
            "/api/sendPasswordReset",
            post(reset::send_password_reset).layer(axum::middleware::from_fn_with_state(
                state.clone(),
                limit_password_reset,
            )),
        )
        .route("/api/verifyResetToken", post(reset::verify_reset_token))
        .route("/api/resetPassword", post(reset::reset_password))
        // Account switching
        .route("/api/generateCustomToken", post(account::generate_custom_token))
        .route("/api/userProfile/{uid}", get(account::user_profile))
        .route("/api/validateToken", post(account::validate_token))
}

pub async fn not_found(uri: Uri) -> AppError {
    tracing::debug!("No route for {uri}");
    AppError::NotFound("Endpoint not found".to_string())
}

/// Treat absent and empty string fields alike.
pub(crate) fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}
