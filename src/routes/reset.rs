use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::reset::flow::ResetError;
use crate::state::SharedState;

use super::required;

const RESET_SENT_MESSAGE: &str =
    "If an account with this email exists, a reset link has been sent";

#[derive(Deserialize)]
pub struct SendPasswordResetRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyResetTokenRequest {
    pub token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub email: String,
    pub message: String,
}

fn into_app_error(config: &Config, err: ResetError, context: &str) -> AppError {
    match err {
        ResetError::InvalidEmail => AppError::BadRequest("Invalid email format".to_string()),
        ResetError::InvalidToken => AppError::InvalidToken,
        ResetError::ExpiredToken => AppError::ExpiredToken,
        ResetError::UsedToken => AppError::UsedToken,
        ResetError::WeakPassword => AppError::WeakPassword,
        other @ (ResetError::Provider(_) | ResetError::Delivery(_)) => {
            AppError::internal(config, context, other)
        }
    }
}

pub async fn send_password_reset(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<SendPasswordResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = required(req.email, "Email is required")?;

    // Runs detached so a client disconnect cannot abandon a half-issued reset.
    let flow = state.reset.clone();
    tokio::spawn(async move { flow.request(&email).await })
        .await
        .map_err(|e| AppError::internal(&state.config, "Failed to send password reset email", e))?
        .map_err(|e| into_app_error(&state.config, e, "Failed to send password reset email"))?;

    Ok(Json(MessageResponse {
        success: true,
        message: RESET_SENT_MESSAGE.to_string(),
    }))
}

pub async fn verify_reset_token(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<VerifyResetTokenRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let token = required(req.token, "Reset token is required")?;

    let email = state
        .reset
        .verify(&token)
        .map_err(|e| into_app_error(&state.config, e, "Failed to verify reset token"))?;

    Ok(Json(VerifyResponse {
        success: true,
        email,
        message: "Token is valid".to_string(),
    }))
}

pub async fn reset_password(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let (token, new_password) = match (
        req.token.filter(|t| !t.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) {
        (Some(token), Some(password)) => (token, password),
        _ => {
            return Err(AppError::BadRequest(
                "Reset token and new password are required".to_string(),
            ));
        }
    };

    let flow = state.reset.clone();
    tokio::spawn(async move { flow.consume(&token, &new_password).await })
        .await
        .map_err(|e| AppError::internal(&state.config, "Failed to reset password", e))?
        .map_err(|e| into_app_error(&state.config, e, "Failed to reset password"))?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Password has been reset successfully".to_string(),
    }))
}
