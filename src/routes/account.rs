use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::identity::{self, IdentityError, UserRecord};
use crate::state::SharedState;

use super::required;

#[derive(Deserialize)]
pub struct CustomTokenRequest {
    pub uid: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTokenResponse {
    pub success: bool,
    pub custom_token: String,
    pub expires_in: String,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: UserRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    pub custom_token: Option<String>,
}

pub async fn generate_custom_token(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CustomTokenRequest>,
) -> Result<Json<CustomTokenResponse>, AppError> {
    let uid = required(req.uid, "UID is required")?;
    auth.require_self(&uid)?;

    let custom_token = identity::bounded(
        state.config.provider_timeout,
        state.identity.create_custom_token(&uid),
    )
    .await
    .map_err(|e| AppError::internal(&state.config, "Failed to generate custom token", e))?;

    tracing::info!("Custom token generated for user {uid}");

    Ok(Json(CustomTokenResponse {
        success: true,
        custom_token,
        expires_in: "1h".to_string(),
    }))
}

pub async fn user_profile(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(uid): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    auth.require_self_or_admin(&uid)?;

    let user = identity::bounded(state.config.provider_timeout, state.identity.get_user(&uid))
        .await
        .map_err(|e| match e {
            IdentityError::UserNotFound => AppError::NotFound("User not found".to_string()),
            other => AppError::internal(&state.config, "Failed to fetch user profile", other),
        })?;

    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

/// Format-only acknowledgement; the token itself is checked by the provider client-side.
pub async fn validate_token(
    ApiJson(req): ApiJson<ValidateTokenRequest>,
) -> Result<Json<Value>, AppError> {
    required(req.custom_token, "Custom token is required")?;

    Ok(Json(json!({
        "success": true,
        "message": "Token format appears valid",
        "note": "Actual validation should be done by Firebase Auth on client side",
    })))
}
