use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::AppError;
use crate::identity::{self, IdentityError};
use crate::state::SharedState;

/// Caller identity proven by a bearer credential the identity provider accepted.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn require_self(&self, uid: &str) -> Result<(), AppError> {
        if self.uid == uid {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to request a custom token for this UID".to_string(),
            ))
        }
    }

    pub fn require_self_or_admin(&self, uid: &str) -> Result<(), AppError> {
        if self.uid == uid || self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Unauthorized("Missing or invalid authorization header".to_string())
                })?;

        let verified = identity::bounded(
            state.config.provider_timeout,
            state.identity.verify_id_token(bearer.token()),
        )
        .await
        .map_err(|e| match e {
            IdentityError::InvalidCredential(_) | IdentityError::UserNotFound => {
                tracing::warn!("Token verification failed: {e}");
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            other => AppError::internal(&state.config, "Failed to verify token", other),
        })?;

        Ok(AuthUser {
            uid: verified.uid,
            email: verified.email,
            is_admin: verified.admin,
        })
    }
}
