use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::Config;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    InvalidToken,
    ExpiredToken,
    UsedToken,
    WeakPassword,
    RateLimited { message: String, retry_after: u64 },
    Internal { message: String, details: Option<String> },
}

impl AppError {
    /// Build an internal error, attaching the underlying cause only when the
    /// configuration allows details to reach the client.
    pub fn internal(config: &Config, message: &str, cause: impl std::fmt::Display) -> Self {
        tracing::error!("{message}: {cause}");
        AppError::Internal {
            message: message.to_string(),
            details: config.expose_error_details().then(|| cause.to_string()),
        }
    }

    /// Stable machine-readable kind used as the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "Bad Request",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "Not Found",
            AppError::InvalidToken => "Invalid Token",
            AppError::ExpiredToken => "Expired Token",
            AppError::UsedToken => "Used Token",
            AppError::WeakPassword => "Weak Password",
            AppError::RateLimited { .. } => "Too Many Requests",
            AppError::Internal { .. } => "Internal Server Error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::InvalidToken
            | AppError::ExpiredToken
            | AppError::UsedToken
            | AppError::WeakPassword => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => msg,
            AppError::InvalidToken => "Reset token is invalid or expired",
            AppError::ExpiredToken => "Reset token has expired",
            AppError::UsedToken => "Reset token has already been used",
            AppError::WeakPassword => "Password must be at least 6 characters long",
            AppError::RateLimited { message, .. } => message,
            AppError::Internal { message, .. } => message,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.kind(),
            "message": self.message(),
        });

        if let AppError::Internal {
            details: Some(details),
            ..
        } = &self
        {
            body["details"] = json!(details);
        }

        let mut response = (status, axum::Json(body)).into_response();
        if let AppError::RateLimited { retry_after, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
