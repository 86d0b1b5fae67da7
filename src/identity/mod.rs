pub mod firebase;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Identity decoded from a verified bearer credential.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub admin: bool,
}

/// Account as held by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub email_verified: bool,
    pub creation_time: Option<String>,
    pub last_sign_in_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityError {
    UserNotFound,
    InvalidCredential(String),
    Timeout,
    Upstream(String),
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::UserNotFound => write!(f, "user not found"),
            IdentityError::InvalidCredential(msg) => write!(f, "invalid credential: {msg}"),
            IdentityError::Timeout => write!(f, "identity provider timed out"),
            IdentityError::Upstream(msg) => write!(f, "identity provider error: {msg}"),
        }
    }
}

impl std::error::Error for IdentityError {}

/// The narrow slice of the identity provider this service depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;

    async fn get_user(&self, uid: &str) -> Result<UserRecord, IdentityError>;

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, IdentityError>;

    /// Mint a sign-in token the client exchanges with the provider directly.
    async fn create_custom_token(&self, uid: &str) -> Result<String, IdentityError>;

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), IdentityError>;
}

/// Run a provider call, failing with `IdentityError::Timeout` once `limit` elapses.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, IdentityError>
where
    F: Future<Output = Result<T, IdentityError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(IdentityError::Timeout))
}
