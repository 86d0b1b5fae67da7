use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;

use crate::email::ResetMailer;
use crate::identity::{self, IdentityError, IdentityProvider};

use super::store::{ResetToken, TokenRejection, TokenStore, generate_token, token_key};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum ResetError {
    InvalidEmail,
    InvalidToken,
    ExpiredToken,
    UsedToken,
    WeakPassword,
    Provider(IdentityError),
    Delivery(String),
}

impl std::fmt::Display for ResetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetError::InvalidEmail => write!(f, "invalid email format"),
            ResetError::InvalidToken => write!(f, "reset token is invalid"),
            ResetError::ExpiredToken => write!(f, "reset token has expired"),
            ResetError::UsedToken => write!(f, "reset token has already been used"),
            ResetError::WeakPassword => {
                write!(f, "password must be at least {MIN_PASSWORD_LEN} characters")
            }
            ResetError::Provider(e) => write!(f, "{e}"),
            ResetError::Delivery(msg) => write!(f, "email delivery failed: {msg}"),
        }
    }
}

impl From<TokenRejection> for ResetError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Invalid => ResetError::InvalidToken,
            TokenRejection::Expired => ResetError::ExpiredToken,
            TokenRejection::Used => ResetError::UsedToken,
        }
    }
}

impl From<IdentityError> for ResetError {
    fn from(err: IdentityError) -> Self {
        ResetError::Provider(err)
    }
}

#[derive(Debug, Clone)]
pub struct ResetSettings {
    pub token_ttl: Duration,
    pub app_scheme: String,
    pub call_timeout: Duration,
}

/// Issues, verifies and consumes password-reset tokens.
pub struct ResetFlow {
    store: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn ResetMailer>,
    settings: ResetSettings,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

impl ResetFlow {
    pub fn new(
        store: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn ResetMailer>,
        settings: ResetSettings,
    ) -> Self {
        Self {
            store,
            identity,
            mailer,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Issue a token and mail its deep link. Unknown accounts succeed silently
    /// so the caller cannot learn whether an address is registered.
    pub async fn request(&self, email: &str) -> Result<(), ResetError> {
        if !is_valid_email(email) {
            return Err(ResetError::InvalidEmail);
        }

        let user = match identity::bounded(
            self.settings.call_timeout,
            self.identity.get_user_by_email(email),
        )
        .await
        {
            Ok(user) => user,
            Err(IdentityError::UserNotFound) => {
                tracing::debug!("Password reset requested for unknown account");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let token = generate_token();
        let ttl = chrono::Duration::from_std(self.settings.token_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        self.store.put(
            token_key(&token),
            ResetToken::new(email.to_string(), user.uid.clone(), Utc::now() + ttl),
        );

        let deep_link = format!(
            "{}://forgot-password?token={token}",
            self.settings.app_scheme
        );
        let minutes = self.settings.token_ttl.as_secs().div_ceil(60);

        // A failed delivery leaves the stored token in place.
        tokio::time::timeout(
            self.settings.call_timeout,
            self.mailer.send_password_reset(email, &deep_link, minutes),
        )
        .await
        .map_err(|_| ResetError::Delivery("timed out".to_string()))?
        .map_err(ResetError::Delivery)?;

        tracing::info!("Password reset email sent to {email} at {}", Utc::now().to_rfc3339());
        Ok(())
    }

    /// Report the email a token was issued for. Never mutates the token.
    pub fn verify(&self, token: &str) -> Result<String, ResetError> {
        let key = token_key(token);
        let record = self.store.get(&key).ok_or(ResetError::InvalidToken)?;

        match record.check(Utc::now()) {
            Ok(()) => Ok(record.email),
            Err(TokenRejection::Expired) => {
                self.store.delete(&key);
                Err(ResetError::ExpiredToken)
            }
            Err(rejection) => Err(rejection.into()),
        }
    }

    /// Change the account password and burn the token. Validity is re-checked
    /// here regardless of any earlier `verify`.
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<(), ResetError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ResetError::WeakPassword);
        }

        let key = token_key(token);
        let record = self.store.begin_consume(&key, Utc::now())?;

        let result = identity::bounded(
            self.settings.call_timeout,
            self.identity.update_password(&record.uid, new_password),
        )
        .await;

        // Burned only after the provider confirms; a crash in between leaves it replayable.
        self.store.finish_consume(&key, result.is_ok());
        result?;

        tracing::info!(
            "Password reset completed for user {} at {}",
            record.uid,
            Utc::now().to_rfc3339()
        );
        Ok(())
    }
}
