use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::ServiceAccountSource;
use crate::identity::IdentityError;

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str = "https://www.googleapis.com/auth/cloud-platform \
                      https://www.googleapis.com/auth/identitytoolkit";
const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Custom tokens are accepted by the provider for one hour.
pub const CUSTOM_TOKEN_LIFETIME_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccount {
    pub fn load(source: &ServiceAccountSource) -> Result<Self, String> {
        let raw = match source {
            ServiceAccountSource::Inline(json) => json.clone(),
            ServiceAccountSource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read service account {}: {e}", path.display()))?,
        };
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let account: ServiceAccount =
            serde_json::from_str(raw).map_err(|e| format!("Invalid service account JSON: {e}"))?;
        if account.client_email.is_empty() || account.private_key.is_empty() {
            return Err("Service account is missing client_email or private_key".to_string());
        }
        Ok(account)
    }

    fn signing_key(&self) -> Result<EncodingKey, IdentityError> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| IdentityError::Upstream(format!("Invalid service account key: {e}")))
    }

    /// Sign a custom token for `uid` with the service account key.
    pub fn sign_custom_token(&self, uid: &str) -> Result<String, IdentityError> {
        #[derive(Serialize)]
        struct CustomTokenClaims<'a> {
            iss: &'a str,
            sub: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
            uid: &'a str,
        }

        if uid.is_empty() || uid.len() > 128 {
            return Err(IdentityError::InvalidCredential(
                "uid must be between 1 and 128 characters".to_string(),
            ));
        }

        let iat = Utc::now().timestamp();
        let claims = CustomTokenClaims {
            iss: &self.client_email,
            sub: &self.client_email,
            aud: CUSTOM_TOKEN_AUDIENCE,
            iat,
            exp: iat + CUSTOM_TOKEN_LIFETIME_SECS,
            uid,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key()?)
            .map_err(|e| IdentityError::Upstream(format!("Failed to sign custom token: {e}")))
    }

    fn sign_grant_assertion(&self, audience: &str) -> Result<String, IdentityError> {
        #[derive(Serialize)]
        struct GrantClaims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        let iat = Utc::now().timestamp();
        let claims = GrantClaims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: audience,
            iat,
            exp: iat + 3600,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key()?)
            .map_err(|e| IdentityError::Upstream(format!("Failed to sign grant assertion: {e}")))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// OAuth2 access tokens for the provider's admin REST API, refreshed lazily.
pub struct AccessTokenSource {
    account: ServiceAccount,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenSource {
    pub fn new(account: ServiceAccount, client: reqwest::Client) -> Self {
        Self {
            account,
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, IdentityError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            // Refresh a minute early so in-flight requests never carry a stale token.
            if token.expires_at - 60 > now {
                return Ok(token.value.clone());
            }
        }

        let uri = self.account.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let assertion = self.account.sign_grant_assertion(uri)?;

        let resp = self
            .client
            .post(uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Token exchange failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Upstream(format!(
                "Token exchange returned {status}: {body}"
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Invalid token response: {e}")))?;

        let value = body.access_token.clone();
        *cached = Some(CachedToken {
            value: body.access_token,
            expires_at: now + body.expires_in,
        });
        Ok(value)
    }
}
