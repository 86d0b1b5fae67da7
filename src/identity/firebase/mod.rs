pub mod credentials;
pub mod id_token;

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::identity::{IdentityError, IdentityProvider, UserRecord, VerifiedIdentity};

use credentials::{AccessTokenSource, ServiceAccount};
use id_token::IdTokenVerifier;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Firebase Authentication, spoken to over its public REST surface.
pub struct FirebaseAuth {
    project_id: String,
    account: ServiceAccount,
    client: reqwest::Client,
    access_tokens: AccessTokenSource,
    verifier: IdTokenVerifier,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    last_login_at: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<ProviderUser>,
}

impl FirebaseAuth {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let account = ServiceAccount::load(&config.service_account)?;
        let project_id = config
            .project_id
            .clone()
            .unwrap_or_else(|| account.project_id.clone());

        let client = reqwest::Client::builder()
            .timeout(config.provider_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            access_tokens: AccessTokenSource::new(account.clone(), client.clone()),
            verifier: IdTokenVerifier::new(project_id.clone(), client.clone()),
            project_id,
            account,
            client,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, IdentityError> {
        let url = format!(
            "{IDENTITY_TOOLKIT_URL}/projects/{}/accounts:{method}",
            self.project_id
        );
        let token = self.access_tokens.token().await?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IdentityError::Timeout
                } else {
                    IdentityError::Upstream(format!("accounts:{method} failed: {e}"))
                }
            })?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Invalid accounts:{method} response: {e}")))?;

        if status.is_success() {
            return Ok(payload);
        }

        let code = payload["error"]["message"].as_str().unwrap_or_default();
        if code.starts_with("USER_NOT_FOUND") {
            return Err(IdentityError::UserNotFound);
        }
        Err(IdentityError::Upstream(format!(
            "accounts:{method} returned {status}: {code}"
        )))
    }

    async fn lookup(&self, query: Value) -> Result<UserRecord, IdentityError> {
        let payload = self.call("lookup", query).await?;
        let resp: LookupResponse = serde_json::from_value(payload)
            .map_err(|e| IdentityError::Upstream(format!("Invalid lookup payload: {e}")))?;

        resp.users
            .into_iter()
            .next()
            .map(into_record)
            .ok_or(IdentityError::UserNotFound)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.verifier.verify(id_token).await
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, IdentityError> {
        self.lookup(json!({ "localId": [uid] })).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, IdentityError> {
        self.lookup(json!({ "email": [email] })).await
    }

    async fn create_custom_token(&self, uid: &str) -> Result<String, IdentityError> {
        self.account.sign_custom_token(uid)
    }

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), IdentityError> {
        self.call("update", json!({ "localId": uid, "password": password }))
            .await
            .map(|_| ())
    }
}

fn into_record(user: ProviderUser) -> UserRecord {
    UserRecord {
        uid: user.local_id,
        email: user.email,
        display_name: user.display_name,
        photo_url: user.photo_url,
        email_verified: user.email_verified,
        creation_time: user.created_at.as_deref().and_then(http_date_from_millis),
        last_sign_in_time: user.last_login_at.as_deref().and_then(http_date_from_millis),
    }
}

/// Provider timestamps arrive as epoch milliseconds; clients expect HTTP-date strings.
fn http_date_from_millis(raw: &str) -> Option<String> {
    let millis: i64 = raw.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_user_maps_to_record() {
        let user: ProviderUser = serde_json::from_value(json!({
            "localId": "abc",
            "email": "alice@example.com",
            "displayName": "Alice",
            "photoUrl": "https://example.com/a.png",
            "emailVerified": true,
            "createdAt": "1700000000000",
            "lastLoginAt": "garbage"
        }))
        .unwrap();

        let record = into_record(user);
        assert_eq!(record.uid, "abc");
        assert_eq!(record.display_name.as_deref(), Some("Alice"));
        assert!(record.email_verified);
        assert_eq!(
            record.creation_time.as_deref(),
            Some("Tue, 14 Nov 2023 22:13:20 GMT")
        );
        assert_eq!(record.last_sign_in_time, None);
    }

    #[test]
    fn empty_lookup_has_no_users() {
        let resp: LookupResponse = serde_json::from_value(json!({ "kind": "x" })).unwrap();
        assert!(resp.users.is_empty());
    }
}
