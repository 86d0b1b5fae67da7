use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::identity::{IdentityError, VerifiedIdentity};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_KEY_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    admin: Option<serde_json::Value>,
}

struct CachedKeys {
    keys: JwkSet,
    expires_at: i64,
}

/// Verifies provider-issued ID tokens against the published signing keys.
pub struct IdTokenVerifier {
    project_id: String,
    client: reqwest::Client,
    keys_url: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl IdTokenVerifier {
    pub fn new(project_id: String, client: reqwest::Client) -> Self {
        Self {
            project_id,
            client,
            keys_url: JWKS_URL.to_string(),
            cache: RwLock::new(None),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header = decode_header(token)
            .map_err(|e| IdentityError::InvalidCredential(format!("malformed token: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::InvalidCredential(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidCredential("token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);

        let claims = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::InvalidCredential(e.to_string()))?
            .claims;

        identity_from_claims(claims)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        let now = Utc::now().timestamp();

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.expires_at > now) {
                if let Some(jwk) = cached.keys.find(kid) {
                    return DecodingKey::from_jwk(jwk)
                        .map_err(|e| IdentityError::Upstream(format!("Unusable signing key: {e}")));
                }
            }
        }

        // Unknown kid or stale cache: the provider may have rotated keys.
        let fresh = self.fetch_keys().await?;
        let key = fresh
            .keys
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|e| IdentityError::Upstream(format!("Unusable signing key: {e}")))?;

        *self.cache.write().await = Some(fresh);

        key.ok_or_else(|| IdentityError::InvalidCredential(format!("unknown key id {kid}")))
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, IdentityError> {
        let resp = self
            .client
            .get(&self.keys_url)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Failed to fetch signing keys: {e}")))?;

        if !resp.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "Signing key endpoint returned {}",
                resp.status()
            )));
        }

        let ttl = resp
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_TTL_SECS);

        let keys: JwkSet = resp
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(format!("Invalid signing key set: {e}")))?;

        tracing::debug!("Fetched {} ID token signing keys (ttl {ttl}s)", keys.keys.len());

        Ok(CachedKeys {
            keys,
            expires_at: Utc::now().timestamp() + ttl,
        })
    }
}

fn identity_from_claims(claims: IdTokenClaims) -> Result<VerifiedIdentity, IdentityError> {
    if claims.sub.is_empty() || claims.sub.len() > 128 {
        return Err(IdentityError::InvalidCredential(
            "token subject is empty or too long".to_string(),
        ));
    }

    Ok(VerifiedIdentity {
        uid: claims.sub,
        email: claims.email,
        admin: matches!(claims.admin, Some(serde_json::Value::Bool(true))),
    })
}

fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse().ok())
}
