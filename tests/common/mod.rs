use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use authsync::config::{Config, Environment, RateLimitConfig, ServiceAccountSource};
use authsync::email::ResetMailer;
use authsync::identity::{IdentityError, IdentityProvider, UserRecord, VerifiedIdentity};
use authsync::state::SharedState;

/// In-process identity provider. Bearer credentials look like `user:<uid>` or `admin:<uid>`.
#[derive(Default)]
pub struct FakeIdentity {
    users: Mutex<HashMap<String, UserRecord>>,
    passwords: Mutex<HashMap<String, String>>,
    pub fail_password_updates: AtomicBool,
}

impl FakeIdentity {
    pub fn add_user(&self, uid: &str, email: &str) {
        self.users.lock().unwrap().insert(
            uid.to_string(),
            UserRecord {
                uid: uid.to_string(),
                email: Some(email.to_string()),
                display_name: Some(format!("User {uid}")),
                photo_url: None,
                email_verified: true,
                creation_time: Some("Tue, 14 Nov 2023 22:13:20 GMT".to_string()),
                last_sign_in_time: None,
            },
        );
    }

    pub fn password_of(&self, uid: &str) -> Option<String> {
        self.passwords.lock().unwrap().get(uid).cloned()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let (uid, admin) = if let Some(uid) = id_token.strip_prefix("admin:") {
            (uid, true)
        } else if let Some(uid) = id_token.strip_prefix("user:") {
            (uid, false)
        } else {
            return Err(IdentityError::InvalidCredential("unrecognised token".to_string()));
        };

        Ok(VerifiedIdentity {
            uid: uid.to_string(),
            email: None,
            admin,
        })
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, IdentityError> {
        self.users
            .lock()
            .unwrap()
            .get(uid)
            .cloned()
            .ok_or(IdentityError::UserNotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, IdentityError> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(IdentityError::UserNotFound)
    }

    async fn create_custom_token(&self, uid: &str) -> Result<String, IdentityError> {
        Ok(format!("custom-token-for-{uid}"))
    }

    async fn update_password(&self, uid: &str, password: &str) -> Result<(), IdentityError> {
        if self.fail_password_updates.load(Ordering::SeqCst) {
            return Err(IdentityError::Upstream("provider unavailable".to_string()));
        }
        self.passwords
            .lock()
            .unwrap()
            .insert(uid.to_string(), password.to_string());
        Ok(())
    }
}

/// Captures reset links instead of sending mail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Token from the most recent deep link.
    pub fn last_token(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let (_, link) = sent.last().expect("no reset email was sent");
        link.split("token=")
            .nth(1)
            .expect("deep link has no token")
            .to_string()
    }
}

#[async_trait]
impl ResetMailer for RecordingMailer {
    async fn send_password_reset(
        &self,
        to_email: &str,
        deep_link: &str,
        _expires_in_minutes: u64,
    ) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("smtp relay refused connection".to_string());
        }
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), deep_link.to_string()));
        Ok(())
    }
}

/// A running test server backed by fakes.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
    pub identity: Arc<FakeIdentity>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a JSON body, return (body, status).
    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request with JSON body.
    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn send_reset(&self, email: &str) -> (Value, StatusCode) {
        self.post("/api/sendPasswordReset", &json!({ "email": email }))
            .await
    }

    /// Request a reset for a known account and return the mailed token.
    pub async fn issue_token(&self, email: &str) -> String {
        let (body, status) = self.send_reset(email).await;
        assert_eq!(status, StatusCode::OK, "send reset failed: {body}");
        self.mailer.last_token()
    }
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        environment: Environment::Development,
        log_level: "warn".to_string(),
        service_name: "AuthSync Test".to_string(),
        service_account: ServiceAccountSource::Inline(String::new()),
        project_id: Some("demo-project".to_string()),
        app_scheme: "myapp".to_string(),
        smtp: None,
        trusted_proxies: vec![],
        max_body_size: 1_048_576,
        provider_timeout: Duration::from_secs(2),
        reset_token_ttl: Duration::from_secs(30 * 60),
        sweep_interval: Duration::from_secs(300),
        rate_limit: RateLimitConfig {
            window: Duration::from_secs(15 * 60),
            api_max: 100,
            reset_max: 5,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// Spawn the app with a custom configuration, seeded with alice and bob.
pub async fn spawn_app_with(config: Config) -> TestApp {
    let identity = Arc::new(FakeIdentity::default());
    identity.add_user("uid-alice", "alice@example.com");
    identity.add_user("uid-bob", "bob@example.com");

    let mailer = Arc::new(RecordingMailer::default());

    let (app, state) = authsync::build_app(config, identity.clone(), mailer.clone());

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
        state,
        identity,
        mailer,
    }
}
