use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub environment: Environment,
    pub log_level: String,
    pub service_name: String,
    pub service_account: ServiceAccountSource,
    pub project_id: Option<String>,
    pub app_scheme: String,
    pub smtp: Option<SmtpConfig>,
    pub trusted_proxies: Vec<IpNet>,
    pub max_body_size: usize,
    pub provider_timeout: Duration,
    pub reset_token_ttl: Duration,
    pub sweep_interval: Duration,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub api_max: u32,
    pub reset_max: u32,
}

/// Where the identity provider's service account credentials come from.
#[derive(Debug, Clone)]
pub enum ServiceAccountSource {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host: IpAddr = env_or("AUTHSYNC_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid AUTHSYNC_HOST: {e}"))?;

        let port: u16 = env_first(&["AUTHSYNC_PORT", "PORT"])
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| format!("Invalid port: {e}"))?;

        let environment = Environment::parse(
            &env_first(&["AUTHSYNC_ENV", "NODE_ENV"]).unwrap_or_default(),
        );

        let log_level = env_or("AUTHSYNC_LOG_LEVEL", "info");
        let service_name = env_or("AUTHSYNC_SERVICE_NAME", "AuthSync Server");

        let service_account = match std::env::var("FIREBASE_SERVICE_ACCOUNT_KEY") {
            Ok(json) if !json.trim().is_empty() => ServiceAccountSource::Inline(json),
            _ => ServiceAccountSource::File(PathBuf::from(env_or(
                "FIREBASE_SERVICE_ACCOUNT_PATH",
                "serviceAccountKey.json",
            ))),
        };

        let project_id = std::env::var("FIREBASE_PROJECT_ID")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let app_scheme =
            env_first(&["AUTHSYNC_APP_SCHEME", "APP_SCHEME"]).unwrap_or_else(|| "myapp".to_string());

        let smtp = smtp_config(|key| std::env::var(key).ok())?;

        let trusted_proxies = parse_cidrs(&env_or("AUTHSYNC_TRUSTED_PROXIES", ""))?;

        let max_body_size: usize = env_or("AUTHSYNC_MAX_BODY_SIZE", "10485760")
            .parse()
            .map_err(|e| format!("Invalid AUTHSYNC_MAX_BODY_SIZE: {e}"))?;

        let rate_limit = RateLimitConfig {
            window: env_secs("AUTHSYNC_RATE_LIMIT_WINDOW_SECS", 15 * 60)?,
            api_max: env_parse("AUTHSYNC_RATE_LIMIT_MAX", 100)?,
            reset_max: env_parse("AUTHSYNC_RESET_RATE_LIMIT_MAX", 5)?,
        };

        Ok(Config {
            host,
            port,
            environment,
            log_level,
            service_name,
            service_account,
            project_id,
            app_scheme,
            smtp,
            trusted_proxies,
            max_body_size,
            provider_timeout: env_secs("AUTHSYNC_PROVIDER_TIMEOUT_SECS", 10)?,
            reset_token_ttl: env_secs("AUTHSYNC_RESET_TOKEN_TTL_SECS", 30 * 60)?,
            sweep_interval: env_secs("AUTHSYNC_SWEEP_INTERVAL_SECS", 5 * 60)?,
            rate_limit,
        })
    }

    /// Internal error details are only ever returned to clients outside production.
    pub fn expose_error_details(&self) -> bool {
        self.environment != Environment::Production
    }
}

/// SMTP relay settings. Nothing set disables mail; a partial set is an error.
/// The `EMAIL_*` names are accepted as fallbacks, with the relay host taken
/// from `EMAIL_SERVICE` (default `gmail`) when no host is given.
fn smtp_config(var: impl Fn(&str) -> Option<String>) -> Result<Option<SmtpConfig>, String> {
    let first = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| var(*key).filter(|v| !v.trim().is_empty()))
    };

    let host = first(&["AUTHSYNC_SMTP_HOST"]);
    let port = first(&["AUTHSYNC_SMTP_PORT"]);
    let user = first(&["AUTHSYNC_SMTP_USER", "EMAIL_USER"]);
    let pass = first(&["AUTHSYNC_SMTP_PASS", "EMAIL_PASS"]);
    let from = first(&["AUTHSYNC_SMTP_FROM", "EMAIL_FROM"]);

    if host.is_none() && port.is_none() && user.is_none() && pass.is_none() && from.is_none() {
        return Ok(None);
    }

    let (user, pass) = match (user, pass) {
        (Some(user), Some(pass)) => (user, pass),
        (user, pass) => {
            let missing: Vec<&str> = [
                user.is_none().then_some("AUTHSYNC_SMTP_USER (or EMAIL_USER)"),
                pass.is_none().then_some("AUTHSYNC_SMTP_PASS (or EMAIL_PASS)"),
            ]
            .into_iter()
            .flatten()
            .collect();
            return Err(format!(
                "Incomplete SMTP configuration, missing {}",
                missing.join(", ")
            ));
        }
    };

    let host = match host {
        Some(host) => host,
        None => service_host(&first(&["EMAIL_SERVICE"]).unwrap_or_else(|| "gmail".to_string()))?
            .to_string(),
    };

    let port = match port {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid AUTHSYNC_SMTP_PORT: {e}"))?,
        None => 587,
    };

    Ok(Some(SmtpConfig {
        host,
        port,
        from: from.unwrap_or_else(|| user.clone()),
        user,
        pass,
    }))
}

fn service_host(service: &str) -> Result<&'static str, String> {
    match service.trim().to_lowercase().as_str() {
        "gmail" => Ok("smtp.gmail.com"),
        "outlook" | "hotmail" | "outlook365" => Ok("smtp-mail.outlook.com"),
        "yahoo" => Ok("smtp.mail.yahoo.com"),
        other => Err(format!(
            "Unknown EMAIL_SERVICE '{other}', set AUTHSYNC_SMTP_HOST instead"
        )),
    }
}

fn parse_cidrs(raw: &str) -> Result<Vec<IpNet>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e| format!("Invalid AUTHSYNC_TRUSTED_PROXIES entry '{s}': {e}"))
        })
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
}

fn env_parse<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| format!("Invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &str, default: u64) -> Result<Duration, String> {
    env_parse(key, default).map(Duration::from_secs)
}
