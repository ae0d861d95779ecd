//! Configuration types, built from environment variables at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Graph API version used for outbound calls.
pub const DEFAULT_API_VERSION: &str = "v19.0";

/// Default Graph API base URL.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";

/// WhatsApp Cloud API credentials and transport settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Business phone number id that messages are sent from.
    pub phone_number_id: String,
    /// Bearer token for the Graph API.
    pub access_token: SecretString,
    /// Graph API version segment, e.g. `v19.0`.
    pub api_version: String,
    /// Base URL without a trailing slash. Overridable for tests and proxies.
    pub graph_url: String,
    /// Upper bound on a single outbound request.
    pub send_timeout: Duration,
}

impl WhatsAppConfig {
    /// Build from the process environment.
    ///
    /// Missing credentials are an error: the sender cannot work without them.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let phone_number_id = required(&lookup, "WHATSAPP_PHONE_NUMBER_ID")?;
        let access_token = required(&lookup, "WHATSAPP_ACCESS_TOKEN")?;
        let api_version =
            lookup("WHATSAPP_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let graph_url = lookup("WHATSAPP_GRAPH_URL")
            .unwrap_or_else(|| DEFAULT_GRAPH_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let timeout_secs: u64 = parse_or(&lookup, "WHATSAPP_SEND_TIMEOUT_SECS", 5)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WHATSAPP_SEND_TIMEOUT_SECS".into(),
                message: "must be at least 1 second".into(),
            });
        }

        Ok(Self {
            phone_number_id,
            access_token: SecretString::from(access_token),
            api_version,
            graph_url,
            send_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Token expected in the webhook subscription handshake. `None` rejects all handshakes.
    pub verify_token: Option<SecretString>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            bind: lookup("LEAD_ASSIST_BIND").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "LEAD_ASSIST_PORT", 8080)?,
            verify_token: lookup("WHATSAPP_VERIFY_TOKEN")
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Conversation, storage and logging settings.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name used in confirmation replies.
    pub business_name: String,
    /// Sessions idle longer than this restart from the beginning. `None` disables expiry.
    pub session_idle_timeout: Option<Duration>,
    /// How many recent inbound message ids are remembered for de-duplication.
    pub dedup_capacity: usize,
    /// Lead database file. `None` keeps leads in memory.
    pub db_path: Option<PathBuf>,
    /// Catalog JSON file. `None` uses the built-in catalog.
    pub catalog_path: Option<PathBuf>,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            business_name: "our team".to_string(),
            session_idle_timeout: Some(Duration::from_secs(24 * 60 * 60)),
            dedup_capacity: 1024,
            db_path: Some(PathBuf::from("./data/leads.db")),
            catalog_path: None,
            log_dir: None,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let idle_secs: u64 = parse_or(&lookup, "LEAD_ASSIST_SESSION_IDLE_SECS", 24 * 60 * 60)?;
        let dedup_capacity: usize = parse_or(&lookup, "LEAD_ASSIST_DEDUP_CAPACITY", 1024)?;

        let db_path = match lookup("LEAD_ASSIST_DB_PATH") {
            Some(p) if p == "memory" || p == ":memory:" => None,
            Some(p) => Some(PathBuf::from(p)),
            None => defaults.db_path,
        };

        Ok(Self {
            business_name: lookup("LEAD_ASSIST_BUSINESS_NAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.business_name),
            session_idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            dedup_capacity,
            db_path,
            catalog_path: lookup("LEAD_ASSIST_CATALOG_PATH").map(PathBuf::from),
            log_dir: lookup("LEAD_ASSIST_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
    }
}
