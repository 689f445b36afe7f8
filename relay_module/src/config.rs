use std::env;
use std::path::PathBuf;
use std::time::Duration;

use assistant_module::DEFAULT_OPENAI_URL;
use send_messages_module::DEFAULT_GRAPH_API_URL;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REGISTRY_CAPACITY: u64 = 10_000;
const DEFAULT_THREAD_IDLE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub openai_api_key: String,
    pub openai_api_url: String,
    /// Unset or `force_new` provisions a new assistant at startup.
    pub assistant_id: Option<String>,
    pub assistant_profile_path: PathBuf,
    pub whatsapp_token: String,
    pub phone_number_id: String,
    pub whatsapp_api_url: String,
    pub webhook_verify_token: String,
    /// Enables `X-Hub-Signature-256` checking of webhook posts.
    pub whatsapp_app_secret: Option<String>,
    /// Unset keeps contacts in memory.
    pub mongodb_uri: Option<String>,
    pub mongodb_database: Option<String>,
    pub knowledge_path: Option<PathBuf>,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
    pub registry_capacity: u64,
    pub thread_idle_ttl: Duration,
    pub debug_endpoints: bool,
    pub max_body_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            host: optional("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(optional("PORT"), "PORT", DEFAULT_PORT)?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_api_url: optional("OPENAI_API_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            assistant_id: optional("ASSISTANT_ID"),
            assistant_profile_path: optional("ASSISTANT_PROFILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assistant.toml")),
            whatsapp_token: required("WHATSAPP_TOKEN")?,
            phone_number_id: required("PHONE_NUMBER_ID")?,
            whatsapp_api_url: optional("WHATSAPP_API_URL")
                .unwrap_or_else(|| DEFAULT_GRAPH_API_URL.to_string()),
            webhook_verify_token: required("WEBHOOK_VERIFY_TOKEN")?,
            whatsapp_app_secret: optional("WHATSAPP_APP_SECRET"),
            mongodb_uri: optional("MONGODB_CONNECTION_STRING"),
            mongodb_database: optional("MONGODB_DATABASE"),
            knowledge_path: optional("KNOWLEDGE_PATH").map(PathBuf::from),
            poll_interval: Duration::from_millis(positive_or(
                optional("RUN_POLL_INTERVAL_MS"),
                "RUN_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )?),
            run_timeout: Duration::from_secs(positive_or(
                optional("RUN_TIMEOUT_SECS"),
                "RUN_TIMEOUT_SECS",
                DEFAULT_RUN_TIMEOUT_SECS,
            )?),
            registry_capacity: positive_or(
                optional("THREAD_REGISTRY_CAPACITY"),
                "THREAD_REGISTRY_CAPACITY",
                DEFAULT_REGISTRY_CAPACITY,
            )?,
            thread_idle_ttl: Duration::from_secs(positive_or(
                optional("THREAD_IDLE_TTL_SECS"),
                "THREAD_IDLE_TTL_SECS",
                DEFAULT_THREAD_IDLE_TTL_SECS,
            )?),
            debug_endpoints: parse_flag(optional("DEBUG_ENDPOINTS"), "DEBUG_ENDPOINTS")?,
            max_body_bytes: positive_or(
                optional("GATEWAY_MAX_BODY_BYTES"),
                "GATEWAY_MAX_BODY_BYTES",
                DEFAULT_MAX_BODY_BYTES as u64,
            )? as usize,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn positive_or(value: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    let parsed = parse_or(value, key, default)?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        });
    }
    Ok(parsed)
}

fn parse_flag(value: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}
