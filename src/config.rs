use std::{collections::HashMap, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.fidesmo.com/v2/";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub delivery: DeliveryConfig,
    pub card: CardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    /// `user:password` for basic authentication, anything else is sent as a bearer token
    #[serde(default)]
    pub auth: Option<SecretString>,
    /// Dump every request and response body at debug level
    pub trace: bool,
}

impl ApiConfig {
    /// Parses the configured base URL.
    ///
    /// A malformed URL is not fatal: the default endpoint is used instead.
    /// The returned URL always ends with `/` so relative endpoints join below it.
    pub fn base_url(&self) -> Url {
        let mut url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Ignoring malformed API URL {:?}: {e}", self.url);
                Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
            }
        };
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// `<appId>/<serviceId>` or a `ws://` / `wss://` URL
    #[serde(default)]
    pub service: Option<String>,
    /// Pre-supplied form answers, `fieldId=value,fieldId=value`
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub cancel_grace_secs: u64,
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardConfig {
    /// Case-insensitive substring of the reader name
    #[serde(default)]
    pub reader: Option<String>,
    pub apdu_trace: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("api.url", DEFAULT_API_URL)?
            .set_default("api.trace", false)?
            .set_default("delivery.retry_delay_ms", 500)?
            .set_default("delivery.max_retries", 5)?
            .set_default("delivery.cancel_grace_secs", 5)?
            .set_default("card.apdu_trace", false)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_API__URL or APP_DELIVERY__TIMEOUT_SECS
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
