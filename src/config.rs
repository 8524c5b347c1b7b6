// Client configuration for the booking server endpoints

use std::time::Duration;

use reqwest::Url;

use crate::api::ClientError;

pub const ENV_BASE_URL: &str = "PREPPER_BASE_URL";
pub const ENV_CLASH_PATH: &str = "PREPPER_CLASH_PATH";
pub const ENV_ITEM_PATH: &str = "PREPPER_ITEM_PATH";
pub const ENV_TIMEOUT_MS: &str = "PREPPER_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub clash_path: String,
    pub item_path: String,
    // Bounded wait for a single request; 0 disables the bound
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            clash_path: "/api/clashes".to_string(),
            item_path: "/api/item".to_string(),
            timeout_ms: 30_000,
            user_agent: concat!("prepper-booking/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    // Defaults overridden by whatever is set in the environment
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(clash_path) = lookup(ENV_CLASH_PATH) {
            config.clash_path = clash_path;
        }
        if let Some(item_path) = lookup(ENV_ITEM_PATH) {
            config.item_path = item_path;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = timeout.parse().map_err(|_| {
                ClientError::ConfigError(format!("{} is not a number: {:?}", ENV_TIMEOUT_MS, timeout))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::ConfigError(format!("invalid base url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::ConfigError(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        for path in [&self.clash_path, &self.item_path] {
            if !path.starts_with('/') {
                return Err(ClientError::ConfigError(format!(
                    "endpoint path must be absolute: {}",
                    path
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    // Endpoint paths are absolute below the base url, so a mount prefix in base_url is kept
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::ConfigError(format!("invalid endpoint {}: {}", path, e)))?;
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        Ok(url)
    }
}
