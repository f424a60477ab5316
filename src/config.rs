// Application configuration
// Connection settings are read once from the environment at startup

use secrecy::SecretString;
use url::Url;

use crate::providers::{DavError, WebDavConfig};

pub const ENV_URL: &str = "WEBDAV_URL";
pub const ENV_USERNAME: &str = "WEBDAV_USERNAME";
pub const ENV_PASSWORD: &str = "WEBDAV_PASSWORD";
pub const ENV_WOPI_DISCOVERY_URL: &str = "WOPI_DISCOVERY_URL";

/// Everything needed to talk to the storage server
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webdav: WebDavConfig,
    /// Document-collaboration discovery endpoint, if configured
    pub wopi_discovery_url: Option<Url>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, DavError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DavError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let url = value(ENV_URL)
            .ok_or_else(|| DavError::InvalidConfig(format!("{} is not set", ENV_URL)))?;
        let (username, password) = match (value(ENV_USERNAME), lookup(ENV_PASSWORD).filter(|p| !p.is_empty())) {
            (Some(username), Some(password)) => (username, password),
            _ => {
                return Err(DavError::InvalidConfig(format!(
                    "{} and {} must both be set",
                    ENV_USERNAME, ENV_PASSWORD
                )))
            }
        };

        let webdav = WebDavConfig::new(&url, &username, SecretString::from(password))?;

        let wopi_discovery_url = match value(ENV_WOPI_DISCOVERY_URL) {
            Some(raw) => Some(Url::parse(&raw).map_err(|e| {
                DavError::InvalidConfig(format!("Invalid {} '{}': {}", ENV_WOPI_DISCOVERY_URL, raw, e))
            })?),
            None => None,
        };

        tracing::info!(
            "Configured WebDAV root {} for user {}",
            webdav.root_url,
            webdav.username
        );
        Ok(Self {
            webdav,
            wopi_discovery_url,
        })
    }
}
