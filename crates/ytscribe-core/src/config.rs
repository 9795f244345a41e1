//! Gateway configuration: defaults, optional TOML file, then `YTSCRIBE_*` environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | YTSCRIBE_CONFIG | config/ytscribe | Config file path (extension optional; missing file is fine). |
//! | YTSCRIBE_DB_PATH | ./data/transcripts | Sled database directory. |
//! | YTSCRIBE_BIND_ADDR | 0.0.0.0:8000 | Listen address for the gateway. |
//! | YTSCRIBE_FETCH_TIMEOUT_SECS | 20 | Upper bound on one upstream transcript fetch. |
//! | YTSCRIBE_PROXY_USERNAME / YTSCRIBE_PROXY_PASSWORD | unset | Proxied egress when both are set. |
//! | YTSCRIBE_PROXY_URL | http://p.webshare.io:80 | Proxy endpoint used with the credentials above. |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_DB_PATH;

const DEFAULT_CONFIG_PATH: &str = "config/ytscribe";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PROXY_URL: &str = "http://p.webshare.io:80";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub db_path: String,
    pub bind_addr: String,
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub proxy_username: Option<String>,
    #[serde(default)]
    pub proxy_password: Option<String>,
    pub proxy_url: String,
}

/// Upstream proxy endpoint plus basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            proxy_username: None,
            proxy_password: None,
            proxy_url: DEFAULT_PROXY_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load config. Precedence: env `YTSCRIBE_*` > file (`YTSCRIBE_CONFIG` or `config/ytscribe`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("YTSCRIBE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let builder = config::Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("fetch_timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS as i64)?
            .set_default("proxy_url", DEFAULT_PROXY_URL)?;

        let builder = if Path::new(&config_path).exists() {
            builder.add_source(config::File::from(Path::new(&config_path)))
        } else {
            builder.add_source(config::File::with_name(&config_path).required(false))
        };

        let built = builder
            .add_source(config::Environment::with_prefix("YTSCRIBE").prefix_separator("_"))
            .build()?;

        built.try_deserialize()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Proxy settings, only when both username and password are non-empty.
    pub fn proxy(&self) -> Option<ProxySettings> {
        let username = self.proxy_username.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let password = self.proxy_password.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(ProxySettings {
            url: self.proxy_url.clone(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_requires_both_credentials() {
        let mut cfg = GatewayConfig::default();
        assert!(cfg.proxy().is_none());

        cfg.proxy_username = Some("user".into());
        assert!(cfg.proxy().is_none());

        cfg.proxy_password = Some("  ".into());
        assert!(cfg.proxy().is_none());

        cfg.proxy_password = Some("secret".into());
        let proxy = cfg.proxy().expect("both set");
        assert_eq!(proxy.username, "user");
        assert_eq!(proxy.password, "secret");
        assert_eq!(proxy.url, DEFAULT_PROXY_URL);
    }

    #[test]
    fn fetch_timeout_never_zero() {
        let cfg = GatewayConfig {
            fetch_timeout_secs: 0,
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(1));
    }
}
