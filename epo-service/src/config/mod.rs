use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

/// Public Open Patent Services endpoint, version 3.2.
pub const DEFAULT_OPS_BASE_URL: &str = "https://ops.epo.org/3.2";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct EpoConfig {
    pub common: core_config::Config,
    pub epo: OpsConfig,
}

#[derive(Debug, Clone)]
pub struct OpsConfig {
    pub provider: SearchProvider,
    pub base_url: String,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    pub request_timeout_secs: u64,
}

impl OpsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn has_credentials(&self) -> bool {
        !self.consumer_key.expose_secret().is_empty()
            && !self.consumer_secret.expose_secret().is_empty()
    }
}

/// Which upstream the search forwarder talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    /// EPO Open Patent Services.
    Ops,
    /// Canned in-process responses, for local runs without credentials.
    Mock,
}

impl std::str::FromStr for SearchProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ops" => Ok(SearchProvider::Ops),
            "mock" => Ok(SearchProvider::Mock),
            _ => Err(format!("Invalid search provider: {}", s)),
        }
    }
}

impl EpoConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let provider: SearchProvider = get_env("EPO_PROVIDER", Some("ops"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        // Credentials are only optional when nothing is sent upstream.
        let credential_default = match provider {
            SearchProvider::Ops => None,
            SearchProvider::Mock => Some(""),
        };

        let request_timeout_secs = get_env(
            "EPO_REQUEST_TIMEOUT_SECS",
            Some(&DEFAULT_REQUEST_TIMEOUT_SECS.to_string()),
            is_prod,
        )?
        .parse()
        .map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("EPO_REQUEST_TIMEOUT_SECS is invalid: {}", e))
        })?;

        let config = EpoConfig {
            common: common_config,
            epo: OpsConfig {
                provider,
                base_url: get_env("EPO_BASE_URL", Some(DEFAULT_OPS_BASE_URL), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
                consumer_key: Secret::new(get_env(
                    "EPO_CONSUMER_KEY",
                    credential_default,
                    is_prod && provider == SearchProvider::Ops,
                )?),
                consumer_secret: Secret::new(get_env(
                    "EPO_CONSUMER_SECRET",
                    credential_default,
                    is_prod && provider == SearchProvider::Ops,
                )?),
                request_timeout_secs,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, at the first search.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.epo.provider == SearchProvider::Ops && !self.epo.has_credentials() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "EPO_CONSUMER_KEY and EPO_CONSUMER_SECRET must be non-empty for the ops provider"
            )));
        }

        if self.epo.request_timeout_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "EPO_REQUEST_TIMEOUT_SECS must be greater than zero"
            )));
        }

        if !self.epo.base_url.starts_with("http://") && !self.epo.base_url.starts_with("https://")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "EPO_BASE_URL must be an http(s) URL, got {}",
                self.epo.base_url
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: SearchProvider, key: &str, secret: &str) -> EpoConfig {
        EpoConfig {
            common: core_config::Config::default(),
            epo: OpsConfig {
                provider,
                base_url: DEFAULT_OPS_BASE_URL.to_string(),
                consumer_key: Secret::new(key.to_string()),
                consumer_secret: Secret::new(secret.to_string()),
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
        }
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("OPS".parse::<SearchProvider>(), Ok(SearchProvider::Ops));
        assert_eq!("mock".parse::<SearchProvider>(), Ok(SearchProvider::Mock));
        assert!("google".parse::<SearchProvider>().is_err());
    }

    #[test]
    fn ops_provider_requires_credentials() {
        let err = config(SearchProvider::Ops, "", "").validate().unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        assert!(config(SearchProvider::Ops, "key", "secret").validate().is_ok());
    }

    #[test]
    fn mock_provider_runs_without_credentials() {
        assert!(config(SearchProvider::Mock, "", "").validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout_and_non_http_base_url() {
        let mut cfg = config(SearchProvider::Ops, "key", "secret");
        cfg.epo.request_timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config(SearchProvider::Ops, "key", "secret");
        cfg.epo.base_url = "ops.epo.org".to_string();
        assert!(cfg.validate().is_err());
    }
}
