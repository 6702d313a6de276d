use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::schema::ServiceName;

/// Environment variable holding the collector URL
pub const API_URL_ENV: &str = "EVENTS_API_URL";

/// Environment variable holding the default service identity
pub const SERVICE_NAME_ENV: &str = "SERVICE_NAME";

pub const DEFAULT_USER_AGENT: &str = concat!("searchpipeline-events/", env!("CARGO_PKG_VERSION"));

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Event client configuration
///
/// Deserializable so a host service can embed it in its own config file;
/// [`ClientConfig::validate`] runs again when a client is built from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Collector endpoint events are POSTed to
    pub api_url: String,
    /// Identity stamped on every event
    #[serde(default)]
    pub service_name: ServiceName,
    /// Request timeout; no timeout when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Sent as `X-API-Key` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ClientConfig {
    /// Start from explicit values; nothing is read from the environment
    pub fn new(api_url: impl Into<String>, service_name: ServiceName) -> Self {
        Self {
            api_url: api_url.into(),
            service_name,
            timeout_ms: None,
            api_key: None,
            user_agent: default_user_agent(),
        }
    }

    /// Resolve configuration with fallback chain:
    /// explicit argument, then environment, then (service name only) `generic`
    pub fn resolve(api_url: Option<&str>, service_name: Option<ServiceName>) -> Result<Self, ConfigurationError> {
        Self::resolve_with(api_url, service_name, |key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::resolve`] with an injected variable lookup
    pub fn resolve_with<F>(
        api_url: Option<&str>,
        service_name: Option<ServiceName>,
        lookup: F,
    ) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_url = match present(api_url.map(str::to_string)) {
            Some(url) => url,
            None => {
                let url = present(lookup(API_URL_ENV)).ok_or(ConfigurationError::MissingApiUrl)?;
                log::debug!("Collector URL taken from {}", API_URL_ENV);
                url
            }
        };

        let service_name = match service_name {
            Some(service) => service,
            None => match present(lookup(SERVICE_NAME_ENV)) {
                Some(value) => {
                    let service = value
                        .parse::<ServiceName>()
                        .map_err(|_| ConfigurationError::InvalidServiceName { value: value.clone() })?;
                    log::debug!("Service name '{}' taken from {}", service, SERVICE_NAME_ENV);
                    service
                }
                None => {
                    log::debug!("No service name configured, using '{}'", ServiceName::Generic);
                    ServiceName::Generic
                }
            },
        };

        let config = Self::new(api_url.trim(), service_name);
        config.validate()?;
        Ok(config)
    }

    pub fn with_service_name(mut self, service_name: ServiceName) -> Self {
        self.service_name = service_name;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check the collector URL is an absolute http(s) URL with a host
    pub fn validate(&self) -> Result<Url, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidApiUrl {
            url: self.api_url.clone(),
            reason: reason.to_string(),
        };

        if self.api_url.trim().is_empty() {
            return Err(ConfigurationError::MissingApiUrl);
        }

        let url = Url::parse(&self.api_url).map_err(|e| invalid(&e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host"));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_explicit_values_win() {
        let config = ClientConfig::resolve_with(
            Some("https://collector.example.com/dev/collect"),
            Some(ServiceName::PatternMatcher),
            env(&[(API_URL_ENV, "https://other.example.com"), (SERVICE_NAME_ENV, "search-gateway")]),
        )
        .unwrap();
        assert_eq!(config.api_url, "https://collector.example.com/dev/collect");
        assert_eq!(config.service_name, ServiceName::PatternMatcher);
    }

    #[test]
    fn test_environment_fallback() {
        let config = ClientConfig::resolve_with(
            None,
            None,
            env(&[(API_URL_ENV, "http://localhost:8080/collect"), (SERVICE_NAME_ENV, "query-executor")]),
        )
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8080/collect");
        assert_eq!(config.service_name, ServiceName::QueryExecutor);
    }

    #[test]
    fn test_missing_url_is_configuration_error() {
        let err = ClientConfig::resolve_with(None, Some(ServiceName::Generic), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingApiUrl));
    }

    #[test]
    fn test_blank_values_count_as_absent() {
        let err = ClientConfig::resolve_with(Some("  "), None, env(&[(API_URL_ENV, "")])).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingApiUrl));

        let config =
            ClientConfig::resolve_with(None, None, env(&[(API_URL_ENV, "http://localhost/c"), (SERVICE_NAME_ENV, " ")]))
                .unwrap();
        assert_eq!(config.service_name, ServiceName::Generic);
    }

    #[test]
    fn test_service_name_defaults_to_generic() {
        let config = ClientConfig::resolve_with(Some("http://localhost/collect"), None, env(&[])).unwrap();
        assert_eq!(config.service_name, ServiceName::Generic);
    }

    #[test]
    fn test_unknown_service_name_rejected() {
        let err = ClientConfig::resolve_with(
            Some("http://localhost/collect"),
            None,
            env(&[(SERVICE_NAME_ENV, "etl-pipeline")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidServiceName { value } if value == "etl-pipeline"));
    }

    #[test]
    fn test_invalid_urls_rejected() {
        for url in ["/dev/collect", "collector.example.com", "ftp://collector.example.com", "mailto:ops@example.com"] {
            let err = ClientConfig::new(url, ServiceName::Generic).validate().unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidApiUrl { .. }), "accepted {}", url);
        }
    }

    #[test]
    fn test_builder_options() {
        let config = ClientConfig::new("https://collector.example.com", ServiceName::SearchGateway)
            .with_timeout(Duration::from_millis(1500))
            .with_api_key("secret")
            .with_user_agent("gateway/2.0");
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.user_agent, "gateway/2.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_user_agent() {
        let config = ClientConfig::new("https://collector.example.com", ServiceName::Generic);
        assert!(config.user_agent.starts_with("searchpipeline-events/"));
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_deserialize_embedded_config() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"api_url": "https://collector.example.com/collect", "timeout_ms": 5000}"#).unwrap();
        assert_eq!(config.service_name, ServiceName::Generic);
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_resolve_reads_process_environment() {
        let saved: Vec<(&str, Option<String>)> = [API_URL_ENV, SERVICE_NAME_ENV]
            .into_iter()
            .map(|name| (name, std::env::var(name).ok()))
            .collect();

        // SAFETY: Only this test touches these vars; prior values are restored below
        unsafe {
            std::env::set_var(API_URL_ENV, "https://env.example.com/collect");
            std::env::set_var(SERVICE_NAME_ENV, "query-interpreter");
        }
        let resolved = ClientConfig::resolve(None, None);
        for (name, value) in saved {
            // SAFETY: as above
            unsafe {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }

        let config = resolved.unwrap();
        assert_eq!(config.api_url, "https://env.example.com/collect");
        assert_eq!(config.service_name, ServiceName::QueryInterpreter);
    }
}
