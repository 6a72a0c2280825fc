//! Provider block settings
//!
//! Each setting is read from the `provider "umbrella"` block first and falls
//! back to an environment variable.

use std::collections::HashMap;

use secrecy::SecretString;
use umbrella_core::resource::Value;

use crate::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.umbrella.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const KNOWN_SETTINGS: &[&str] = &["api_key", "api_secret", "org_id", "base_url", "timeout_secs"];

/// Resolved connection settings
#[derive(Debug, Clone)]
pub struct UmbrellaConfig {
    pub api_key: SecretString,
    pub api_secret: SecretString,
    /// Sent as `X-Umbrella-OrgId` when set
    pub org_id: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl UmbrellaConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            api_secret: SecretString::from(api_secret.into()),
            org_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve settings from provider block attributes and the process environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, Error> {
        Self::resolve(attributes, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an explicit environment lookup
    pub fn resolve(
        attributes: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let mut unknown: Vec<&String> = attributes
            .keys()
            .filter(|k| !KNOWN_SETTINGS.contains(&k.as_str()))
            .collect();
        unknown.sort();
        if let Some(name) = unknown.first() {
            return Err(Error::Configuration(format!(
                "unknown provider setting '{}'",
                name
            )));
        }

        let setting = |name: &str, env_name: &str| -> Result<Option<String>, Error> {
            match attributes.get(name) {
                Some(value) => value.to_path_segment().map(Some).ok_or_else(|| {
                    Error::Configuration(format!("'{}' must be a string or number", name))
                }),
                None => Ok(env(env_name).filter(|v| !v.is_empty())),
            }
        };

        let api_key = setting("api_key", "UMBRELLA_API_KEY")?.ok_or_else(|| {
            Error::Configuration("api_key is not set (or UMBRELLA_API_KEY)".to_string())
        })?;
        let api_secret = setting("api_secret", "UMBRELLA_API_SECRET")?.ok_or_else(|| {
            Error::Configuration("api_secret is not set (or UMBRELLA_API_SECRET)".to_string())
        })?;
        let org_id = setting("org_id", "UMBRELLA_ORG_ID")?;
        let base_url = setting("base_url", "UMBRELLA_BASE_URL")?
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = match attributes.get("timeout_secs") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(Value::Int(n)) if *n > 0 => *n as u64,
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "timeout_secs must be a positive integer, got {}",
                    other
                )));
            }
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_secret: SecretString::from(api_secret),
            org_id,
            base_url,
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn attrs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn block_values_take_precedence() {
        let config = UmbrellaConfig::resolve(
            &attrs(&[
                ("api_key", Value::String("block-key".to_string())),
                ("api_secret", Value::String("block-secret".to_string())),
                ("org_id", Value::Int(1234567)),
            ]),
            env_from(&[("UMBRELLA_API_KEY", "env-key"), ("UMBRELLA_ORG_ID", "1")]),
        )
        .unwrap();

        assert_eq!(config.api_key.expose_secret(), "block-key");
        assert_eq!(config.org_id.as_deref(), Some("1234567"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn falls_back_to_environment() {
        let config = UmbrellaConfig::resolve(
            &HashMap::new(),
            env_from(&[
                ("UMBRELLA_API_KEY", "env-key"),
                ("UMBRELLA_API_SECRET", "env-secret"),
                ("UMBRELLA_BASE_URL", "http://127.0.0.1:8080"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_secret.expose_secret(), "env-secret");
        assert_eq!(config.org_id, None);
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let err = UmbrellaConfig::resolve(&HashMap::new(), env_from(&[])).unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn rejects_unknown_and_invalid_settings() {
        let env = env_from(&[("UMBRELLA_API_KEY", "k"), ("UMBRELLA_API_SECRET", "s")]);

        let err = UmbrellaConfig::resolve(&attrs(&[("region", Value::String("eu".into()))]), &env)
            .unwrap_err();
        assert!(err.to_string().contains("unknown provider setting 'region'"));

        let err = UmbrellaConfig::resolve(&attrs(&[("timeout_secs", Value::Int(0))]), &env)
            .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
