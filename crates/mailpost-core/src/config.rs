//! Connection configuration with environment fallback.

use serde::{Deserialize, Serialize};

const ENV_HOST: &str = "SMTP_HOST";
const ENV_PORT: &str = "SMTP_PORT";
const ENV_AUTHENTICATION: &str = "SMTP_AUTHENTICATION";
const ENV_USERNAME: &str = "SMTP_USERNAME";
const ENV_PASSWORD: &str = "SMTP_PASSWORD";

/// Username and password for AUTH PLAIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username, also the fallback sender address.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Where and how to reach the SMTP server.
///
/// Owned by the orchestration layer and passed by reference into each send;
/// the pipeline never retains it beyond the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Credentials. When present, the connection is upgraded with STARTTLS
    /// and authenticated before the envelope; when absent, neither happens.
    pub credentials: Option<Credentials>,
}

/// Explicit configuration values that take precedence over the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Server hostname.
    #[serde(default)]
    pub host: Option<String>,
    /// Server port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Whether to authenticate. Defaults to enabled.
    #[serde(default)]
    pub authentication: Option<bool>,
    /// Username for authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Password for authentication.
    #[serde(default)]
    pub password: Option<String>,
}

/// Configuration resolution and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No host was configured.
    #[error("SMTP host is missing: set the host value or the SMTP_HOST environment variable")]
    MissingHost,

    /// No port was configured.
    #[error("SMTP port is missing: set the port value or the SMTP_PORT environment variable")]
    MissingPort,

    /// The configured port is not a valid port number.
    #[error("SMTP port is invalid: {0}")]
    InvalidPort(String),

    /// Authentication is enabled but no username was configured.
    #[error(
        "SMTP username is missing: set the username value or the SMTP_USERNAME environment \
         variable, or disable authentication"
    )]
    MissingUsername,

    /// Authentication is enabled but no password was configured.
    #[error(
        "SMTP password is missing: set the password value or the SMTP_PASSWORD environment \
         variable, or disable authentication"
    )]
    MissingPassword,
}

impl ConnectionConfig {
    /// Resolves a configuration purely from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&ConfigOverrides::default(), |name| std::env::var(name).ok())
    }

    /// Resolves a configuration from explicit overrides with environment
    /// fallback. Explicit values win; `env` is consulted for the rest.
    ///
    /// Authentication defaults to enabled when neither the override nor a
    /// parsable `SMTP_AUTHENTICATION` value says otherwise.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid required value: host and port
    /// always, username and password when authentication is enabled.
    pub fn resolve(
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let host = overrides
            .host
            .clone()
            .or_else(|| env(ENV_HOST))
            .unwrap_or_default();
        if host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }

        let port = match overrides.port {
            Some(port) => port,
            None => {
                let raw = env(ENV_PORT).unwrap_or_default();
                if raw.trim().is_empty() {
                    return Err(ConfigError::MissingPort);
                }
                raw.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(raw))?
            }
        };
        if port == 0 {
            return Err(ConfigError::InvalidPort(port.to_string()));
        }

        let authentication = overrides
            .authentication
            .or_else(|| env(ENV_AUTHENTICATION).and_then(|v| v.parse::<bool>().ok()))
            .unwrap_or(true);

        let credentials = if authentication {
            let username = overrides
                .username
                .clone()
                .or_else(|| env(ENV_USERNAME))
                .unwrap_or_default();
            if username.trim().is_empty() {
                return Err(ConfigError::MissingUsername);
            }

            let password = overrides
                .password
                .clone()
                .or_else(|| env(ENV_PASSWORD))
                .unwrap_or_default();
            if password.is_empty() {
                return Err(ConfigError::MissingPassword);
            }

            Some(Credentials { username, password })
        } else {
            None
        };

        Ok(Self {
            host,
            port,
            credentials,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_name: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolves_from_environment() {
        let env = env_of(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USERNAME", "user@example.com"),
            ("SMTP_PASSWORD", "secret"),
        ]);
        let config = ConnectionConfig::resolve(&ConfigOverrides::default(), env).unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "user@example.com");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_explicit_values_win_over_environment() {
        let env = env_of(&[
            ("SMTP_HOST", "env.example.com"),
            ("SMTP_PORT", "25"),
            ("SMTP_USERNAME", "env-user"),
            ("SMTP_PASSWORD", "env-pass"),
        ]);
        let overrides = ConfigOverrides {
            host: Some("explicit.example.com".into()),
            port: Some(2525),
            username: Some("explicit-user".into()),
            ..ConfigOverrides::default()
        };
        let config = ConnectionConfig::resolve(&overrides, env).unwrap();
        assert_eq!(config.host, "explicit.example.com");
        assert_eq!(config.port, 2525);
        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "explicit-user");
        assert_eq!(creds.password, "env-pass");
    }

    #[test]
    fn test_authentication_disabled_skips_credentials() {
        let overrides = ConfigOverrides {
            host: Some("smtp.example.com".into()),
            port: Some(25),
            authentication: Some(false),
            ..ConfigOverrides::default()
        };
        let config = ConnectionConfig::resolve(&overrides, no_env).unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_authentication_env_toggle() {
        let env = env_of(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "25"),
            ("SMTP_AUTHENTICATION", "false"),
        ]);
        let config = ConnectionConfig::resolve(&ConfigOverrides::default(), env).unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_unparsable_authentication_defaults_to_enabled() {
        let env = env_of(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "25"),
            ("SMTP_AUTHENTICATION", "yes please"),
        ]);
        let err = ConnectionConfig::resolve(&ConfigOverrides::default(), env).unwrap_err();
        assert_eq!(err, ConfigError::MissingUsername);
    }

    #[test]
    fn test_missing_host() {
        let err = ConnectionConfig::resolve(&ConfigOverrides::default(), no_env).unwrap_err();
        assert_eq!(err, ConfigError::MissingHost);
    }

    #[test]
    fn test_missing_port() {
        let env = env_of(&[("SMTP_HOST", "smtp.example.com")]);
        let err = ConnectionConfig::resolve(&ConfigOverrides::default(), env).unwrap_err();
        assert_eq!(err, ConfigError::MissingPort);
    }

    #[test]
    fn test_invalid_port() {
        let env = env_of(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_PORT", "smtp")]);
        let err = ConnectionConfig::resolve(&ConfigOverrides::default(), env).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("smtp".into()));
    }

    #[test]
    fn test_zero_port_is_invalid() {
        let overrides = ConfigOverrides {
            host: Some("smtp.example.com".into()),
            port: Some(0),
            authentication: Some(false),
            ..ConfigOverrides::default()
        };
        let err = ConnectionConfig::resolve(&overrides, no_env).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("0".into()));
    }

    #[test]
    fn test_missing_password() {
        let env = env_of(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USERNAME", "user@example.com"),
        ]);
        let err = ConnectionConfig::resolve(&ConfigOverrides::default(), env).unwrap_err();
        assert_eq!(err, ConfigError::MissingPassword);
    }
}
