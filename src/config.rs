use std::env;
use std::time::Duration;

use crate::errors::ObsError;

/// Connection settings for an OBS WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct ObsConfig {
    /// Host the obs-websocket server listens on (default: 127.0.0.1)
    pub host: String,

    /// Server port (default: 4455)
    pub port: u16,

    /// Shared secret; empty means the server has authentication disabled
    pub password: String,

    /// Bound on establishing the TCP + WebSocket session (default: 10s)
    pub connect_timeout: Duration,

    /// Bound on each request attempt's wait for its response (default: 30s)
    pub request_timeout: Duration,

    /// Additional attempts after a failed request dispatch (default: 3)
    pub max_retries: u32,

    /// Whether `ObsManager::new` connects immediately (default: true)
    pub auto_connect: bool,

    /// Suggested log verbosity, e.g. "info"; the crate only records it,
    /// the host application decides how to initialize logging
    pub log_level: String,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4455,
            password: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            auto_connect: true,
            log_level: "info".to_string(),
        }
    }
}

impl ObsConfig {
    /// Loads the configuration from `OBS_`-prefixed environment
    /// variables, falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ObsError> {
        Self::from_env_prefixed("OBS_")
    }

    /// Same as [`ObsConfig::from_env`] with a caller-chosen prefix.
    ///
    /// Recognized variables (shown for the default prefix): `OBS_HOST`,
    /// `OBS_PORT`, `OBS_PASSWORD`, `OBS_TIMEOUT` (seconds, fractional
    /// allowed), `OBS_REQUEST_TIMEOUT`, `OBS_MAX_RETRIES`,
    /// `OBS_AUTO_CONNECT`, `OBS_LOG_LEVEL`.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, ObsError> {
        let defaults = Self::default();

        let config = Self {
            host: env_string(prefix, "HOST").unwrap_or(defaults.host),
            port: match env_string(prefix, "PORT") {
                Some(raw) => raw.parse().map_err(|_| {
                    ObsError::Configuration(format!("{prefix}PORT is not a valid port: {raw}"))
                })?,
                None => defaults.port,
            },
            password: env_string(prefix, "PASSWORD").unwrap_or(defaults.password),
            connect_timeout: match env_string(prefix, "TIMEOUT") {
                Some(raw) => parse_seconds(prefix, "TIMEOUT", &raw)?,
                None => defaults.connect_timeout,
            },
            request_timeout: match env_string(prefix, "REQUEST_TIMEOUT") {
                Some(raw) => parse_seconds(prefix, "REQUEST_TIMEOUT", &raw)?,
                None => defaults.request_timeout,
            },
            max_retries: match env_string(prefix, "MAX_RETRIES") {
                Some(raw) => raw.parse().map_err(|_| {
                    ObsError::Configuration(format!(
                        "{prefix}MAX_RETRIES is not a valid count: {raw}"
                    ))
                })?,
                None => defaults.max_retries,
            },
            auto_connect: match env_string(prefix, "AUTO_CONNECT") {
                Some(raw) => matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes"),
                None => defaults.auto_connect,
            },
            log_level: env_string(prefix, "LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the numeric ranges; called by the client constructor so a
    /// malformed config never reaches the wire.
    pub fn validate(&self) -> Result<(), ObsError> {
        if self.port == 0 {
            return Err(ObsError::Configuration(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ObsError::Configuration(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ObsError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }
}

fn env_string(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{prefix}{name}")).ok()
}

fn parse_seconds(prefix: &str, name: &str, raw: &str) -> Result<Duration, ObsError> {
    let seconds: f64 = raw.parse().map_err(|_| {
        ObsError::Configuration(format!("{prefix}{name} is not a valid duration: {raw}"))
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ObsError::Configuration(format!(
            "{prefix}{name} is not a valid duration: {raw}"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ObsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.websocket_url(), "ws://127.0.0.1:4455");
    }

    #[test]
    fn from_env_overrides_defaults() {
        env::set_var("OBSCFG1_HOST", "192.168.1.20");
        env::set_var("OBSCFG1_PORT", "4460");
        env::set_var("OBSCFG1_TIMEOUT", "2.5");
        env::set_var("OBSCFG1_MAX_RETRIES", "5");
        env::set_var("OBSCFG1_AUTO_CONNECT", "no");

        let config = ObsConfig::from_env_prefixed("OBSCFG1_").unwrap();
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.port, 4460);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_retries, 5);
        assert!(!config.auto_connect);
        // untouched fields keep their defaults
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn from_env_rejects_malformed_values() {
        env::set_var("OBSCFG2_PORT", "not-a-port");
        let err = ObsConfig::from_env_prefixed("OBSCFG2_").unwrap_err();
        assert!(matches!(err, ObsError::Configuration(_)));

        env::remove_var("OBSCFG2_PORT");
        env::set_var("OBSCFG2_TIMEOUT", "-1");
        let err = ObsConfig::from_env_prefixed("OBSCFG2_").unwrap_err();
        assert!(matches!(err, ObsError::Configuration(_)));
    }

    #[test]
    fn validate_rejects_zero_ranges() {
        let config = ObsConfig::default().with_port(0);
        assert!(matches!(
            config.validate(),
            Err(ObsError::Configuration(_))
        ));

        let config = ObsConfig::default().with_connect_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ObsError::Configuration(_))
        ));
    }
}
