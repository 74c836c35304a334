//! Feed Client Configuration Settings
//!
//! Configuration types for the feed client, loaded from environment
//! variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `NORDNET_SESSION_KEY` | required |
//! | `NORDNET_SERVICE` | `NEXTAPI` |
//! | `NORDNET_PUBLIC_FEED_ADDR` | unset |
//! | `NORDNET_PRIVATE_FEED_ADDR` | unset (one of the two is required) |
//! | `NORDNET_FEED_TLS` | `true` |
//! | `NORDNET_FEED_CHANNEL_CAPACITY` | `1024` |
//! | `NORDNET_FEED_MAX_FRAME_BYTES` | `1048576` |
//! | `NORDNET_SUBSCRIPTIONS` | empty |
//! | `NORDNET_GET_STATE_DAYS` | unset |
//! | `NORDNET_GET_STATE_DELETED_ORDERS` | `false` |
//! | `NORDNET_METRICS_PORT` | `0` |

use crate::domain::command::{GetState, LoginArgs, Subscription};
use crate::infrastructure::nordnet::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_FRAME_LENGTH, FeedConfig, TransportMode,
};

/// Service name used when `NORDNET_SERVICE` is unset.
pub const DEFAULT_SERVICE: &str = "NEXTAPI";

/// Session obtained from the REST login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    session_key: String,
    service: String,
}

impl SessionCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(session_key: String, service: String) -> Self {
        Self {
            session_key,
            service,
        }
    }

    /// Get the session key.
    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Get the service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Login arguments for these credentials.
    #[must_use]
    pub fn login_args(&self) -> LoginArgs {
        LoginArgs::new(self.session_key.clone(), self.service.clone())
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("session_key", &"[REDACTED]")
            .field("service", &self.service)
            .finish()
    }
}

/// Connection settings shared by both feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// TLS or plain TCP.
    pub mode: TransportMode,
    /// Capacity of each feed's message and error channels.
    pub channel_capacity: usize,
    /// Longest accepted inbound frame in bytes.
    pub max_frame_length: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            mode: TransportMode::Tls,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl ConnectionSettings {
    /// Feed configuration for `address` with these settings.
    #[must_use]
    pub fn feed_config(&self, address: &str) -> FeedConfig {
        FeedConfig::new(address)
            .with_mode(self.mode)
            .with_channel_capacity(self.channel_capacity)
            .with_max_frame_length(self.max_frame_length)
    }
}

/// Complete feed client configuration.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Session credentials.
    pub credentials: SessionCredentials,
    /// Public feed address, if the public feed is wanted.
    pub public_address: Option<String>,
    /// Private feed address, if the private feed is wanted.
    pub private_address: Option<String>,
    /// Settings shared by both feeds.
    pub connection: ConnectionSettings,
    /// Public feed subscriptions made after login.
    pub subscriptions: Vec<Subscription>,
    /// Days of order/trade state to request on private login.
    pub get_state_days: Option<u32>,
    /// Include deleted orders in the state requested on private login.
    pub get_state_deleted_orders: bool,
    /// Prometheus metrics port (0 = recorder only).
    pub metrics_port: u16,
}

impl FeedClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or a
    /// subscription cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`FeedClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_key = lookup("NORDNET_SESSION_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("NORDNET_SESSION_KEY".to_string()))?;

        if session_key.is_empty() {
            return Err(ConfigError::EmptyValue("NORDNET_SESSION_KEY".to_string()));
        }

        let service = lookup("NORDNET_SERVICE")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE.to_string());

        let public_address = lookup("NORDNET_PUBLIC_FEED_ADDR").filter(|s| !s.is_empty());
        let private_address = lookup("NORDNET_PRIVATE_FEED_ADDR").filter(|s| !s.is_empty());

        if public_address.is_none() && private_address.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "NORDNET_PUBLIC_FEED_ADDR or NORDNET_PRIVATE_FEED_ADDR".to_string(),
            ));
        }

        let defaults = ConnectionSettings::default();
        let use_tls = parse_env_bool(&lookup, "NORDNET_FEED_TLS", true);
        let connection = ConnectionSettings {
            mode: if use_tls {
                TransportMode::Tls
            } else {
                TransportMode::Plain
            },
            channel_capacity: parse_env_usize(
                &lookup,
                "NORDNET_FEED_CHANNEL_CAPACITY",
                defaults.channel_capacity,
            )
            .max(1),
            max_frame_length: parse_env_usize(
                &lookup,
                "NORDNET_FEED_MAX_FRAME_BYTES",
                defaults.max_frame_length,
            ),
        };

        let subscriptions = lookup("NORDNET_SUBSCRIPTIONS")
            .map(|value| parse_subscriptions(&value))
            .transpose()?
            .unwrap_or_default();

        let get_state_days = lookup("NORDNET_GET_STATE_DAYS").and_then(|v| v.parse().ok());

        Ok(Self {
            credentials: SessionCredentials::new(session_key, service),
            public_address,
            private_address,
            connection,
            subscriptions,
            get_state_days,
            get_state_deleted_orders: parse_env_bool(
                &lookup,
                "NORDNET_GET_STATE_DELETED_ORDERS",
                false,
            ),
            metrics_port: parse_env_u16(&lookup, "NORDNET_METRICS_PORT", 0),
        })
    }

    /// Public feed configuration, if an address is set.
    #[must_use]
    pub fn public_feed(&self) -> Option<FeedConfig> {
        self.public_address
            .as_deref()
            .map(|address| self.connection.feed_config(address))
    }

    /// Private feed configuration, if an address is set.
    #[must_use]
    pub fn private_feed(&self) -> Option<FeedConfig> {
        self.private_address
            .as_deref()
            .map(|address| self.connection.feed_config(address))
    }

    /// Login for the public feed.
    #[must_use]
    pub fn public_login(&self) -> LoginArgs {
        self.credentials.login_args()
    }

    /// Login for the private feed.
    ///
    /// Carries a state request when `get_state_days` is set or deleted
    /// orders are asked for.
    #[must_use]
    pub fn private_login(&self) -> LoginArgs {
        let login = self.credentials.login_args();
        if self.get_state_days.is_none() && !self.get_state_deleted_orders {
            return login;
        }
        login.with_state(GetState {
            deleted_orders: self.get_state_deleted_orders,
            days: self.get_state_days,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Parse failure.
        reason: String,
    },
}

fn parse_subscriptions(value: &str) -> Result<Vec<Subscription>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|e| ConfigError::InvalidValue {
                key: "NORDNET_SUBSCRIPTIONS".to_string(),
                reason: format!("{e}"),
            })
        })
        .collect()
}

fn parse_env_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_env_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .and_then(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
