//! Configuration Module
//!
//! Configuration loading for the feed client.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, DEFAULT_SERVICE, FeedClientConfig, SessionCredentials,
};
