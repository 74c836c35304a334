//! Domain Layer - Wire protocol types of the feed.
//!
//! Outbound commands and inbound messages, with their JSON encodings.
//! Nothing here performs I/O.

/// Outbound commands (login, subscribe, unsubscribe).
pub mod command;

/// Inbound messages of the private and public feeds.
pub mod message;
