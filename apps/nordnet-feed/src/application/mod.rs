//! Application Layer - Port definitions.
//!
//! Contracts the feed depends on so that the transport can be swapped
//! (TLS socket in production, in-memory pipes in tests).

/// Port interfaces for external systems.
pub mod ports;
