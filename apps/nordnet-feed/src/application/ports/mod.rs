//! Port Interfaces
//!
//! Defines the interfaces (ports) the feed is written against. These are the
//! contracts that infrastructure adapters must satisfy.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Connection`: a bidirectional byte stream to the feed server. The TLS
//!   socket, a plain TCP socket and `tokio::io::duplex` all qualify.

use tokio::io::{AsyncRead, AsyncWrite};

/// Bidirectional byte stream carrying newline-delimited JSON.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased connection owned by a feed.
pub type BoxedConnection = Box<dyn Connection>;
