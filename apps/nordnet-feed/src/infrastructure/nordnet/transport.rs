//! Feed Transport
//!
//! Opens the byte stream to a feed server and splits it into a framed reader
//! and writer.
//!
//! Production feeds require TLS (rustls with the webpki root store, SNI from
//! the address host). Plain TCP exists for local stub servers.

use std::fmt;
use std::sync::{Arc, OnceLock};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::{CodecError, FrameCodec};
use crate::application::ports::BoxedConnection;

/// Inbound half: yields one undecoded frame per line.
pub type FrameReader = FramedRead<ReadHalf<BoxedConnection>, FrameCodec>;

/// Outbound half: writes one serialized value per line.
pub type FrameWriter = FramedWrite<WriteHalf<BoxedConnection>, FrameCodec>;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// TCP connect failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address that was dialed.
        address: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The address host is not a valid DNS name or IP address.
    #[error("invalid server name in address: {0}")]
    InvalidServerName(String),

    /// The TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] rustls::Error),

    /// TLS handshake failed.
    #[error("TLS handshake with {address} failed: {source}")]
    Handshake {
        /// Address that was dialed.
        address: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Framing failed on an open connection.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// How the feed connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// TLS over TCP.
    #[default]
    Tls,
    /// Unencrypted TCP.
    Plain,
}

impl TransportMode {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tls => "tls",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open a connection to `address` (`host:port`).
///
/// # Errors
///
/// Returns an error if the TCP connect or the TLS handshake fails, or if the
/// host is not a valid server name.
pub async fn connect(address: &str, mode: TransportMode) -> Result<BoxedConnection, TransportError> {
    tracing::debug!(address, mode = %mode, "Opening feed connection");

    let tcp = TcpStream::connect(address)
        .await
        .map_err(|source| TransportError::Connect {
            address: address.to_string(),
            source,
        })?;
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::warn!(address, error = %e, "Failed to set TCP_NODELAY");
    }

    match mode {
        TransportMode::Plain => Ok(Box::new(tcp)),
        TransportMode::Tls => {
            let server_name = server_name_from_address(address)?;
            let connector = TlsConnector::from(tls_config()?);
            let stream = connector.connect(server_name, tcp).await.map_err(|source| {
                TransportError::Handshake {
                    address: address.to_string(),
                    source,
                }
            })?;
            tracing::debug!(address, "TLS handshake complete");
            Ok(Box::new(stream))
        }
    }
}

/// Split a connection into framed halves.
#[must_use]
pub fn split(connection: BoxedConnection, max_frame_length: usize) -> (FrameReader, FrameWriter) {
    let (reader, writer) = tokio::io::split(connection);
    (
        FramedRead::new(reader, FrameCodec::new(max_frame_length)),
        FramedWrite::new(writer, FrameCodec::new(max_frame_length)),
    )
}

/// Extract the TLS server name from a `host:port` address.
///
/// IPv6 literals are accepted in brackets (`[::1]:443`); rustls expects
/// them without the brackets.
///
/// # Errors
///
/// Returns [`TransportError::InvalidServerName`] if the host is neither a
/// DNS name nor an IP address.
pub fn server_name_from_address(address: &str) -> Result<ServerName<'static>, TransportError> {
    let host = address.strip_prefix('[').map_or_else(
        || address.rsplit_once(':').map_or(address, |(host, _)| host),
        |rest| rest.split_once(']').map_or(rest, |(host, _)| host),
    );

    ServerName::try_from(host)
        .map(|name| name.to_owned())
        .map_err(|_| TransportError::InvalidServerName(address.to_string()))
}

fn tls_config() -> Result<Arc<ClientConfig>, TransportError> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

    if let Some(config) = CONFIG.get() {
        return Ok(Arc::clone(config));
    }

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(Arc::clone(CONFIG.get_or_init(|| Arc::new(config))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use test_case::test_case;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test_case("pub.api.test.nordnet.se:443", "pub.api.test.nordnet.se" ; "dns name")]
    #[test_case("127.0.0.1:443", "127.0.0.1" ; "ipv4")]
    #[test_case("[::1]:443", "::1" ; "bracketed ipv6")]
    #[test_case("feed.example.com", "feed.example.com" ; "no port")]
    fn server_name_from_address_strips_port(address: &str, expected: &str) {
        let name = server_name_from_address(address).unwrap();
        assert_eq!(name.to_str(), expected);
    }

    #[test]
    fn server_name_rejects_garbage() {
        assert!(matches!(
            server_name_from_address("not a host!:443"),
            Err(TransportError::InvalidServerName(_))
        ));
    }

    #[test]
    fn tls_config_is_shared() {
        let first = tls_config().unwrap();
        let second = tls_config().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn plain_connect_round_trips_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0_u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"{\"type\":\"heartbeat\"}\r\n").await.unwrap();
            buf.truncate(n);
            buf
        });

        let connection = connect(&address, TransportMode::Plain).await.unwrap();
        let (mut reader, mut writer) = split(connection, 1024);

        writer.send(serde_json::json!({"cmd": "x"})).await.unwrap();
        let frame = reader.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"{\"type\":\"heartbeat\"}");

        let received = server.await.unwrap();
        assert_eq!(received, b"{\"cmd\":\"x\"}\n");
    }

    #[tokio::test]
    async fn connect_refused_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect(&address, TransportMode::Plain).await.err().expect("connect should fail");
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.to_string().contains(&address));
    }
}
