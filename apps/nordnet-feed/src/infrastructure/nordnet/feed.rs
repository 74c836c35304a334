//! Feed Client
//!
//! One feed connection: login on construction, a background dispatch loop
//! that decodes every inbound frame, and a shared writer for commands.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──► LoggingIn ──► Dispatching ──► Closed
//!   (open)      (write login)   (loop runs)    (close())
//! ```
//!
//! Login is written before the dispatch loop starts and is not
//! acknowledged; commands written afterwards follow it on the same ordered
//! stream. `close()` is the only transition to `Closed`. A feed never
//! reconnects.
//!
//! # Delivery
//!
//! Decoded messages go to [`FeedChannels::messages`] in wire order. Decode
//! failures go to [`FeedChannels::errors`] and the loop continues. A read
//! failure or EOF sends one terminal error and ends the loop; the message
//! channel then closes. An explicit `close()` ends the loop without an error.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, DEFAULT_MAX_FRAME_LENGTH};
use super::transport::{self, FrameReader, FrameWriter, TransportError, TransportMode};
use crate::application::ports::BoxedConnection;
use crate::domain::command::{Command, LoginArgs, Subscription};
use crate::domain::message::{DecodeError, FeedMessage, PrivateMessage, PublicMessage};
use crate::infrastructure::metrics;

/// Default capacity of the message and error channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on shutting down the write half in `close()`.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Error Type
// =============================================================================

/// Errors reported by a feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Opening, reading or writing the connection failed.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// One frame could not be decoded. The feed keeps running.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The feed was closed by the caller.
    #[error("feed is closed")]
    Closed,
}

impl FeedError {
    /// Whether the feed can no longer deliver messages after this error.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }

    const fn metric_label(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::ConnectionClosed => "closed",
            Self::Decode(_) => "decode",
            Self::Closed => "client_closed",
        }
    }
}

// =============================================================================
// Feed State
// =============================================================================

/// Lifecycle state of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FeedState {
    /// Transport is being opened.
    Connecting = 0,
    /// Login command is being written.
    LoggingIn = 1,
    /// Dispatch loop is running (or has ended on a connection error).
    Dispatching = 2,
    /// Closed by the caller. Terminal.
    Closed = 3,
}

impl FeedState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::LoggingIn,
            2 => Self::Dispatching,
            _ => Self::Closed,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::LoggingIn => "logging_in",
            Self::Dispatching => "dispatching",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Server address (`host:port`).
    pub address: String,
    /// TLS or plain TCP.
    pub mode: TransportMode,
    /// Capacity of the message and error channels.
    pub channel_capacity: usize,
    /// Longest accepted inbound frame in bytes.
    pub max_frame_length: usize,
}

impl FeedConfig {
    /// Create a TLS configuration with default limits.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            mode: TransportMode::Tls,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Set the transport mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the maximum frame length.
    #[must_use]
    pub const fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }
}

// =============================================================================
// Feed
// =============================================================================

/// Receiving ends of a feed.
#[derive(Debug)]
pub struct FeedChannels<M> {
    /// Decoded messages in wire order. Closes when the dispatch loop ends.
    pub messages: mpsc::Receiver<M>,
    /// Decode errors and at most one terminal error.
    pub errors: mpsc::Receiver<FeedError>,
}

/// A logged-in feed connection.
///
/// All methods take `&self` and may be called concurrently; writes are
/// serialized so frames never interleave.
pub struct Feed<M> {
    address: String,
    writer: tokio::sync::Mutex<FrameWriter>,
    state: AtomicU8,
    cancel: CancellationToken,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    _message: PhantomData<fn() -> M>,
}

/// Feed of order and trade events for the logged-in accounts.
pub type PrivateFeed = Feed<PrivateMessage>;

/// Feed of market data for subscribed instruments.
pub type PublicFeed = Feed<PublicMessage>;

impl<M: FeedMessage> Feed<M> {
    /// Connect to `config.address`, log in and start dispatching.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the login
    /// command cannot be written.
    pub async fn connect(
        config: &FeedConfig,
        login: &LoginArgs,
    ) -> Result<(Self, FeedChannels<M>), FeedError> {
        tracing::info!(
            feed = M::FEED,
            address = %config.address,
            mode = %config.mode,
            "Connecting to feed"
        );
        let connection = transport::connect(&config.address, config.mode).await?;
        Self::from_connection(connection, login, config).await
    }

    /// Log in over an already open connection and start dispatching.
    ///
    /// `config.address` is only used for logging; `config.mode` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the login command cannot be written.
    pub async fn from_connection(
        connection: BoxedConnection,
        login: &LoginArgs,
        config: &FeedConfig,
    ) -> Result<(Self, FeedChannels<M>), FeedError> {
        let (reader, writer) = transport::split(connection, config.max_frame_length);

        let feed = Self {
            address: config.address.clone(),
            writer: tokio::sync::Mutex::new(writer),
            state: AtomicU8::new(FeedState::Connecting as u8),
            cancel: CancellationToken::new(),
            task: parking_lot::Mutex::new(None),
            _message: PhantomData,
        };

        feed.set_state(FeedState::LoggingIn);
        feed.login(login).await?;

        let capacity = config.channel_capacity.max(1);
        let (message_tx, message_rx) = mpsc::channel(capacity);
        let (error_tx, error_rx) = mpsc::channel(capacity);

        feed.set_state(FeedState::Dispatching);
        let handle = tokio::spawn(dispatch::<M>(
            reader,
            message_tx,
            error_tx,
            feed.cancel.clone(),
            feed.address.clone(),
        ));
        *feed.task.lock() = Some(handle);

        tracing::info!(feed = M::FEED, address = %feed.address, "Feed dispatching");

        Ok((
            feed,
            FeedChannels {
                messages: message_rx,
                errors: error_rx,
            },
        ))
    }

    /// Write a login command.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed is closed or the write fails.
    pub async fn login(&self, login: &LoginArgs) -> Result<(), FeedError> {
        self.send(Command::Login(login.clone())).await
    }

    /// Write one command as a single frame.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] after `close()` or when `close()` is
    /// called while the write is blocked, or [`FeedError::Connection`] if
    /// the write fails.
    pub async fn send(&self, command: Command) -> Result<(), FeedError> {
        if self.state() == FeedState::Closed {
            return Err(FeedError::Closed);
        }

        let name = command.name();
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.send(&command).await.map_err(TransportError::from)
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(FeedError::Closed),
            result = write => result?,
        }

        metrics::record_command_sent(M::FEED, name);
        tracing::debug!(feed = M::FEED, command = name, "Command sent");
        Ok(())
    }

    /// Close the feed.
    ///
    /// Stops the dispatch loop, shuts down the connection and waits for the
    /// loop to exit. No error is reported on the error channel. Calling it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Connection`] if shutting down the write half
    /// fails. The feed is closed regardless.
    pub async fn close(&self) -> Result<(), FeedError> {
        let previous = self.state.swap(FeedState::Closed as u8, Ordering::AcqRel);
        if FeedState::from_u8(previous) == FeedState::Closed {
            return Ok(());
        }

        tracing::info!(feed = M::FEED, address = %self.address, "Closing feed");
        // Cancelling first releases the writer lock held by any blocked send.
        self.cancel.cancel();

        let shutdown = {
            let mut writer = self.writer.lock().await;
            match timeout(SHUTDOWN_TIMEOUT, writer.get_mut().shutdown()).await {
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        feed = M::FEED,
                        address = %self.address,
                        "Timed out shutting down connection"
                    );
                    Ok(())
                }
            }
        };

        let handle = self.task.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(feed = M::FEED, error = %e, "Dispatch task failed");
        }

        shutdown.map_err(|e| FeedError::Connection(CodecError::from(e).into()))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> FeedState {
        FeedState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the dispatch loop is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Server address of this feed.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    fn set_state(&self, state: FeedState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Feed<PublicMessage> {
    /// Subscribe to a topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed is closed or the write fails.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<(), FeedError> {
        tracing::info!(feed = PublicMessage::FEED, %subscription, "Subscribing");
        self.send(Command::Subscribe(subscription)).await
    }

    /// Unsubscribe from a topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed is closed or the write fails.
    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<(), FeedError> {
        tracing::info!(feed = PublicMessage::FEED, %subscription, "Unsubscribing");
        self.send(Command::Unsubscribe(subscription)).await
    }
}

impl<M> fmt::Debug for Feed<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("address", &self.address)
            .field("state", &FeedState::from_u8(self.state.load(Ordering::Acquire)))
            .finish_non_exhaustive()
    }
}

impl<M> Drop for Feed<M> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Dispatch Loop
// =============================================================================

enum Delivery {
    Delivered,
    ReceiverDropped,
    Cancelled,
}

async fn deliver<T>(tx: &mpsc::Sender<T>, value: T, cancel: &CancellationToken) -> Delivery {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Delivery::Cancelled,
        result = tx.send(value) => match result {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::ReceiverDropped,
        },
    }
}

async fn dispatch<M: FeedMessage>(
    mut reader: FrameReader,
    messages: mpsc::Sender<M>,
    errors: mpsc::Sender<FeedError>,
    cancel: CancellationToken,
    address: String,
) {
    metrics::feed_started(M::FEED);
    tracing::debug!(feed = M::FEED, address = %address, "Dispatch loop started");

    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(feed = M::FEED, "Dispatch loop cancelled");
                break;
            }
            frame = reader.next() => frame,
        };

        let terminal = match frame {
            Some(Ok(frame)) => {
                let started = Instant::now();
                match M::decode(&frame) {
                    Ok(message) => {
                        metrics::record_frame_received(M::FEED, message.message_type());
                        tracing::trace!(
                            feed = M::FEED,
                            message_type = message.message_type(),
                            "Frame received"
                        );
                        match deliver(&messages, message, &cancel).await {
                            Delivery::Delivered => {
                                metrics::record_dispatch_duration(M::FEED, started.elapsed());
                            }
                            Delivery::ReceiverDropped => {
                                tracing::info!(feed = M::FEED, "Message receiver dropped");
                                break;
                            }
                            Delivery::Cancelled => break,
                        }
                    }
                    Err(e) => {
                        metrics::record_decode_error(M::FEED);
                        tracing::warn!(
                            feed = M::FEED,
                            error = %e,
                            len = frame.len(),
                            "Failed to decode frame"
                        );
                        if let Delivery::Cancelled =
                            deliver(&errors, FeedError::Decode(e), &cancel).await
                        {
                            break;
                        }
                    }
                }
                continue;
            }
            Some(Err(e)) => FeedError::Connection(e.into()),
            None => FeedError::ConnectionClosed,
        };

        // A read that fails because of close() is not reported.
        if !cancel.is_cancelled() {
            metrics::record_connection_error(M::FEED, terminal.metric_label());
            tracing::warn!(
                feed = M::FEED,
                address = %address,
                error = %terminal,
                "Feed connection ended"
            );
            deliver(&errors, terminal, &cancel).await;
        }
        break;
    }

    metrics::feed_stopped(M::FEED);
    tracing::debug!(feed = M::FEED, address = %address, "Dispatch loop exited");
}
