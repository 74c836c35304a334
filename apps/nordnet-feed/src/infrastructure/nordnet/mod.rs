//! Nordnet Feed Adapters
//!
//! Clients for the NEXT API push feeds:
//!
//! - **Private**: order and trade events for the logged-in accounts
//! - **Public**: prices, trades, depth, trading status, indicators and news
//!
//! Both speak newline-delimited JSON over TLS and share one generic client.

pub mod codec;
pub mod feed;
pub mod transport;

pub use codec::{CodecError, DEFAULT_MAX_FRAME_LENGTH, FrameCodec};
pub use feed::{
    DEFAULT_CHANNEL_CAPACITY, Feed, FeedChannels, FeedConfig, FeedError, FeedState, PrivateFeed,
    PublicFeed,
};
pub use transport::{
    FrameReader, FrameWriter, TransportError, TransportMode, connect, server_name_from_address,
    split,
};
