//! Feed Command Integration Tests
//!
//! Checks the frames a feed writes: login, subscriptions under concurrent
//! callers, and behavior around `close()`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::time::timeout;

use nordnet_feed::{
    FeedChannels, FeedConfig, FeedError, FeedState, GetState, LoginArgs, PrivateFeed, PublicFeed,
    PublicMessage, Subscription,
};

const WAIT: Duration = Duration::from_secs(5);

async fn public_feed_over_duplex() -> (PublicFeed, FeedChannels<PublicMessage>, DuplexStream) {
    let (client, server) = tokio::io::duplex(1024 * 1024);
    let (feed, channels) = PublicFeed::from_connection(
        Box::new(client),
        &LoginArgs::new("ABC123", "NEXTAPI"),
        &FeedConfig::new("stub:0"),
    )
    .await
    .unwrap();
    (feed, channels, server)
}

#[tokio::test]
async fn private_login_with_state_request() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let login = LoginArgs::new("ABC123", "NEXTAPI").with_state(GetState {
        deleted_orders: true,
        days: Some(2),
    });
    let (_feed, _channels) =
        PrivateFeed::from_connection(Box::new(client), &login, &FeedConfig::new("stub:0"))
            .await
            .unwrap();

    let mut server = BufReader::new(server);
    let mut line = String::new();
    timeout(WAIT, server.read_line(&mut line)).await.unwrap().unwrap();

    let frame: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(
        frame,
        serde_json::json!({
            "cmd": "login",
            "args": {
                "session_key": "ABC123",
                "service": "NEXTAPI",
                "get_state": {"deleted_orders": true, "days": 2}
            }
        })
    );
}

#[tokio::test]
async fn concurrent_subscribes_never_interleave() {
    const TASKS: usize = 16;
    const PER_TASK: usize = 25;

    let (feed, _channels, server) = public_feed_over_duplex().await;
    let feed = Arc::new(feed);

    let mut handles = Vec::new();
    for task in 0..TASKS {
        let feed = Arc::clone(&feed);
        handles.push(tokio::spawn(async move {
            for n in 0..PER_TASK {
                let id = format!("{task}-{n}-{}", "x".repeat(200));
                feed.subscribe(Subscription::depth(id, 11)).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    feed.close().await.unwrap();

    let mut wire = String::new();
    timeout(WAIT, BufReader::new(server).read_to_string(&mut wire))
        .await
        .unwrap()
        .unwrap();

    let lines: Vec<&str> = wire.lines().collect();
    assert_eq!(lines.len(), 1 + TASKS * PER_TASK);

    let login: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(login["cmd"], "login");

    for line in &lines[1..] {
        let frame: serde_json::Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("corrupted frame {line:?}: {e}"));
        assert_eq!(frame["cmd"], "subscribe");
        assert_eq!(frame["args"]["t"], "depth");
        assert_eq!(frame["args"]["m"], 11);
    }
}

#[tokio::test]
async fn close_while_read_is_pending() {
    let (feed, mut channels, _server) = public_feed_over_duplex().await;

    // Nothing has been sent, so the loop is parked in a read.
    tokio::time::sleep(Duration::from_millis(20)).await;
    timeout(WAIT, feed.close()).await.unwrap().unwrap();

    assert!(timeout(WAIT, channels.messages.recv()).await.unwrap().is_none());

    let mut terminal_errors = 0;
    while let Some(error) = timeout(WAIT, channels.errors.recv()).await.unwrap() {
        assert!(error.is_terminal());
        terminal_errors += 1;
    }
    assert!(terminal_errors <= 1);
    assert_eq!(feed.state(), FeedState::Closed);
    assert!(!feed.is_alive());
}

#[tokio::test]
async fn close_shuts_down_the_write_half() {
    let (feed, _channels, mut server) = public_feed_over_duplex().await;
    feed.close().await.unwrap();

    let mut wire = Vec::new();
    timeout(WAIT, server.read_to_end(&mut wire)).await.unwrap().unwrap();
    assert!(wire.ends_with(b"}\n"));
    assert_eq!(wire.iter().filter(|b| **b == b'\n').count(), 1);
}

#[tokio::test]
async fn close_unblocks_writers_when_peer_stops_reading() {
    let (client, _server) = tokio::io::duplex(256);
    let (feed, mut channels) = PublicFeed::from_connection(
        Box::new(client),
        &LoginArgs::new("ABC123", "NEXTAPI"),
        &FeedConfig::new("stub:0"),
    )
    .await
    .unwrap();
    let feed = Arc::new(feed);

    let writers: Vec<_> = (0..4)
        .map(|n| {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move {
                let id = format!("{n}-{}", "x".repeat(4096));
                feed.subscribe(Subscription::depth(id, 11)).await
            })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(WAIT, feed.close()).await.unwrap().unwrap();

    for writer in writers {
        let result = timeout(WAIT, writer).await.unwrap().unwrap();
        assert!(matches!(result, Err(FeedError::Closed)));
    }
    assert!(timeout(WAIT, channels.messages.recv()).await.unwrap().is_none());
    assert!(!feed.is_alive());
}

#[tokio::test]
async fn commands_after_close_are_rejected() {
    let (feed, _channels, _server) = public_feed_over_duplex().await;
    feed.close().await.unwrap();

    assert!(matches!(
        feed.subscribe(Subscription::price("101", 11)).await,
        Err(FeedError::Closed)
    ));
    assert!(matches!(
        feed.unsubscribe(Subscription::price("101", 11)).await,
        Err(FeedError::Closed)
    ));
    assert!(matches!(
        feed.login(&LoginArgs::new("k", "NEXTAPI")).await,
        Err(FeedError::Closed)
    ));
}

#[tokio::test]
async fn messages_keep_flowing_while_commands_are_written() {
    let (feed, mut channels, server) = public_feed_over_duplex().await;
    let (mut server_read, mut server_write) = tokio::io::split(server);

    let drain = tokio::spawn(async move {
        let mut sink = Vec::new();
        server_read.read_to_end(&mut sink).await.unwrap();
        sink
    });

    server_write
        .write_all(b"{\"type\":\"heartbeat\",\"data\":{}}\n")
        .await
        .unwrap();
    feed.subscribe(Subscription::trading_status("101", 11))
        .await
        .unwrap();
    server_write
        .write_all(b"{\"type\":\"trading_status\",\"data\":{\"i\":\"101\",\"m\":11,\"status\":\"C\"}}\n")
        .await
        .unwrap();

    assert_eq!(
        timeout(WAIT, channels.messages.recv()).await.unwrap(),
        Some(PublicMessage::Heartbeat)
    );
    let Some(PublicMessage::TradingStatus(status)) =
        timeout(WAIT, channels.messages.recv()).await.unwrap()
    else {
        panic!("expected trading status");
    };
    assert_eq!(status.status, "C");

    feed.close().await.unwrap();
    let written = String::from_utf8(drain.await.unwrap()).unwrap();
    assert!(written.contains("\"t\":\"trading_status\""));
}
