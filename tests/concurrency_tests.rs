mod test_helpers;

use chat_relay_server::client::RelayClient;
use chat_relay_server::protocol::{Frame, MessageType};
use std::sync::Arc;
use test_helpers::{expect_silence, join_client, recv_frame, start_test_relay};
use tokio::sync::Barrier;

/// Many connections joining the same room at once all end up as members exactly once.
#[tokio::test]
async fn test_concurrent_joins_register_every_member() {
    let relay = start_test_relay().await;
    let clients = 16usize;
    let barrier = Arc::new(Barrier::new(clients));

    let mut handles = Vec::new();
    for i in 0..clients {
        let addr = relay.addr;
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let mut client = RelayClient::connect(addr).await.unwrap();
            barrier.wait().await;
            client.join(&format!("player{i}"), "arena").await.unwrap();
            client
        }));
    }

    let mut connected = Vec::new();
    for handle in handles {
        connected.push(handle.await.unwrap());
    }

    let snapshot = relay
        .wait_for(|snapshot| snapshot.members("arena").is_some_and(|m| m.len() == clients))
        .await;
    let mut members = snapshot.members("arena").unwrap().to_vec();
    members.sort();
    members.dedup();
    assert_eq!(members.len(), clients);
    drop(connected);
}

/// Every member receives exactly one copy of a message sent into one shared room.
#[tokio::test]
async fn test_fan_out_reaches_every_member_once() {
    let relay = start_test_relay().await;
    let mut listeners = Vec::new();
    for i in 0..8 {
        listeners.push(join_client(&relay, &format!("listener{i}"), "hall").await);
    }
    let mut speaker = join_client(&relay, "speaker", "hall").await;

    speaker.send_text("announcement").await.unwrap();

    for listener in &mut listeners {
        // Skip the join notices of everyone who arrived later.
        loop {
            let frame = recv_frame(listener).await;
            if frame.message_type() == MessageType::Text {
                assert_eq!(frame, Frame::text("announcement", "speaker"));
                break;
            }
        }
        expect_silence(listener).await;
    }
}

/// Messages from concurrent senders arrive intact and in per-sender order.
#[tokio::test]
async fn test_concurrent_senders_keep_per_sender_order() {
    let relay = start_test_relay().await;
    let mut observer = join_client(&relay, "observer", "lobby").await;
    let mut senders = Vec::new();
    for name in ["a", "b", "c"] {
        senders.push((name, join_client(&relay, name, "lobby").await));
    }
    for _ in 0..3 {
        let frame = recv_frame(&mut observer).await;
        assert_eq!(frame.message_type(), MessageType::Notification);
    }

    let per_sender = 20;
    let mut handles = Vec::new();
    for (name, mut client) in senders {
        handles.push(tokio::spawn(async move {
            for seq in 0..per_sender {
                client.send_text(&format!("{name}-{seq}")).await.unwrap();
            }
            client
        }));
    }
    let mut keep_alive = Vec::new();
    for handle in handles {
        keep_alive.push(handle.await.unwrap());
    }

    let mut next_seq = std::collections::HashMap::new();
    let mut texts = 0;
    while texts < 3 * per_sender {
        let frame = recv_frame(&mut observer).await;
        let Frame::Text(payload) = frame else {
            continue;
        };
        texts += 1;
        let expected = next_seq.entry(payload.sender_name.clone()).or_insert(0);
        assert_eq!(payload.body, format!("{}-{}", payload.sender_name, expected));
        *expected += 1;
    }
    assert!(next_seq.values().all(|&count| count == per_sender));
}
