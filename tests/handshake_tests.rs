//! End-to-end discovery scenarios
//!
//! Full managers talk over a `MemoryNetwork`, so every datagram they send is
//! recorded and can be checked for order and count.

mod common;

use std::time::Duration;

use common::*;
use pelotari::protocol::Message;
use pelotari::transport::MemoryNetwork;

// ─────────────────────────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_node_handshake() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 1);
    let b = node(&net, 2, 1);
    // Only A's discovery is heard, so A is the discoverer
    net.mute_broadcasts(ip(2));

    a.start().await;
    b.start().await;

    assert!(wait_until(|| a.contains(&ip(2)) && b.contains(&ip(1))).await);
    assert_eq!(a.peer_count(), 1);
    assert_eq!(b.peer_count(), 1);

    let discovery = first_sent(&net, Message::Discovery, ip(1)).unwrap();
    let response = first_sent(&net, Message::Response, ip(2)).unwrap();
    let confirm = first_sent(&net, Message::Confirm, ip(1)).unwrap();
    assert!(discovery < response);
    assert!(response < confirm);

    let sent = net.sent();
    assert_eq!(sent[response].to, unicast_addr(1));
    assert_eq!(sent[confirm].to, unicast_addr(2));

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn test_mutual_discovery() {
    let net = MemoryNetwork::new();
    let nodes: Vec<_> = (1..=3).map(|i| node(&net, i, 8)).collect();
    for n in &nodes {
        n.start().await;
    }

    assert!(wait_until(|| nodes.iter().all(|n| n.peer_count() == 2)).await);
    for (i, n) in nodes.iter().enumerate() {
        assert!(!n.contains(&ip(i as u8 + 1)), "node registered itself");
    }

    for n in &nodes {
        n.close().await;
    }
}

#[tokio::test]
async fn test_handshake_on_custom_unicast_port() {
    const PORT: u16 = 31450;
    let net = MemoryNetwork::new();
    let config = pelotari::ProtocolConfig::new(4, INTERVAL)
        .unwrap()
        .with_unicast_port(PORT);
    let (bc, uc) = net.join_with_unicast_port(ip(1), PORT);
    let a = pelotari::CommsManager::new(config, bc, uc);
    let (bc, uc) = net.join_with_unicast_port(ip(2), PORT);
    let b = pelotari::CommsManager::new(config, bc, uc);
    net.mute_broadcasts(ip(2));

    a.start().await;
    b.start().await;

    assert!(wait_until(|| a.contains(&ip(2)) && b.contains(&ip(1))).await);
    let sent = net.sent();
    let response = first_sent(&net, Message::Response, ip(2)).unwrap();
    let confirm = first_sent(&net, Message::Confirm, ip(1)).unwrap();
    assert_eq!(sent[response].to, std::net::SocketAddr::new(ip(1), PORT));
    assert_eq!(sent[confirm].to, std::net::SocketAddr::new(ip(2), PORT));

    a.close().await;
    b.close().await;
}

// ─────────────────────────────────────────────────────────────────
// Self-filtering and idempotence
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_lone_node_never_registers_itself() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 4);
    a.start().await;

    tokio::time::sleep(INTERVAL * 6).await;

    assert!(net.count_sent(Message::Discovery, ip(1)) >= 2);
    assert_eq!(net.count_sent(Message::Response, ip(1)), 0);
    assert_eq!(a.peer_count(), 0);
    a.close().await;
}

#[tokio::test]
async fn test_known_peer_gets_one_response() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 4);
    let b = node(&net, 2, 4);
    net.mute_broadcasts(ip(2));

    a.start().await;
    b.start().await;
    assert!(wait_until(|| b.contains(&ip(1))).await);

    // A is below capacity and keeps broadcasting; B must stay quiet
    let before = net.count_sent(Message::Discovery, ip(1));
    assert!(wait_until(|| net.count_sent(Message::Discovery, ip(1)) >= before + 3).await);
    assert_eq!(net.count_sent(Message::Response, ip(2)), 1);

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn test_unrecognized_payloads_are_inert() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 4);
    a.start().await;

    let payloads: [&[u8]; 5] = [b"pelotari", b"PELOTARI?", b"hor?", b"", b"aupa!aupa!"];
    for payload in payloads {
        net.inject_broadcast(payload, broadcast_addr(9));
        net.inject_unicast(payload, unicast_addr(9), unicast_addr(1));
    }
    tokio::time::sleep(INTERVAL * 4).await;

    assert_eq!(a.peer_count(), 0);
    assert_eq!(net.count_sent(Message::Response, ip(1)), 0);
    assert!(a.is_running());
    a.close().await;
}

// ─────────────────────────────────────────────────────────────────
// Capacity
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_node_stops_broadcasting() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 1);
    a.start().await;

    net.inject_unicast(b"dale!", unicast_addr(7), unicast_addr(1));
    assert!(wait_until(|| a.peer_count() == 1).await);
    // Let any in-flight tick finish
    tokio::time::sleep(INTERVAL * 2).await;

    let before = net.count_sent(Message::Discovery, ip(1));
    tokio::time::sleep(INTERVAL * 6).await;
    assert_eq!(net.count_sent(Message::Discovery, ip(1)), before);
    a.close().await;
}

#[tokio::test]
async fn test_responder_capacity_is_never_exceeded() {
    let net = MemoryNetwork::new();
    let c = node(&net, 3, 1);
    let a = node(&net, 1, 4);
    let b = node(&net, 2, 4);
    // C only answers; A and B only discover
    net.mute_broadcasts(ip(3));

    c.start().await;
    a.start().await;
    b.start().await;

    assert!(wait_until(|| a.contains(&ip(3)) && b.contains(&ip(3))).await);
    assert!(wait_until(|| c.peer_count() == 1).await);
    tokio::time::sleep(INTERVAL * 4).await;

    // Both discoverers believe they know C; C holds only one of them
    assert_eq!(c.peer_count(), 1);
    assert!(c.contains(&ip(1)) ^ c.contains(&ip(2)));

    for n in [&a, &b, &c] {
        n.close().await;
    }
}

#[tokio::test]
async fn test_discoverer_at_capacity_ignores_response() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 1);
    a.start().await;

    net.inject_unicast(b"dale!", unicast_addr(5), unicast_addr(1));
    assert!(wait_until(|| a.peer_count() == 1).await);

    net.inject_unicast(b"aupa!", unicast_addr(6), unicast_addr(1));
    tokio::time::sleep(INTERVAL * 2).await;

    assert!(!a.contains(&ip(6)));
    assert_eq!(net.count_sent(Message::Confirm, ip(1)), 0);
    a.close().await;
}

// ─────────────────────────────────────────────────────────────────
// Membership publication
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_yields_latest_snapshot() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 8);
    let mut membership = a.subscribe();
    a.start().await;

    for last in 10..15 {
        net.inject_unicast(b"dale!", unicast_addr(last), unicast_addr(1));
    }
    assert!(wait_until(|| a.peer_count() == 5).await);

    let snapshot = tokio::time::timeout(Duration::from_secs(1), membership.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 5);
    let ips: Vec<_> = snapshot.iter().map(|p| p.ip).collect();
    assert_eq!(ips, (10..15).map(ip).collect::<Vec<_>>());

    assert_eq!(a.peers().len(), 5);
    a.close().await;
}

// ─────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_restart_keeps_membership() {
    let net = MemoryNetwork::new();
    let a = node(&net, 1, 4);

    a.start().await;
    net.inject_unicast(b"dale!", unicast_addr(4), unicast_addr(1));
    assert!(wait_until(|| a.peer_count() == 1).await);
    a.stop().await;
    a.stop().await;

    // Nothing is processed while stopped
    net.inject_unicast(b"dale!", unicast_addr(5), unicast_addr(1));
    tokio::time::sleep(INTERVAL * 2).await;
    assert_eq!(a.peer_count(), 1);

    // The queued datagram is picked up by the next run
    a.start().await;
    assert!(wait_until(|| a.contains(&ip(5))).await);
    assert!(a.contains(&ip(4)));
    a.close().await;
}

#[tokio::test]
async fn test_stop_is_prompt_with_long_interval() {
    let net = MemoryNetwork::new();
    let (bc, uc) = net.join(ip(1));
    let config = pelotari::ProtocolConfig::new(4, Duration::from_secs(3600)).unwrap();
    let a = pelotari::CommsManager::new(config, bc, uc);

    a.start().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(1), a.stop())
        .await
        .expect("stop waited on the broadcast interval");
    assert!(!a.is_running());
}
