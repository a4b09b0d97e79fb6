//! Full socket-based integration tests for client ↔ relay communication.

use std::sync::Arc;
use std::time::Duration;

use race_client::publisher::InputState;
use race_client::roster::StaticModelLoader;
use race_client::{GameClient, SessionState};
use race_server::relay::bind_ephemeral;
use race_shared::config::RaceConfig;
use race_shared::net::{NetMsg, ReliableConn, Transform, PROTOCOL_VERSION};
use tokio::net::TcpStream;

fn test_cfg(server_addr: String, name: &str) -> RaceConfig {
    RaceConfig {
        server_addr,
        player_name: name.to_string(),
        connect_attempts: 3,
        connect_timeout_ms: 2_000,
    }
}

/// Polls `client` until `pred` holds or the deadline passes.
async fn poll_until(
    client: &mut GameClient,
    pred: impl Fn(&GameClient) -> bool,
) -> anyhow::Result<bool> {
    for _ in 0..200 {
        if pred(client) {
            return Ok(true);
        }
        client.poll(Duration::from_millis(10)).await?;
    }
    Ok(pred(client))
}

async fn start_relay() -> anyhow::Result<String> {
    let (server, cfg) = bind_ephemeral().await?;
    tokio::spawn(server.run());
    Ok(cfg.server_addr)
}

/// Scenario: Alice is racing, Bob arrives. Alice hears about Bob; Bob
/// gets Alice through the roster replay.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_notify_and_roster_replay() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let addr = start_relay().await?;

    let mut alice = GameClient::connect(&test_cfg(addr.clone(), "Alice"), Arc::new(StaticModelLoader)).await?;
    alice.join("Alice").await?;

    let mut bob = GameClient::connect(&test_cfg(addr, "Bob"), Arc::new(StaticModelLoader)).await?;
    bob.join("Bob").await?;

    assert!(
        poll_until(&mut bob, |c| c.roster.len() == 1).await?,
        "Bob never received the roster replay"
    );
    let alice_id = bob.roster.ids().next().unwrap().clone();
    assert_eq!(alice_id, alice.id);
    assert_eq!(bob.roster.get(&alice_id).unwrap().name, "Alice");

    assert!(
        poll_until(&mut alice, |c| c.roster.contains(&bob.id)).await?,
        "Alice never heard about Bob"
    );
    assert_eq!(alice.roster.get(&bob.id).unwrap().name, "Bob");
    assert_eq!(alice.roster.len(), 1, "Alice must not proxy herself");

    Ok(())
}

/// Scenario: Alice drives; Bob's proxy for Alice snaps to her reported
/// transform, and Alice never sees her own update come back.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn position_updates_reach_peers_only() -> anyhow::Result<()> {
    let addr = start_relay().await?;

    let mut alice = GameClient::connect(&test_cfg(addr.clone(), "Alice"), Arc::new(StaticModelLoader)).await?;
    alice.join("Alice").await?;
    let mut bob = GameClient::connect(&test_cfg(addr, "Bob"), Arc::new(StaticModelLoader)).await?;
    bob.join("Bob").await?;

    poll_until(&mut bob, |c| c.roster.contains(&alice.id)).await?;
    poll_until(&mut alice, |c| c.roster.contains(&bob.id)).await?;

    let spawn = alice.car.transform;
    for _ in 0..5 {
        alice
            .tick(InputState {
                accelerate: true,
                ..Default::default()
            })
            .await;
    }
    assert_ne!(alice.car.transform, spawn, "the car should have moved");

    let alice_id = alice.id.clone();
    assert!(
        poll_until(&mut bob, |c| {
            c.roster
                .get(&alice_id)
                .is_some_and(|p| p.transform != Transform::default())
        })
        .await?,
        "Bob never saw Alice move"
    );

    // Bob stayed put, so nothing may have touched Alice's proxy of him.
    alice.poll(Duration::from_millis(50)).await?;
    assert_eq!(
        alice.roster.get(&bob.id).unwrap().transform,
        Transform::default()
    );

    Ok(())
}

/// Scenario: Alice disconnects; Bob's table drops her and the registry no
/// longer replays her to newcomers.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_purges_everywhere() -> anyhow::Result<()> {
    let addr = start_relay().await?;

    let mut alice = GameClient::connect(&test_cfg(addr.clone(), "Alice"), Arc::new(StaticModelLoader)).await?;
    alice.join("Alice").await?;
    let mut bob = GameClient::connect(&test_cfg(addr.clone(), "Bob"), Arc::new(StaticModelLoader)).await?;
    bob.join("Bob").await?;
    poll_until(&mut bob, |c| c.roster.contains(&alice.id)).await?;

    alice.disconnect();
    assert_eq!(alice.state, SessionState::Disconnected);

    assert!(
        poll_until(&mut bob, |c| c.roster.is_empty()).await?,
        "Bob never received the leave notification"
    );

    // A newcomer's replay contains only Bob.
    let mut cleo = GameClient::connect(&test_cfg(addr, "Cleo"), Arc::new(StaticModelLoader)).await?;
    cleo.join("Cleo").await?;
    assert!(
        poll_until(&mut cleo, |c| c.roster.contains(&bob.id)).await?,
        "Cleo never received the roster replay"
    );
    assert_eq!(cleo.roster.len(), 1);

    Ok(())
}

/// Raw-socket check of the sender-exclusion invariant: a client that only
/// publishes never hears anything back while racing alone.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn own_updates_are_never_echoed() -> anyhow::Result<()> {
    let addr = start_relay().await?;

    let mut conn = ReliableConn::new(TcpStream::connect(&addr).await?);
    conn.send(&NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    })
    .await?;
    let NetMsg::Welcome { .. } = conn.recv().await? else {
        panic!("expected Welcome");
    };

    conn.send(&NetMsg::JoinAnnounce {
        name: "Solo".into(),
    })
    .await?;
    for _ in 0..3 {
        conn.send(&NetMsg::PositionUpdate(Transform::default())).await?;
    }

    let echoed = conn.recv_timeout(Duration::from_millis(200)).await?;
    assert_eq!(echoed, None, "relay echoed traffic back to its originator");

    Ok(())
}

/// A client that connects but never joins must not disturb anyone.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_connection_is_harmless() -> anyhow::Result<()> {
    let addr = start_relay().await?;

    let mut alice = GameClient::connect(&test_cfg(addr.clone(), "Alice"), Arc::new(StaticModelLoader)).await?;
    alice.join("Alice").await?;

    // Connect, handshake, say nothing, hang up.
    {
        let mut lurker = ReliableConn::new(TcpStream::connect(&addr).await?);
        lurker
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;
        let _ = lurker.recv().await?;
    }

    alice.poll(Duration::from_millis(100)).await?;
    assert!(alice.roster.is_empty());
    assert_eq!(alice.state, SessionState::Playing);

    Ok(())
}
