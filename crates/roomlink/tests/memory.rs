//! Drives a full client over an in-process connection, with the test
//! playing the server.

use std::time::Duration;

use roomlink::prelude::*;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(2);

fn start() -> (Client, MemoryPeer) {
    let (conn, peer) = MemoryConnection::pair();
    (Client::with_connection(conn), peer)
}

fn frame(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).expect("encode")
}

/// Waits for the next frame the client sent and decodes it.
async fn sent(peer: &mut MemoryPeer) -> Value {
    let bytes = tokio::time::timeout(WAIT, peer.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("client hung up");
    serde_json::from_slice(&bytes).expect("client sent invalid JSON")
}

async fn next<E>(events: &mut UnboundedReceiver<E>) -> E {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Joins `name`, opens the connection as `"abc"` and acks the join as
/// `id`. Frames are processed in order, so the client is open by the time
/// `Joined` arrives.
async fn joined_room(
    client: &Client,
    peer: &mut MemoryPeer,
    name: &str,
    id: u64,
) -> (Room, UnboundedReceiver<RoomEvent>) {
    let room = client.join(name, Value::Null).await.unwrap();
    let mut events = room.events().await.unwrap();
    assert_eq!(sent(peer).await, json!([10, name, null]));

    peer.send(frame(json!([1, "abc"]))).unwrap();
    peer.send(frame(json!([10, id, name]))).unwrap();
    assert_eq!(next(&mut events).await, RoomEvent::Joined { id: RoomId(id) });
    (room, events)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_identity_opens_connection() {
    let (client, peer) = start();
    assert!(!client.is_open().await);

    peer.send(frame(json!([1, "abc"]))).unwrap();

    // The first subscriber sees Opened even if it subscribes late.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut events = client.events().await;
    match next(&mut events).await {
        ClientEvent::Opened { identity } => assert_eq!(identity, "abc"),
        other => panic!("expected Opened, got {other:?}"),
    }
    assert_eq!(client.identity().await.as_deref(), Some("abc"));
    assert!(client.is_open().await);
}

#[tokio::test]
async fn test_join_snapshot_and_patches() {
    let (client, mut peer) = start();
    let (room, mut events) = joined_room(&client, &mut peer, "chat", 7).await;

    assert_eq!(room.id().await, Some(RoomId(7)));
    assert_eq!(room.status().await, RoomStatus::Joined);
    assert_eq!(client.room_count().await, 1);

    peer.send(frame(json!([14, 7, {"messages": ["hello"]}, 1000, 20])))
        .unwrap();
    assert!(matches!(
        next(&mut events).await,
        RoomEvent::Updated { patch: None, .. }
    ));

    peer.send(frame(json!([
        15,
        7,
        [{"op": "add", "path": "/messages/1", "value": "hi"}]
    ])))
    .unwrap();
    assert!(matches!(next(&mut events).await, RoomEvent::Patched(_)));
    match next(&mut events).await {
        RoomEvent::Updated { state, patch } => {
            assert_eq!(state, json!({"messages": ["hello", "hi"]}));
            assert_eq!(patch.map(|p| p.len()), Some(1));
        }
        other => panic!("expected Updated, got {other:?}"),
    }

    assert_eq!(
        room.state().await,
        Some(json!({"messages": ["hello", "hi"]}))
    );
    assert_eq!(
        room.previous_state().await,
        Some(json!({"messages": ["hello"]}))
    );
    assert_eq!(
        room.remote_clock().await,
        Some(RemoteClock {
            current_time: 1000.0,
            elapsed: 20.0,
        })
    );
}

#[tokio::test]
async fn test_join_error_reported_on_room_and_connection() {
    let (client, mut peer) = start();
    let mut client_events = client.events().await;
    let room = client.join("chat", Value::Null).await.unwrap();
    let mut room_events = room.events().await.unwrap();
    sent(&mut peer).await;

    peer.send(frame(json!([11, "chat", "room full"]))).unwrap();

    match next(&mut room_events).await {
        RoomEvent::Error { message, detail } => {
            assert_eq!(message, "room full");
            assert_eq!(detail, vec![json!("room full")]);
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert!(matches!(
        next(&mut client_events).await,
        ClientEvent::Error(ClientError::JoinRejected { .. })
    ));
    assert_eq!(client.room_count().await, 0);
    assert_eq!(room.status().await, RoomStatus::Left);

    // The connection is still usable.
    client.join("lobby", Value::Null).await.unwrap();
    assert_eq!(sent(&mut peer).await, json!([10, "lobby", null]));
}

#[tokio::test]
async fn test_only_joins_go_out_before_identity() {
    let (client, mut peer) = start();
    let mut events = client.events().await;
    let room = client.join("chat", Value::Null).await.unwrap();
    assert_eq!(sent(&mut peer).await, json!([10, "chat", null]));

    assert!(matches!(
        room.send(json!("too soon")).await,
        Err(RoomlinkError::Pending)
    ));
    assert!(matches!(
        client.send(vec![json!(13), json!(0), json!("too soon")]).await,
        Err(RoomlinkError::Pending)
    ));
    assert!(matches!(room.leave(true).await, Err(RoomlinkError::Pending)));
    assert!(peer.try_recv().is_none());

    peer.send(frame(json!([1, "abc"]))).unwrap();
    assert!(matches!(next(&mut events).await, ClientEvent::Opened { .. }));
    room.send(json!("now")).await.unwrap();
    assert_eq!(sent(&mut peer).await, json!([13, 0, "now"]));
}

#[tokio::test]
async fn test_room_send_before_and_after_ack() {
    let (client, mut peer) = start();
    let mut client_events = client.events().await;
    peer.send(frame(json!([1, "abc"]))).unwrap();
    next(&mut client_events).await;

    let room = client.join("chat", Value::Null).await.unwrap();
    sent(&mut peer).await;

    room.send(json!({"message": "early"})).await.unwrap();
    assert_eq!(sent(&mut peer).await, json!([13, 0, {"message": "early"}]));

    let mut events = room.events().await.unwrap();
    peer.send(frame(json!([10, 7, "chat"]))).unwrap();
    next(&mut events).await;

    room.send(json!({"message": "late"})).await.unwrap();
    assert_eq!(sent(&mut peer).await, json!([13, 7, {"message": "late"}]));
}

#[tokio::test]
async fn test_room_data_fans_out() {
    let (client, mut peer) = start();
    let mut client_events = client.events().await;
    let (_room, mut room_events) =
        joined_room(&client, &mut peer, "chat", 7).await;
    assert!(matches!(next(&mut client_events).await, ClientEvent::Opened { .. }));

    peer.send(frame(json!([13, 7, {"message": "ping"}]))).unwrap();

    assert_eq!(
        next(&mut room_events).await,
        RoomEvent::Data(json!({"message": "ping"}))
    );
    match next(&mut client_events).await {
        ClientEvent::Message { room, data } => {
            assert_eq!(room, RoomAddress::Id(RoomId(7)));
            assert_eq!(data, json!({"message": "ping"}));
        }
        other => panic!("expected Message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_leave_waits_for_server() {
    let (client, mut peer) = start();
    let (room, mut events) = joined_room(&client, &mut peer, "chat", 7).await;

    room.leave(true).await.unwrap();
    assert_eq!(sent(&mut peer).await, json!([12, 7]));
    assert_eq!(room.status().await, RoomStatus::Leaving);

    peer.send(frame(json!([12, 7]))).unwrap();
    assert_eq!(next(&mut events).await, RoomEvent::Left);
    assert_eq!(room.status().await, RoomStatus::Left);
    assert_eq!(client.room_count().await, 0);

    assert!(matches!(
        room.send(json!("anyone?")).await,
        Err(RoomlinkError::Room(_))
    ));
}

#[tokio::test]
async fn test_garbage_does_not_stop_processing() {
    let (client, peer) = start();
    let mut events = client.events().await;

    peer.send(b"}{".to_vec()).unwrap();
    peer.send(frame(json!([99, "from the future"]))).unwrap();
    peer.send(frame(json!(["also", "from the future"]))).unwrap();
    peer.send(frame(json!([1, "abc"]))).unwrap();

    assert!(matches!(
        next(&mut events).await,
        ClientEvent::Error(ClientError::Decode(_))
    ));
    assert!(matches!(
        next(&mut events).await,
        ClientEvent::Opened { .. }
    ));
}

#[tokio::test]
async fn test_frames_processed_in_arrival_order() {
    let (client, mut peer) = start();
    let (room, mut events) = joined_room(&client, &mut peer, "counter", 1).await;

    peer.send(frame(json!([14, 1, {"n": 0}, 0, 0]))).unwrap();
    for n in 1..=50 {
        peer.send(frame(json!([
            15,
            1,
            [{"op": "replace", "path": "/n", "value": n}]
        ])))
        .unwrap();
    }

    next(&mut events).await; // snapshot
    for n in 1..=50 {
        assert!(matches!(next(&mut events).await, RoomEvent::Patched(_)));
        match next(&mut events).await {
            RoomEvent::Updated { state, .. } => assert_eq!(state, json!({"n": n})),
            other => panic!("expected Updated, got {other:?}"),
        }
    }
    assert_eq!(room.state().await, Some(json!({"n": 50})));
}

#[tokio::test]
async fn test_concurrent_sends_are_serialized() {
    let (client, mut peer) = start();
    let mut events = client.events().await;
    peer.send(frame(json!([1, "abc"]))).unwrap();
    next(&mut events).await;
    let client = std::sync::Arc::new(client);

    let mut tasks = Vec::new();
    for task in 0..4 {
        let client = std::sync::Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                client
                    .send(vec![json!(13), json!(0), json!([task, i])])
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut per_task = [0usize; 4];
    for _ in 0..100 {
        let frame = sent(&mut peer).await;
        let task = frame[2][0].as_u64().unwrap() as usize;
        let i = frame[2][1].as_u64().unwrap() as usize;
        // Each caller's frames keep their relative order.
        assert_eq!(i, per_task[task]);
        per_task[task] += 1;
    }
    assert_eq!(per_task, [25; 4]);
}

#[tokio::test]
async fn test_server_hangup_leaves_all_rooms() {
    let (client, mut peer) = start();
    let mut client_events = client.events().await;
    let (room, mut room_events) =
        joined_room(&client, &mut peer, "chat", 7).await;

    drop(peer);

    assert_eq!(next(&mut room_events).await, RoomEvent::Left);
    assert!(matches!(next(&mut client_events).await, ClientEvent::Opened { .. }));
    match next(&mut client_events).await {
        ClientEvent::Closed { reason } => assert_eq!(reason, "closed by server"),
        other => panic!("expected Closed, got {other:?}"),
    }
    assert_eq!(room.status().await, RoomStatus::Left);
    assert!(!client.is_open().await);
    assert!(matches!(
        client.join("chat", Value::Null).await,
        Err(RoomlinkError::NotOpen)
    ));
}

#[tokio::test]
async fn test_close_flushes_and_leaves() {
    let (client, mut peer) = start();
    let mut client_events = client.events().await;
    let (room, mut room_events) =
        joined_room(&client, &mut peer, "chat", 7).await;

    room.send(json!({"message": "bye"})).await.unwrap();
    client.close().await;

    assert_eq!(sent(&mut peer).await, json!([13, 7, {"message": "bye"}]));
    assert_eq!(next(&mut room_events).await, RoomEvent::Left);
    assert!(matches!(next(&mut client_events).await, ClientEvent::Opened { .. }));
    match next(&mut client_events).await {
        ClientEvent::Closed { reason } => assert_eq!(reason, "closed by client"),
        other => panic!("expected Closed, got {other:?}"),
    }
    assert_eq!(client.room_count().await, 0);

    // A second close is harmless.
    client.close().await;
}
