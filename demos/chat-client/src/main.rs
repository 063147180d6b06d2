//! Joins a chat room and sends pings at a fixed rate.
//!
//! ```text
//! chat-client [ENDPOINT] [ROOM]
//! ```
//!
//! The room name picks the ping rate: `test1` pings every second, `test2`
//! every 100 ms, `test3` every 10 ms, and `test4` sends bursts of ten every
//! millisecond. Any other room pings once a second. Set `RUST_LOG=debug`
//! to see every frame.
//!
//! Exits when the server refuses the join, the room is left, or the
//! connection closes.

use std::time::Duration;

use roomlink::prelude::*;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Ping schedule
// ---------------------------------------------------------------------------

struct Schedule {
    every: Duration,
    burst: usize,
}

fn schedule_for(room: &str) -> Schedule {
    match room {
        "test2" => Schedule { every: Duration::from_millis(100), burst: 1 },
        "test3" => Schedule { every: Duration::from_millis(10), burst: 1 },
        "test4" => Schedule { every: Duration::from_millis(1), burst: 10 },
        _ => Schedule { every: Duration::from_secs(1), burst: 1 },
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Renders one patch operation as `messages.3 = "hi"`.
fn describe(op: &PatchOp) -> String {
    let path = op.path().tokens().join(".");
    match op {
        PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
            format!("{path} = {value}")
        }
        PatchOp::Remove { .. } => format!("{path} removed"),
        PatchOp::Move { from, .. } => {
            format!("{path} moved from {}", from.tokens().join("."))
        }
        PatchOp::Copy { from, .. } => {
            format!("{path} copied from {}", from.tokens().join("."))
        }
        PatchOp::Test { .. } => format!("{path} tested"),
    }
}

fn print_messages(state: &Value) {
    if let Some(messages) = state.get("messages").and_then(Value::as_array) {
        for message in messages {
            println!("  {}", message.as_str().unwrap_or_default());
        }
    }
}

/// What the main loop does after a room event.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Joined,
    /// The room refused the join or is gone.
    Stop,
}

fn on_room_event(room_name: &str, event: RoomEvent) -> Step {
    match event {
        RoomEvent::Joined { id } => {
            tracing::info!(room = %room_name, %id, "joined");
            return Step::Joined;
        }
        RoomEvent::Updated { state, patch: None } => {
            println!("state of {room_name}:");
            print_messages(&state);
        }
        RoomEvent::Patched(patch) => {
            for op in patch.ops() {
                println!("{}", describe(op));
            }
        }
        RoomEvent::Data(data) => println!("data: {data}"),
        RoomEvent::Error { message, .. } => {
            tracing::error!(room = %room_name, %message, "join refused");
            return Step::Stop;
        }
        RoomEvent::Left => {
            tracing::info!(room = %room_name, "left");
            return Step::Stop;
        }
        RoomEvent::Updated { .. } => {}
    }
    Step::Continue
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), RoomlinkError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let endpoint = args
        .next()
        .unwrap_or_else(|| ClientConfig::default().endpoint);
    let room_name = args.next().unwrap_or_else(|| "chat".to_string());

    let client = Client::builder().endpoint(&endpoint).build().await?;
    let mut connection = client.events().await;
    let room = client.join(&room_name, json!({})).await?;
    let mut room_events = room.events().await?;

    let schedule = schedule_for(&room_name);
    let mut ticker = tokio::time::interval(schedule.every);
    let mut ping = 0u64;
    let mut joined = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, leaving");
                if joined {
                    room.leave(true).await?;
                    // Give the server a moment to confirm.
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                client.close().await;
                return Ok(());
            }

            Some(event) = connection.recv() => match event {
                ClientEvent::Opened { identity } => {
                    tracing::info!(%identity, "connected");
                }
                ClientEvent::Error(e) => tracing::warn!(error = %e, "client error"),
                ClientEvent::Closed { reason } => {
                    tracing::info!(%reason, "disconnected");
                    return Ok(());
                }
                ClientEvent::Message { .. } => {}
            },

            Some(event) = room_events.recv() => match on_room_event(&room_name, event) {
                Step::Continue => {}
                Step::Joined => joined = true,
                Step::Stop => {
                    client.close().await;
                    return Ok(());
                }
            },

            _ = ticker.tick(), if joined => {
                for _ in 0..schedule.burst {
                    ping += 1;
                    room.send(json!({ "message": format!("ping: {ping}") }))
                        .await?;
                }
            }
        }
    }
}
