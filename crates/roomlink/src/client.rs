//! `Client` builder and connection driver.
//!
//! A client runs two Tokio tasks over one connection:
//!
//! - the **reader** is the single message-processing loop. It feeds every
//!   inbound frame to the [`Session`] in arrival order.
//! - the **writer** is the single send queue. Every outbound frame from
//!   any caller goes through it, so sends never interleave on the wire.

use std::sync::Arc;
use std::time::Duration;

use roomlink_transport::{Connection, WebSocketConnection};
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::{ClientConfig, ClientEvent, Room, RoomlinkError, Session};

/// Builder for configuring and connecting a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use roomlink::prelude::*;
///
/// # async fn run() -> Result<(), RoomlinkError> {
/// let client = Client::builder()
///     .endpoint("ws://127.0.0.1:2657")
///     .connect_timeout(Duration::from_secs(2))
///     .build()
///     .await?;
/// let room = client.join("chat", serde_json::Value::Null).await?;
/// room.send(serde_json::json!({"message": "hello"})).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket URL to dial.
    pub fn endpoint(mut self, url: &str) -> Self {
        self.config.endpoint = url.to_string();
        self
    }

    /// Sets how long to wait for the WebSocket handshake.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Dials the endpoint and starts the connection tasks.
    ///
    /// Returns as soon as the WebSocket is up. The server's identity
    /// arrives later as [`ClientEvent::Opened`].
    ///
    /// # Errors
    /// `RoomlinkError::ConnectTimeout` if the handshake takes longer than
    /// the configured timeout, or `RoomlinkError::Transport` if it fails.
    pub async fn build(self) -> Result<Client, RoomlinkError> {
        let ClientConfig {
            endpoint,
            connect_timeout,
        } = self.config;

        tracing::info!(%endpoint, "connecting");
        let conn = tokio::time::timeout(
            connect_timeout,
            WebSocketConnection::connect(&endpoint),
        )
        .await
        .map_err(|_| RoomlinkError::ConnectTimeout {
            endpoint: endpoint.clone(),
            timeout: connect_timeout,
        })??;

        tracing::info!(%endpoint, "connected");
        Ok(Client::with_connection(conn))
    }
}

/// A connection to a room server.
///
/// Dropping the client shuts the connection down. [`Room`] handles that
/// outlive it keep working as read-only views that report `Left`.
pub struct Client {
    session: Arc<Mutex<Session>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    /// Creates a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Runs a client over an already-open connection.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_connection<T: Connection>(conn: T) -> Self {
        let conn = Arc::new(conn);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let session = Arc::new(Mutex::new(Session::new(outbound_tx)));

        let writer = tokio::spawn(write_loop(
            Arc::clone(&conn),
            outbound_rx,
            shutdown.subscribe(),
        ));
        let reader = tokio::spawn(read_loop(
            conn,
            Arc::clone(&session),
            shutdown.subscribe(),
        ));

        Self {
            session,
            shutdown,
            tasks: Mutex::new(vec![reader, writer]),
        }
    }

    /// The identity the server assigned, once `Opened` has fired.
    pub async fn identity(&self) -> Option<String> {
        self.session.lock().await.identity().map(str::to_owned)
    }

    /// Returns `true` between `Opened` and `Closed`.
    pub async fn is_open(&self) -> bool {
        self.session.lock().await.is_open()
    }

    /// Subscribes to connection events.
    ///
    /// The first call also receives what was raised before it, so
    /// `Opened` is never missed. Only the most recent messages and errors
    /// are held back.
    pub async fn events(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.session.lock().await.subscribe()
    }

    /// Requests to join `name` and returns its handle right away.
    ///
    /// Joining a name that already has a pending join returns a handle to
    /// the same room. Completion shows up as the room's `Joined` event.
    ///
    /// # Errors
    /// `RoomlinkError::NotOpen` once the connection has closed.
    pub async fn join(
        &self,
        name: &str,
        options: Value,
    ) -> Result<Room, RoomlinkError> {
        let key = self.session.lock().await.join(name, options)?;
        Ok(Room::new(key, name, Arc::clone(&self.session)))
    }

    /// Sends a raw frame: a JSON array starting with an opcode.
    ///
    /// # Errors
    /// `RoomlinkError::Pending` before the identity arrives,
    /// `RoomlinkError::Protocol` for a frame without an opcode, or
    /// `RoomlinkError::NotOpen` once the connection has closed.
    pub async fn send(&self, frame: Vec<Value>) -> Result<(), RoomlinkError> {
        self.session.lock().await.send_raw(frame)
    }

    /// Number of rooms currently registered (pending, joined or leaving).
    pub async fn room_count(&self) -> usize {
        self.session.lock().await.registry().len()
    }

    /// Closes the connection.
    ///
    /// Frames already queued are flushed first. When this returns, every
    /// room has seen `Left` and `Closed` has fired. Calling it again does
    /// nothing.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);

        let tasks: Vec<JoinHandle<()>> =
            self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "connection task failed");
            }
        }
    }
}

/// The single message-processing loop.
async fn read_loop<T: Connection>(
    conn: Arc<T>,
    session: Arc<Mutex<Session>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let reason = loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                break "closed by client".to_string();
            }
            frame = conn.recv() => match frame {
                Ok(Some(data)) => session.lock().await.handle_frame(&data),
                Ok(None) => break "closed by server".to_string(),
                Err(e) => {
                    let reason = e.to_string();
                    session.lock().await.transport_error(reason.clone());
                    break reason;
                }
            },
        }
    };

    session.lock().await.transport_closed(reason);
}

/// The single send queue. Ends when the session drops its sender, on
/// shutdown, or on the first failed send, then closes the connection.
async fn write_loop<T: Connection>(
    conn: Arc<T>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = conn.send(&frame).await {
                    tracing::warn!(error = %e, "send failed");
                    break;
                }
            }
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "close failed");
    }
}

/// Resolves once `close()` was called or the client was dropped.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which also means shut down.
    let _ = shutdown.wait_for(|closing| *closing).await;
}
