//! In-process connection pair backed by Tokio channels.

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, TransportError};

/// The client half of an in-process connection.
///
/// Created with [`MemoryConnection::pair`]. Frames sent here arrive at the
/// matching [`MemoryPeer`], and vice versa.
pub struct MemoryConnection {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

/// The remote half of an in-process connection: plays the server.
///
/// Dropping the peer closes the connection from the remote side.
pub struct MemoryPeer {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryConnection {
    /// Creates a connected client/peer pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let conn = MemoryConnection {
            outbound: to_peer,
            inbound: Mutex::new(from_peer),
            closed,
        };
        let peer = MemoryPeer {
            outbound: to_client,
            inbound: from_client,
        };
        (conn, peer)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(
                "closed locally".into(),
            ));
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => Ok(frame),
            _ = closed.wait_for(|c| *c) => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed.send_replace(true);
        Ok(())
    }
}

impl MemoryPeer {
    /// Sends one frame to the client.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.outbound.send(data.into()).map_err(|_| {
            TransportError::ConnectionClosed("client dropped".into())
        })
    }

    /// Waits for the next frame the client sent.
    ///
    /// Returns `None` once the client half is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Returns a frame the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (conn, mut peer) = MemoryConnection::pair();

        conn.send(b"[10,\"chat\",null]").await.unwrap();
        assert_eq!(peer.recv().await.unwrap(), b"[10,\"chat\",null]");

        peer.send(b"[1,\"abc\"]".to_vec()).unwrap();
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"[1,\"abc\"]");
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_peer_dropped() {
        let (conn, peer) = MemoryConnection::pair();
        drop(peer);
        assert!(conn.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_close_ends_pending_recv() {
        let (conn, _peer) = MemoryConnection::pair();
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;
        conn.close().await.unwrap();

        let result = reader.await.unwrap().unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (conn, _peer) = MemoryConnection::pair();
        conn.close().await.unwrap();
        let err = conn.send(b"[]").await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }
}
