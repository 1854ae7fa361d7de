//! Client transport abstraction for the Session state machine.
//!
//! Mirrors `local_backend::subs::run_sync_socket`'s `socket.split()`: a
//! duplex stream is split into an owned sink half and an owned source
//! half so the forward loop and the receive loop can run concurrently
//! without fighting over `&mut` access to one value. The axum WebSocket
//! binding in `cc-server` implements this trait; tests use an in-memory
//! channel pair.

use async_trait::async_trait;
use cc_proto::{ClientFrame, ServerFrame};

#[async_trait]
pub trait ClientSink: Send {
    async fn send(&mut self, frame: ServerFrame) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ClientSource: Send {
    /// `None` marks a clean end of stream; `Some(Err(_))` a malformed or
    /// dropped-connection read.
    async fn recv(&mut self) -> Option<anyhow::Result<ClientFrame>>;
}

pub trait ClientTransport: Send {
    type Sink: ClientSink;
    type Source: ClientSource;

    fn split(self) -> (Self::Sink, Self::Source);
}

/// In-memory transport pair for tests and for any in-process client.
pub struct ChannelClientTransport {
    pub to_client: tokio::sync::mpsc::Sender<ServerFrame>,
    pub from_client: tokio::sync::mpsc::Receiver<ClientFrame>,
}

pub struct ChannelClientSink(tokio::sync::mpsc::Sender<ServerFrame>);
pub struct ChannelClientSource(tokio::sync::mpsc::Receiver<ClientFrame>);

impl ChannelClientTransport {
    /// Returns the session-side transport alongside the "client" ends a
    /// test or demo driver uses to talk to it.
    pub fn pair() -> (
        Self,
        tokio::sync::mpsc::Sender<ClientFrame>,
        tokio::sync::mpsc::Receiver<ServerFrame>,
    ) {
        let (to_client_tx, to_client_rx) = tokio::sync::mpsc::channel(100);
        let (from_client_tx, from_client_rx) = tokio::sync::mpsc::channel(100);
        (
            ChannelClientTransport {
                to_client: to_client_tx,
                from_client: from_client_rx,
            },
            from_client_tx,
            to_client_rx,
        )
    }
}

impl ClientTransport for ChannelClientTransport {
    type Sink = ChannelClientSink;
    type Source = ChannelClientSource;

    fn split(self) -> (Self::Sink, Self::Source) {
        (ChannelClientSink(self.to_client), ChannelClientSource(self.from_client))
    }
}

#[async_trait]
impl ClientSink for ChannelClientSink {
    async fn send(&mut self, frame: ServerFrame) -> anyhow::Result<()> {
        self.0
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("client disconnected"))
    }
}

#[async_trait]
impl ClientSource for ChannelClientSource {
    async fn recv(&mut self) -> Option<anyhow::Result<ClientFrame>> {
        self.0.recv().await.map(Ok)
    }
}
