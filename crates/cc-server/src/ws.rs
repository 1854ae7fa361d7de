//! Adapts an axum `WebSocket` to `cc_session`'s `ClientTransport`, the same
//! role `local_backend::subs::run_sync_socket` plays for the teacher's sync
//! protocol: frames are JSON text messages, `socket.split()` gives the
//! independent sink/source halves the Session pump and forward loop need.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use cc_proto::{ClientFrame, ServerFrame};
use cc_session::{ClientSink, ClientSource, ClientTransport};
use futures::{stream::SplitSink, stream::SplitStream, SinkExt, StreamExt};

pub struct AxumClientTransport(WebSocket);

impl AxumClientTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self(socket)
    }
}

pub struct AxumClientSink(SplitSink<WebSocket, Message>);
pub struct AxumClientSource(SplitStream<WebSocket>);

impl ClientTransport for AxumClientTransport {
    type Sink = AxumClientSink;
    type Source = AxumClientSource;

    fn split(self) -> (Self::Sink, Self::Source) {
        let (tx, rx) = self.0.split();
        (AxumClientSink(tx), AxumClientSource(rx))
    }
}

#[async_trait]
impl ClientSink for AxumClientSink {
    async fn send(&mut self, frame: ServerFrame) -> anyhow::Result<()> {
        let text = serde_json::to_string(&frame)?;
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| anyhow::anyhow!("websocket send failed: {e}"))
    }
}

#[async_trait]
impl ClientSource for AxumClientSource {
    async fn recv(&mut self) -> Option<anyhow::Result<ClientFrame>> {
        loop {
            let message = match self.0.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(anyhow::anyhow!("websocket read failed: {e}"))),
            };
            match message {
                Message::Text(text) => return Some(serde_json::from_str(&text).map_err(Into::into)),
                Message::Close(_) => return None,
                // Binary/ping/pong carry no protocol meaning here; axum
                // answers pings internally.
                _ => continue,
            }
        }
    }
}
