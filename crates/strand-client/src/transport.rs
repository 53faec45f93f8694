//! Transport seam between the provider and the wire.
//!
//! The provider drives a [`Connector`] that yields a split send/receive pair
//! per connection attempt. Production code uses [`WsConnector`]; tests use
//! the in-memory connector in [`crate::testing`].

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::warn;

use strand_protocol::ClientFrame;

use crate::errors::ClientError;

/// Opens connections. One call per attempt; the provider never holds more
/// than one live pair at a time.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`, returning the send and receive halves.
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), ClientError>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait ConnectionTx: Send {
    /// Send one client frame.
    async fn send(&mut self, frame: ClientFrame) -> Result<(), ClientError>;
    /// Close the connection gracefully.
    async fn close(&mut self);
}

/// Inbound half of a connection. `None` means the connection is closed;
/// transport errors are logged and reported as a close, since the close
/// event is the single recovery trigger.
#[async_trait]
pub trait ConnectionRx: Send {
    /// Receive the next text payload.
    async fn recv(&mut self) -> Option<String>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector over tokio-tungstenite.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), ClientError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let (sink, stream) = stream.split();
        Ok((Box::new(WsTx { sink }), Box::new(WsRx { stream })))
    }
}

struct WsTx {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ConnectionTx for WsTx {
    async fn send(&mut self, frame: ClientFrame) -> Result<(), ClientError> {
        let text = frame.encode()?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

struct WsRx {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl ConnectionRx for WsRx {
    async fn recv(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return Some(text.to_owned()),
                    Err(_) => {
                        warn!(len = bytes.len(), "ignoring non-UTF8 binary frame");
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {} // ping/pong handled by the protocol layer
                Err(e) => {
                    warn!(error = %e, "websocket read error");
                    return None;
                }
            }
        }
    }
}
