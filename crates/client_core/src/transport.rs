//! Stream-transport seam: the session owns a connection through this trait
//! so the realtime plumbing can be swapped out under test.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::protocol::{ClientFrame, StreamEvent};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};

const INBOUND_BUFFER: usize = 256;
const OUTBOUND_BUFFER: usize = 32;

/// Frames arriving from an open connection. `TransportError` corresponds to
/// the logical `connect_error` condition and is terminal for the link.
#[derive(Debug)]
pub enum InboundFrame {
    Event(StreamEvent),
    TransportError(String),
    Closed,
}

/// Channel pair handed out by a successful connect. Dropping the outbound
/// sender releases the underlying connection.
pub struct TransportLink {
    pub outbound: mpsc::Sender<ClientFrame>,
    pub inbound: mpsc::Receiver<InboundFrame>,
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Opens a connection to the event stream, attaching `credential` at
    /// handshake time.
    async fn connect(&self, base_url: &str, credential: &str) -> Result<TransportLink>;
}

/// Production transport: JSON text frames over a WebSocket.
pub struct WebSocketTransport;

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn connect(&self, base_url: &str, credential: &str) -> Result<TransportLink> {
        let ws_url = ws_url(base_url, credential)?;
        let (stream, _) = connect_async(&ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (mut writer, mut reader) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientFrame>(OUTBOUND_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundFrame>(INBOUND_BUFFER);

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "transport: dropping unencodable frame");
                        continue;
                    }
                };
                if writer.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = writer.send(WsMessage::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(message) = reader.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<StreamEvent>(&text) {
                        Ok(event) => {
                            if inbound_tx.send(InboundFrame::Event(event)).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            debug!(error = %err, "transport: skipping undecodable event");
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = inbound_tx
                            .send(InboundFrame::TransportError(err.to_string()))
                            .await;
                        break;
                    }
                }
            }
            let _ = inbound_tx.send(InboundFrame::Closed).await;
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn ws_url(base_url: &str, credential: &str) -> Result<String> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(anyhow!("base_url must start with http:// or https://"));
    };
    Ok(format!("{ws_base}/ws?token={credential}"))
}
