//! Realtime session: connection lifecycle and routing of stream traffic
//! between the transport and the controller.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use shared::{
    domain::UserId,
    protocol::{ClientFrame, StreamEvent},
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::transport::{InboundFrame, StreamTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Uninitialized = 0,
    Connecting = 1,
    Connected = 2,
    Disconnected = 3,
    Closed = 4,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not connected")]
    NotConnected,
    #[error("a connection is already open or being opened")]
    AlreadyOpen,
    #[error("session has been closed")]
    Closed,
}

/// What the session reports to its owner. Stream events carry the inbound
/// traffic; the rest are lifecycle notifications.
#[derive(Debug)]
pub enum SessionEvent {
    Connected,
    Stream(StreamEvent),
    ConnectError(String),
    Disconnected,
}

/// Connection state cell shared with the pump task. Plain store/load; the
/// state machine transitions are driven from `&mut self` methods and the
/// single pump task.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Uninitialized,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnected,
            _ => ConnectionState::Closed,
        }
    }
}

/// Single owner of the stream connection. Exactly one connection may be
/// open at a time; re-opening is only legal from `Disconnected`.
pub struct RealtimeSession {
    transport: Arc<dyn StreamTransport>,
    base_url: String,
    state: Arc<StateCell>,
    outbound: Option<mpsc::Sender<ClientFrame>>,
    pump: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl RealtimeSession {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        base_url: impl Into<String>,
        events_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            state: Arc::new(StateCell::new(ConnectionState::Uninitialized)),
            outbound: None,
            pump: None,
            events_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Opens the connection, attaching `credential` at handshake time. On
    /// success the undelivered-replay request is the first frame out, then
    /// a pump task starts forwarding inbound traffic to the owner. Connect
    /// failure leaves the session `Disconnected`; the error is non-fatal
    /// and a later `open` may retry.
    pub async fn open(&mut self, credential: &str) -> Result<()> {
        match self.state() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                return Err(SessionError::AlreadyOpen.into());
            }
            ConnectionState::Closed => return Err(SessionError::Closed.into()),
            ConnectionState::Uninitialized | ConnectionState::Disconnected => {}
        }

        self.teardown_link();
        self.state.set(ConnectionState::Connecting);

        let link = match self.transport.connect(&self.base_url, credential).await {
            Ok(link) => link,
            Err(err) => {
                self.state.set(ConnectionState::Disconnected);
                warn!(error = %err, "session: connect failed");
                return Err(err);
            }
        };

        // Request redelivery of anything missed while disconnected before
        // any other outbound traffic.
        if link
            .outbound
            .send(ClientFrame::FetchUndelivered)
            .await
            .is_err()
        {
            self.state.set(ConnectionState::Disconnected);
            return Err(anyhow!("connection closed during handshake"));
        }

        self.state.set(ConnectionState::Connected);
        info!("session: connected");
        let _ = self.events_tx.send(SessionEvent::Connected).await;

        let state = Arc::clone(&self.state);
        let events_tx = self.events_tx.clone();
        let mut inbound = link.inbound;
        self.pump = Some(tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Some(InboundFrame::Event(event)) => {
                        if events_tx.send(SessionEvent::Stream(event)).await.is_err() {
                            return;
                        }
                    }
                    Some(InboundFrame::TransportError(reason)) => {
                        warn!(error = %reason, "session: stream error");
                        let _ = events_tx.send(SessionEvent::ConnectError(reason)).await;
                    }
                    Some(InboundFrame::Closed) | None => break,
                }
            }
            if state.get() != ConnectionState::Closed {
                state.set(ConnectionState::Disconnected);
            }
            debug!("session: stream ended");
            let _ = events_tx.send(SessionEvent::Disconnected).await;
        }));
        self.outbound = Some(link.outbound);

        Ok(())
    }

    /// Fire-and-forget compose frame; no acknowledgement is awaited.
    pub async fn send(&self, receiver: UserId, text: String) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(SessionError::NotConnected)?;
        outbound
            .send(ClientFrame::Message { receiver, text })
            .await
            .map_err(|_| SessionError::NotConnected)
    }

    /// Tells the server the session is ending, then tears the connection
    /// down locally. The frame is best-effort.
    pub async fn logout(&mut self, user_id: &UserId) {
        if self.is_connected() {
            if let Some(outbound) = &self.outbound {
                let _ = outbound.send(ClientFrame::Logout(user_id.clone())).await;
            }
        }
        self.close();
    }

    /// Idempotent teardown. Releases the connection on every exit path;
    /// after `close` the session cannot be reopened.
    pub fn close(&mut self) {
        self.teardown_link();
        self.state.set(ConnectionState::Closed);
    }

    fn teardown_link(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        // Dropping the sender lets the transport release the socket.
        self.outbound = None;
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.teardown_link();
    }
}
