//! Synchronization controller: sequences the snapshot fetch, session
//! lifecycle and per-selection conversation fetches, and applies the
//! reconciliation rules for stream traffic and optimistic sends.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use chrono::Utc;
use shared::{
    domain::{MessageId, UserId, TEMP_MESSAGE_ID_PREFIX},
    protocol::{AuthResponse, AuthUser, Message, StreamEvent},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    conversation::ConversationStore,
    directory::ContactDirectory,
    rest::ApiClient,
    session::{ConnectionState, RealtimeSession, SessionEvent},
    transport::StreamTransport,
};

const SESSION_EVENT_BUFFER: usize = 256;

/// Marks one conversation selection. A fetch completed under a superseded
/// ticket is discarded instead of overwriting the newer selection's data.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
    epoch: u64,
    peer: UserId,
}

impl SelectionTicket {
    pub fn peer(&self) -> &UserId {
        &self.peer
    }
}

/// Orchestrator owning the directory, the conversation store and the
/// realtime session. All mutation happens through `&mut self` on one task;
/// the session's pump communicates through the event channel drained here.
pub struct ChatController {
    local: AuthUser,
    token: String,
    api: ApiClient,
    directory: ContactDirectory,
    conversation: ConversationStore,
    session: RealtimeSession,
    session_events: mpsc::Receiver<SessionEvent>,
    selected: Option<UserId>,
    selection_epoch: u64,
    temp_seq: u64,
}

impl ChatController {
    pub fn new(
        config: &ClientConfig,
        auth: AuthResponse,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        let api = ApiClient::with_token(config, auth.token.clone());
        let (events_tx, session_events) = mpsc::channel(SESSION_EVENT_BUFFER);
        let session = RealtimeSession::new(transport, config.base_url.clone(), events_tx);
        Self {
            local: auth.user,
            token: auth.token,
            api,
            directory: ContactDirectory::default(),
            conversation: ConversationStore::default(),
            session,
            session_events,
            selected: None,
            selection_epoch: 0,
            temp_seq: 0,
        }
    }

    pub fn local(&self) -> &AuthUser {
        &self.local
    }

    pub fn directory(&self) -> &ContactDirectory {
        &self.directory
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn selected(&self) -> Option<&UserId> {
        self.selected.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Fetches the directory snapshot, then opens the realtime session.
    /// The session is only opened after the snapshot load completes, so
    /// presence events always find user records to update. On a snapshot
    /// fetch failure the directory stays empty, the session stays
    /// unopened and the error is returned for the caller to retry.
    pub async fn start(&mut self) -> Result<()> {
        let users = match self.api.fetch_users().await {
            Ok(users) => users,
            Err(err) => {
                warn!(error = %err, "controller: directory fetch failed, session not opened");
                return Err(err);
            }
        };
        self.directory.load(users);
        info!(contacts = self.directory.len(), "controller: directory ready");
        self.session.open(&self.token).await
    }

    /// Re-opens the session after a disconnect. The server replays
    /// undelivered messages on every successful connect.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.session.open(&self.token).await
    }

    /// Records a new selection and returns the ticket the conversation
    /// fetch must present to apply its result.
    pub fn begin_selection(&mut self, peer: &UserId) -> SelectionTicket {
        self.selection_epoch += 1;
        self.selected = Some(peer.clone());
        SelectionTicket {
            epoch: self.selection_epoch,
            peer: peer.clone(),
        }
    }

    /// Applies a conversation fetch result, unless the selection has moved
    /// on since the ticket was issued. Returns whether the result was
    /// applied.
    pub fn complete_selection(&mut self, ticket: &SelectionTicket, messages: Vec<Message>) -> bool {
        if ticket.epoch != self.selection_epoch {
            debug!(peer = %ticket.peer, "controller: stale conversation fetch discarded");
            return false;
        }
        self.conversation.load(messages);
        true
    }

    /// Selects `peer` and loads its conversation history.
    pub async fn open_conversation(&mut self, peer: &UserId) -> Result<()> {
        let ticket = self.begin_selection(peer);
        let messages = self.api.fetch_messages(peer).await?;
        self.complete_selection(&ticket, messages);
        Ok(())
    }

    /// Sends `text` to the current selection: emits the compose frame and
    /// appends an optimistic message. Returns false without side effects
    /// when the affordance is unavailable (blank text, no selection, or no
    /// open session); that is not an error.
    ///
    /// The server's echo of this message arrives under its real id and is
    /// appended alongside the temporary bubble; without a correlation id
    /// the duplicate is accepted rather than suppressed.
    pub async fn send(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let Some(receiver) = self.selected.clone() else {
            return false;
        };
        if !self.session.is_connected() {
            return false;
        }
        if let Err(err) = self.session.send(receiver.clone(), text.to_string()).await {
            debug!(error = %err, "controller: send unavailable");
            return false;
        }
        let message = self.next_optimistic(receiver, text);
        self.conversation.append(message);
        true
    }

    /// Sends the logout frame, tears the session down and invalidates the
    /// stored credential.
    pub async fn logout(&mut self) {
        self.session.logout(&self.local.id).await;
        self.api.clear_token();
    }

    /// Next lifecycle/stream notification from the session. Cancel-safe,
    /// so it can sit in a `select!` arm. `None` once the session is gone.
    pub async fn next_session_event(&mut self) -> Option<SessionEvent> {
        self.session_events.recv().await
    }

    /// Drains one session event into the reconciliation rules. Returns
    /// false once the channel is exhausted.
    pub async fn pump_once(&mut self) -> bool {
        match self.session_events.recv().await {
            Some(event) => {
                self.handle_session_event(event);
                true
            }
            None => false,
        }
    }

    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => info!("controller: stream connected"),
            SessionEvent::Stream(event) => self.apply_stream_event(event),
            SessionEvent::ConnectError(reason) => {
                warn!(error = %reason, "controller: stream connect error");
            }
            SessionEvent::Disconnected => warn!("controller: stream disconnected"),
        }
    }

    fn apply_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Message(message) => {
                self.directory.apply_message_preview(&message, &self.local.id);
                let in_active_conversation = self
                    .selected
                    .as_ref()
                    .is_some_and(|peer| message.is_between(&self.local.id, peer));
                if in_active_conversation {
                    self.conversation.append(message);
                }
            }
            StreamEvent::Presence(presence) => {
                self.directory
                    .apply_presence(&presence.user_id, presence.online, presence.last_seen);
            }
            StreamEvent::OnlineUsers(ids) => {
                let online: HashSet<UserId> = ids.into_iter().collect();
                self.directory.apply_bulk_online(&online);
            }
            StreamEvent::MessageRead { message_id } => {
                self.conversation.mark_read(&message_id);
                self.directory.mark_read(&message_id);
            }
        }
    }

    fn next_optimistic(&mut self, receiver: UserId, text: &str) -> Message {
        self.temp_seq += 1;
        Message {
            id: MessageId::new(format!(
                "{TEMP_MESSAGE_ID_PREFIX}{}-{}",
                Utc::now().timestamp_millis(),
                self.temp_seq
            )),
            sender: self.local.id.clone(),
            receiver: Some(receiver),
            content: text.to_string(),
            created_at: Utc::now(),
            delivered: false,
            read: false,
        }
    }
}
