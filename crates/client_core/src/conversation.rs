//! Ordered message history for the currently selected conversation.

use shared::{domain::MessageId, protocol::Message};
use tracing::debug;

/// In-memory ordered message list for one conversation. Messages keep
/// arrival order; timestamps are display-only and never reorder entries.
///
/// A server echo of an optimistic send arrives under its real id and is
/// appended alongside the temporary bubble: no correlation id exists to
/// match the two, so the duplicate is an accepted limitation rather than
/// something this store suppresses.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Replaces the history wholesale with a per-conversation fetch result.
    pub fn load(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Appends a message from the stream or an optimistic send. A message
    /// whose id is already present is dropped to keep ids unique within
    /// the store.
    pub fn append(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(message_id = %message.id, "conversation: duplicate id dropped");
            return;
        }
        self.messages.push(message);
    }

    /// Upgrades the read flag on the matching entry; no-op otherwise.
    pub fn mark_read(&mut self, message_id: &MessageId) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == *message_id) {
            message.read = true;
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
