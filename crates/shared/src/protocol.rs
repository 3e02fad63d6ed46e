use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Presence defaults to offline until an event or bulk snapshot says
    /// otherwise.
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Most recent message exchanged with the local actor, kept for list
    /// previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
}

impl User {
    /// Name shown for this user: display name when set, username otherwise.
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender: UserId,
    /// Absent receiver means a broadcast/self context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<UserId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// True when the message's participants are exactly `{a, b}`.
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (self.sender == *a && self.receiver.as_ref() == Some(b))
            || (self.sender == *b && self.receiver.as_ref() == Some(a))
    }

    /// The participant other than `local`, if the message involves `local`
    /// at all.
    pub fn counterpart_of(&self, local: &UserId) -> Option<&UserId> {
        if self.sender == *local {
            self.receiver.as_ref()
        } else if self.receiver.as_ref() == Some(local) {
            Some(&self.sender)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: UserId,
    pub user_name: String,
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Inbound stream events, in the backend's wire encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum StreamEvent {
    Message(Message),
    Presence(PresencePayload),
    OnlineUsers(Vec<UserId>),
    #[serde(rename = "message:read")]
    #[serde(rename_all = "camelCase")]
    MessageRead { message_id: MessageId },
}

/// Outbound stream frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientFrame {
    Message { receiver: UserId, text: String },
    /// Requests server-side redelivery of messages missed while
    /// disconnected; sent on every connect.
    FetchUndelivered,
    Logout(UserId),
}
