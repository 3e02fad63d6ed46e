//! Contact directory: the authoritative set of known users with their
//! presence and last-message preview state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use shared::{
    domain::{MessageId, UserId},
    protocol::{Message, User},
};
use tracing::debug;

/// In-memory registry of known users. Entries are created only by the
/// snapshot load; presence and message events mutate existing entries and
/// are dropped for unknown ids.
#[derive(Debug, Default)]
pub struct ContactDirectory {
    users: Vec<User>,
}

impl ContactDirectory {
    /// Replaces the directory wholesale with the REST snapshot, keeping
    /// snapshot order. Later duplicates of an id are dropped.
    pub fn load(&mut self, users: Vec<User>) {
        let mut seen = HashSet::with_capacity(users.len());
        self.users = users
            .into_iter()
            .filter(|user| seen.insert(user.id.clone()))
            .collect();
        debug!(count = self.users.len(), "directory: snapshot loaded");
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id == *id)
    }

    /// Applies a single-user presence event. Unknown ids are ignored, not
    /// queued: events never manifest new directory entries.
    pub fn apply_presence(
        &mut self,
        user_id: &UserId,
        online: bool,
        last_seen: Option<DateTime<Utc>>,
    ) -> bool {
        match self.users.iter_mut().find(|user| user.id == *user_id) {
            Some(user) => {
                user.online = online;
                if last_seen.is_some() {
                    user.last_seen = last_seen;
                }
                true
            }
            None => {
                debug!(user_id = %user_id, "directory: presence for unknown id dropped");
                false
            }
        }
    }

    /// Applies a bulk presence snapshot: every entry becomes online iff its
    /// id is in the set. Skipped entirely while the directory is empty so a
    /// snapshot racing ahead of the directory load cannot be misread as
    /// everyone-offline.
    pub fn apply_bulk_online(&mut self, online_ids: &HashSet<UserId>) {
        if self.users.is_empty() {
            debug!("directory: bulk presence before snapshot load skipped");
            return;
        }
        for user in &mut self.users {
            user.online = online_ids.contains(&user.id);
        }
    }

    /// Stores `message` as the last-exchanged preview on the counterpart's
    /// entry. The latest arriving message for a pair always wins; the
    /// stream delivers in send order per pair.
    pub fn apply_message_preview(&mut self, message: &Message, local_id: &UserId) {
        let Some(counterpart) = message.counterpart_of(local_id) else {
            return;
        };
        let counterpart = counterpart.clone();
        if let Some(user) = self.users.iter_mut().find(|user| user.id == counterpart) {
            user.last_message = Some(message.clone());
        }
    }

    /// Upgrades the read flag on any stored preview matching the id.
    pub fn mark_read(&mut self, message_id: &MessageId) {
        for user in &mut self.users {
            if let Some(preview) = user.last_message.as_mut() {
                if preview.id == *message_id {
                    preview.read = true;
                }
            }
        }
    }
}
