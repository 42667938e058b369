//! Chat types — chats, membership, and stored messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat room. Membership lives in its own table; a chat only ever moves
/// from nonexistent to active (no archival or deletion in scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
  pub cuuid:      Uuid,
  pub picture_id: Option<String>,
  pub name:       String,
}

/// The default name given to a freshly created chat.
pub const DEFAULT_CHAT_NAME: &str = "New Chat";

impl Chat {
  pub fn new() -> Self {
    Self {
      cuuid:      Uuid::new_v4(),
      picture_id: None,
      name:       DEFAULT_CHAT_NAME.to_owned(),
    }
  }
}

impl Default for Chat {
  fn default() -> Self { Self::new() }
}

/// A stored message row. Append-only; ordered by `sent_at`.
///
/// `message_type` is the integer tag interpreted by
/// [`codec`](crate::codec); `content` is the tag-specific encoded payload.
/// Unread markers reference a message by `(cuuid, sent_at)`, not by a
/// surrogate id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub cuuid:        Uuid,
  pub message_type: i64,
  pub content:      String,
  pub sent_at:      DateTime<Utc>,
  pub sender:       Uuid,
}
