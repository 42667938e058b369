//! Message codec — maps the integer type tag stored with each message row to
//! and from its structured payload.
//!
//! Three payload shapes exist: `text` (an opaque string, stored verbatim),
//! `chat_update` (a `{name, picture_id}` object recorded by the server when a
//! chat is modified), and `typing` (a boolean, coerced permissively in both
//! directions). `chat_update` is system-internal: [`unpack`] refuses it
//! unless the caller passes the bypass flag, so clients cannot forge
//! chat-update events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result, chat::ChatMessage};

/// Message-type labels a client may submit.
pub const USER_MESSAGE_TYPES: [&str; 2] = ["text", "typing"];

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The message-type discriminant. The integer value is the `message_type`
/// column; the label is the wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
  Text,
  ChatUpdate,
  Typing,
}

impl MessageKind {
  pub fn tag(self) -> i64 {
    match self {
      Self::Text => 0,
      Self::ChatUpdate => 1,
      Self::Typing => 2,
    }
  }

  pub fn from_tag(tag: i64) -> Option<Self> {
    match tag {
      0 => Some(Self::Text),
      1 => Some(Self::ChatUpdate),
      2 => Some(Self::Typing),
      _ => None,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Text => "text",
      Self::ChatUpdate => "chat_update",
      Self::Typing => "typing",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    match label {
      "text" => Some(Self::Text),
      "chat_update" => Some(Self::ChatUpdate),
      "typing" => Some(Self::Typing),
      _ => None,
    }
  }

  /// System kinds are only producible server-side.
  pub fn is_system(self) -> bool { matches!(self, Self::ChatUpdate) }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// Payload of a `chat_update` message. Fields the modification left unset are
/// carried as null so readers see the full patch as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUpdate {
  pub name:       Option<String>,
  pub picture_id: Option<String>,
}

/// A message row decoded for delivery to a client.
#[derive(Debug, Clone, Serialize)]
pub struct PackedMessage {
  pub message_type: &'static str,
  pub content:      Value,
  pub cuuid:        Uuid,
  pub sent_at:      chrono::DateTime<chrono::Utc>,
  pub sender:       Uuid,
}

// ─── Unpack (client submission → stored encoding) ────────────────────────────

/// Decode a client-submitted `(message_type, content)` pair into the kind and
/// the string encoding stored in the content column.
///
/// Returns `None` on an unknown label, a missing content field, a payload of
/// the wrong shape, or a system-internal kind without `allow_system`.
pub fn unpack(
  message_type: Option<&str>,
  content: Option<&Value>,
  allow_system: bool,
) -> Option<(MessageKind, String)> {
  let kind = MessageKind::from_label(message_type?)?;
  if kind.is_system() && !allow_system {
    return None;
  }
  let content = content?;

  let encoded = match kind {
    MessageKind::Text => content.as_str()?.to_owned(),
    MessageKind::ChatUpdate => {
      let update: ChatUpdate = serde_json::from_value(content.clone()).ok()?;
      serde_json::to_string(&update).ok()?
    }
    MessageKind::Typing => truthy(content).to_string(),
  };

  Some((kind, encoded))
}

// ─── Pack (stored row → client delivery) ─────────────────────────────────────

/// Decode a stored row back into its wire shape. Fails on a tag this build
/// does not know or a content column that no longer parses.
pub fn pack(message: &ChatMessage) -> Result<PackedMessage> {
  let kind = MessageKind::from_tag(message.message_type)
    .ok_or(Error::UnknownMessageTag(message.message_type))?;

  let content = match kind {
    MessageKind::Text => Value::String(message.content.clone()),
    MessageKind::ChatUpdate => serde_json::from_str(&message.content)?,
    MessageKind::Typing => Value::Bool(message.content == "true"),
  };

  Ok(PackedMessage {
    message_type: kind.label(),
    content,
    cuuid: message.cuuid,
    sent_at: message.sent_at,
    sender: message.sender,
  })
}

/// JavaScript-style truthiness, used for the permissive `typing` coercion.
pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
