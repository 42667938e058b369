//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use courier_core::{
  account::{Profile, VerificationRequest},
  chat::{Chat, ChatMessage},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `verification_requests` row.
pub struct RawVerification {
  pub destination: String,
  pub code:        String,
  pub expires_at:  String,
}

impl RawVerification {
  pub fn into_request(self) -> Result<VerificationRequest> {
    Ok(VerificationRequest {
      destination: self.destination,
      code:        self.code,
      expires_at:  decode_dt(&self.expires_at)?,
    })
  }
}

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub uuid:         String,
  pub destination:  String,
  pub display_name: String,
  pub picture_id:   Option<String>,
  pub contacts:     Option<String>,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      uuid:         decode_uuid(&self.uuid)?,
      destination:  self.destination,
      display_name: self.display_name,
      picture_id:   self.picture_id,
      contacts:     self.contacts,
    })
  }
}

/// Raw strings read directly from a `chats` row.
pub struct RawChat {
  pub cuuid:      String,
  pub picture_id: Option<String>,
  pub name:       String,
}

impl RawChat {
  pub fn into_chat(self) -> Result<Chat> {
    Ok(Chat {
      cuuid:      decode_uuid(&self.cuuid)?,
      picture_id: self.picture_id,
      name:       self.name,
    })
  }
}

/// Raw strings read directly from a `chat_messages` row.
pub struct RawMessage {
  pub cuuid:        String,
  pub message_type: i64,
  pub content:      String,
  pub sent_at:      String,
  pub sender:       String,
}

impl RawMessage {
  pub fn into_message(self) -> Result<ChatMessage> {
    Ok(ChatMessage {
      cuuid:        decode_uuid(&self.cuuid)?,
      message_type: self.message_type,
      content:      self.content,
      sent_at:      decode_dt(&self.sent_at)?,
      sender:       decode_uuid(&self.sender)?,
    })
  }
}
