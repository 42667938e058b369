//! [`SqliteStore`] — the SQLite implementation of [`MessagingStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use courier_core::{
  account::{Profile, VerificationRequest},
  chat::{Chat, ChatMessage},
  store::MessagingStore,
};

use crate::{
  Error, Result,
  encode::{
    RawChat, RawMessage, RawProfile, RawVerification, decode_uuid, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Courier store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── MessagingStore impl ─────────────────────────────────────────────────────

impl MessagingStore for SqliteStore {
  type Error = Error;

  // ── Verification requests ─────────────────────────────────────────────────

  async fn put_verification(&self, request: VerificationRequest) -> Result<()> {
    let expires_str = encode_dt(request.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "REPLACE INTO verification_requests (destination, code, expires_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![request.destination, request.code, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_verification(
    &self,
    destination: String,
    code: String,
  ) -> Result<Option<VerificationRequest>> {
    let raw: Option<RawVerification> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT destination, code, expires_at
               FROM verification_requests
               WHERE destination = ?1 AND code = ?2",
              rusqlite::params![destination, code],
              |row| {
                Ok(RawVerification {
                  destination: row.get(0)?,
                  code:        row.get(1)?,
                  expires_at:  row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVerification::into_request).transpose()
  }

  async fn delete_verification(&self, destination: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM verification_requests WHERE destination = ?1",
          rusqlite::params![destination],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn create_profile(&self, profile: Profile) -> Result<()> {
    let uuid_str = encode_uuid(profile.uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (uuid, destination, display_name, picture_id, contacts)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            uuid_str,
            profile.destination,
            profile.display_name,
            profile.picture_id,
            profile.contacts,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn profile_by_uuid(&self, uuid: Uuid) -> Result<Option<Profile>> {
    let uuid_str = encode_uuid(uuid);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uuid, destination, display_name, picture_id, contacts
               FROM profiles WHERE uuid = ?1",
              rusqlite::params![uuid_str],
              |row| {
                Ok(RawProfile {
                  uuid:         row.get(0)?,
                  destination:  row.get(1)?,
                  display_name: row.get(2)?,
                  picture_id:   row.get(3)?,
                  contacts:     row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn profile_by_destination(
    &self,
    destination: String,
  ) -> Result<Option<Profile>> {
    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT uuid, destination, display_name, picture_id, contacts
               FROM profiles WHERE destination = ?1",
              rusqlite::params![destination],
              |row| {
                Ok(RawProfile {
                  uuid:         row.get(0)?,
                  destination:  row.get(1)?,
                  display_name: row.get(2)?,
                  picture_id:   row.get(3)?,
                  contacts:     row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn set_profile_name(&self, uuid: Uuid, display_name: String) -> Result<()> {
    let uuid_str = encode_uuid(uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE profiles SET display_name = ?2 WHERE uuid = ?1",
          rusqlite::params![uuid_str, display_name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_profile_picture(&self, uuid: Uuid, picture_id: String) -> Result<()> {
    let uuid_str = encode_uuid(uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE profiles SET picture_id = ?2 WHERE uuid = ?1",
          rusqlite::params![uuid_str, picture_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_profile_contacts(&self, uuid: Uuid, contacts: String) -> Result<()> {
    let uuid_str = encode_uuid(uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE profiles SET contacts = ?2 WHERE uuid = ?1",
          rusqlite::params![uuid_str, contacts],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Chats ─────────────────────────────────────────────────────────────────

  async fn create_chat(&self, chat: Chat, creator: Uuid) -> Result<()> {
    let cuuid_str   = encode_uuid(chat.cuuid);
    let creator_str = encode_uuid(creator);

    // Chat row and creator membership commit together, so no chat is ever
    // visible without its first member.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO chats (cuuid, picture_id, name) VALUES (?1, ?2, ?3)",
          rusqlite::params![cuuid_str, chat.picture_id, chat.name],
        )?;
        tx.execute(
          "INSERT INTO chat_members (cuuid, uuid) VALUES (?1, ?2)",
          rusqlite::params![cuuid_str, creator_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn chat_by_id(&self, cuuid: Uuid) -> Result<Option<Chat>> {
    let cuuid_str = encode_uuid(cuuid);

    let raw: Option<RawChat> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT cuuid, picture_id, name FROM chats WHERE cuuid = ?1",
              rusqlite::params![cuuid_str],
              |row| {
                Ok(RawChat {
                  cuuid:      row.get(0)?,
                  picture_id: row.get(1)?,
                  name:       row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawChat::into_chat).transpose()
  }

  async fn set_chat_name(&self, cuuid: Uuid, name: String) -> Result<()> {
    let cuuid_str = encode_uuid(cuuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE chats SET name = ?2 WHERE cuuid = ?1",
          rusqlite::params![cuuid_str, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_chat_picture(&self, cuuid: Uuid, picture_id: String) -> Result<()> {
    let cuuid_str = encode_uuid(cuuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE chats SET picture_id = ?2 WHERE cuuid = ?1",
          rusqlite::params![cuuid_str, picture_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_chat_member(&self, cuuid: Uuid, uuid: Uuid) -> Result<()> {
    let cuuid_str = encode_uuid(cuuid);
    let uuid_str  = encode_uuid(uuid);

    // OR IGNORE + the UNIQUE(cuuid, uuid) constraint keep membership a set.
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO chat_members (cuuid, uuid) VALUES (?1, ?2)",
          rusqlite::params![cuuid_str, uuid_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_chat_member(&self, cuuid: Uuid, uuid: Uuid) -> Result<bool> {
    let cuuid_str = encode_uuid(cuuid);
    let uuid_str  = encode_uuid(uuid);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM chat_members WHERE cuuid = ?1 AND uuid = ?2",
              rusqlite::params![cuuid_str, uuid_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn chat_members(&self, cuuid: Uuid) -> Result<Vec<Uuid>> {
    let cuuid_str = encode_uuid(cuuid);

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT uuid FROM chat_members WHERE cuuid = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![cuuid_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn chats_for_member(&self, uuid: Uuid) -> Result<Vec<Uuid>> {
    let uuid_str = encode_uuid(uuid);

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT cuuid FROM chat_members WHERE uuid = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![uuid_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|s| decode_uuid(s)).collect()
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn append_message(&self, message: ChatMessage) -> Result<()> {
    let cuuid_str   = encode_uuid(message.cuuid);
    let sender_str  = encode_uuid(message.sender);
    let sent_at_str = encode_dt(message.sent_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO chat_messages (cuuid, message_type, content, sent_at, sender)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            cuuid_str,
            message.message_type,
            message.content,
            sent_at_str,
            sender_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fan_out_unread(&self, cuuid: Uuid, sent_at: DateTime<Utc>) -> Result<()> {
    let cuuid_str   = encode_uuid(cuuid);
    let sent_at_str = encode_dt(sent_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO unread_markers (cuuid, sent_at, uuid)
           SELECT ?1, ?2, uuid FROM chat_members WHERE cuuid = ?1",
          rusqlite::params![cuuid_str, sent_at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn messages_for_chat(&self, cuuid: Uuid) -> Result<Vec<ChatMessage>> {
    let cuuid_str = encode_uuid(cuuid);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT cuuid, message_type, content, sent_at, sender
           FROM chat_messages
           WHERE cuuid = ?1
           ORDER BY sent_at ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![cuuid_str], |row| {
            Ok(RawMessage {
              cuuid:        row.get(0)?,
              message_type: row.get(1)?,
              content:      row.get(2)?,
              sent_at:      row.get(3)?,
              sender:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn unread_messages(&self, uuid: Uuid) -> Result<Vec<ChatMessage>> {
    let uuid_str = encode_uuid(uuid);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.cuuid, m.message_type, m.content, m.sent_at, m.sender
           FROM unread_markers u
           JOIN chat_messages m
             ON m.cuuid = u.cuuid AND m.sent_at = u.sent_at
           WHERE u.uuid = ?1
           ORDER BY m.sent_at ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![uuid_str], |row| {
            Ok(RawMessage {
              cuuid:        row.get(0)?,
              message_type: row.get(1)?,
              content:      row.get(2)?,
              sent_at:      row.get(3)?,
              sender:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn clear_unread(&self, uuid: Uuid) -> Result<u64> {
    let uuid_str = encode_uuid(uuid);

    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM unread_markers WHERE uuid = ?1",
          rusqlite::params![uuid_str],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(removed)
  }
}
