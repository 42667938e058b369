//! The `MessagingStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `courier-store-sqlite`). The API layer depends on this abstraction, not on
//! any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  account::{Profile, VerificationRequest},
  chat::{Chat, ChatMessage},
};

/// Abstraction over a Courier storage backend.
///
/// Each method corresponds to one parameterised statement (or one small
/// statement batch) against the relational store; atomicity guarantees are
/// per method call.
pub trait MessagingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Verification requests ─────────────────────────────────────────────

  /// Upsert the pending code for a destination. A destination holds at most
  /// one pending code; the newest dispatch wins.
  fn put_verification(
    &self,
    request: VerificationRequest,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Exact `(destination, code)` lookup. Expiry is not checked here — the
  /// caller owns the clock reading.
  fn find_verification(
    &self,
    destination: String,
    code: String,
  ) -> impl Future<Output = Result<Option<VerificationRequest>, Self::Error>> + Send + '_;

  /// Drop any pending code for a destination (single-use consumption).
  fn delete_verification(
    &self,
    destination: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  fn create_profile(
    &self,
    profile: Profile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn profile_by_uuid(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn profile_by_destination(
    &self,
    destination: String,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  // Profile fields are patched independently — one UPDATE per field, no
  // transaction spanning them.

  fn set_profile_name(
    &self,
    uuid: Uuid,
    display_name: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_profile_picture(
    &self,
    uuid: Uuid,
    picture_id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_profile_contacts(
    &self,
    uuid: Uuid,
    contacts: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Chats ─────────────────────────────────────────────────────────────

  /// Insert a chat row and its creator's membership row together.
  fn create_chat(
    &self,
    chat: Chat,
    creator: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn chat_by_id(
    &self,
    cuuid: Uuid,
  ) -> impl Future<Output = Result<Option<Chat>, Self::Error>> + Send + '_;

  fn set_chat_name(
    &self,
    cuuid: Uuid,
    name: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_chat_picture(
    &self,
    cuuid: Uuid,
    picture_id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Add a member. Membership is a set: a repeat add succeeds and leaves a
  /// single row.
  fn add_chat_member(
    &self,
    cuuid: Uuid,
    uuid: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The authorization gate for every chat-scoped operation.
  fn is_chat_member(
    &self,
    cuuid: Uuid,
    uuid: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn chat_members(
    &self,
    cuuid: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// All chats the user belongs to. No pagination.
  fn chats_for_member(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Append one message row. The message log is append-only.
  fn append_message(
    &self,
    message: ChatMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Write one unread marker per current chat member for the message
  /// identified by `(cuuid, sent_at)` — the sender included.
  fn fan_out_unread(
    &self,
    cuuid: Uuid,
    sent_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All messages in a chat, ordered by `sent_at` ascending.
  fn messages_for_chat(
    &self,
    cuuid: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatMessage>, Self::Error>> + Send + '_;

  /// The messages behind a user's unread markers, joined on
  /// `(cuuid, sent_at)`, ordered by `sent_at` ascending.
  fn unread_messages(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatMessage>, Self::Error>> + Send + '_;

  /// Delete every unread marker for a user, across all chats. Returns the
  /// number of rows removed; deleting zero rows is not an error.
  fn clear_unread(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
