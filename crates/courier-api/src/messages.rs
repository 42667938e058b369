//! Handlers for message sending, history, and unread notifications.

use axum::{Json, extract::State};
use chrono::Utc;
use courier_core::{chat::ChatMessage, codec, store::MessagingStore};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppState, chats, error::ApiError, session};

// ─── Send ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub cuuid:        Option<Uuid>,
  pub message_type: Option<String>,
  pub content:      Option<Value>,
}

/// `POST /chat/send` — append a message and mark it unread for every current
/// member, sender included.
///
/// System message types are refused here; only the server itself records a
/// `chat_update`.
pub async fn send<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<SendBody>,
) -> Result<Json<codec::PackedMessage>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cuuid =
    chats::require_membership(&state, account.uuid, body.cuuid).await?;

  let (kind, content) =
    codec::unpack(body.message_type.as_deref(), body.content.as_ref(), false)
      .ok_or_else(|| ApiError::UnsupportedMessageType {
        provided: body.message_type.clone().unwrap_or_default(),
      })?;

  // One clock reading covers both the row and its unread markers.
  let sent_at = Utc::now();
  let message = ChatMessage {
    cuuid,
    message_type: kind.tag(),
    content,
    sent_at,
    sender: account.uuid,
  };

  state
    .store
    .append_message(message.clone())
    .await
    .map_err(ApiError::store)?;
  state
    .store
    .fan_out_unread(cuuid, sent_at)
    .await
    .map_err(ApiError::store)?;

  let packed = codec::pack(&message).map_err(ApiError::store)?;
  Ok(Json(packed))
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `POST /chat/messages` — the full message log of a chat, oldest first.
pub async fn history<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<chats::ChatRef>,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cuuid =
    chats::require_membership(&state, account.uuid, body.cuuid).await?;

  let rows = state
    .store
    .messages_for_chat(cuuid)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "cuuid": cuuid, "messages": pack_rows(&rows) })))
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// `GET /notifications` — the caller's unread messages across all chats.
pub async fn notifications<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let rows = state
    .store
    .unread_messages(account.uuid)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "messages": pack_rows(&rows) })))
}

/// `DELETE /notifications` — drop every unread marker for the caller.
/// Idempotent; a second call clears zero rows and still succeeds.
pub async fn clear_notifications<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cleared = state
    .store
    .clear_unread(account.uuid)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "cleared": cleared })))
}

/// Pack stored rows for delivery. A row with a tag this build does not know
/// is skipped with a warning rather than failing the whole read.
fn pack_rows(rows: &[ChatMessage]) -> Vec<codec::PackedMessage> {
  let mut packed = Vec::with_capacity(rows.len());
  for row in rows {
    match codec::pack(row) {
      Ok(message) => packed.push(message),
      Err(error) => {
        tracing::warn!(%error, cuuid = %row.cuuid, "skipping undecodable message");
      }
    }
  }
  packed
}
