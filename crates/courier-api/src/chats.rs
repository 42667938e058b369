//! Handlers for `/chat` lifecycle endpoints: creation, membership, and
//! metadata.
//!
//! Every chat-scoped operation runs the same gate: logged in first, then a
//! member of the chat named in the body. A body with no `cuuid` at all is a
//! distinct 400, not a 403.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use courier_core::{
  chat::{Chat, ChatMessage},
  codec::{ChatUpdate, MessageKind},
  store::MessagingStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppState, error::ApiError, session};

/// A request body that names a chat.
#[derive(Debug, Deserialize)]
pub struct ChatRef {
  pub cuuid: Option<Uuid>,
}

/// Resolve the membership gate: `cuuid` must be present and the caller must
/// already be a member.
pub(crate) async fn require_membership<S>(
  state: &AppState<S>,
  uuid: Uuid,
  cuuid: Option<Uuid>,
) -> Result<Uuid, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let cuuid = cuuid.ok_or(ApiError::ChatNotSpecified)?;
  if !state
    .store
    .is_chat_member(cuuid, uuid)
    .await
    .map_err(ApiError::store)?
  {
    return Err(ApiError::NotInChat);
  }
  Ok(cuuid)
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /chat/create` — a fresh chat with the caller as its first member.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;

  let chat = Chat::new();
  state
    .store
    .create_chat(chat.clone(), account.uuid)
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(chat)))
}

// ─── Membership ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddMemberBody {
  pub cuuid: Option<Uuid>,
  pub uuid:  Option<Uuid>,
}

/// `POST /chat/member` — enroll another user. Adding an existing member is a
/// no-op, not an error.
pub async fn add_member<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<AddMemberBody>,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cuuid = require_membership(&state, account.uuid, body.cuuid).await?;
  let member = body.uuid.ok_or(ApiError::UserNotSpecified)?;

  state
    .store
    .add_chat_member(cuuid, member)
    .await
    .map_err(ApiError::store)?;
  let members = state
    .store
    .chat_members(cuuid)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(json!({ "cuuid": cuuid, "members": members })))
}

/// `POST /chat/members` — list a chat's membership.
pub async fn members<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<ChatRef>,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cuuid = require_membership(&state, account.uuid, body.cuuid).await?;

  let members = state
    .store
    .chat_members(cuuid)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "cuuid": cuuid, "members": members })))
}

/// `GET /chat/active` — every chat the caller belongs to. No pagination.
pub async fn active<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let chats = state
    .store
    .chats_for_member(account.uuid)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "chats": chats })))
}

// ─── Modify ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ModifyBody {
  pub cuuid:      Option<Uuid>,
  pub name:       Option<String>,
  pub picture_id: Option<String>,
}

/// `PUT /chat/modify` — rename or re-picture a chat.
///
/// The response carries the updated chat immediately; the `chat_update`
/// message announcing the change to members is appended by a detached task
/// afterwards.
pub async fn modify<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<ModifyBody>,
) -> Result<Json<Chat>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cuuid = require_membership(&state, account.uuid, body.cuuid).await?;

  if let Some(name) = &body.name {
    state
      .store
      .set_chat_name(cuuid, name.clone())
      .await
      .map_err(ApiError::store)?;
  }
  if let Some(picture_id) = &body.picture_id {
    state
      .store
      .set_chat_picture(cuuid, picture_id.clone())
      .await
      .map_err(ApiError::store)?;
  }

  let chat = state
    .store
    .chat_by_id(cuuid)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::ChatLookupFailed)?;

  let update = ChatUpdate { name: body.name, picture_id: body.picture_id };
  let store = Arc::clone(&state.store);
  let sender = account.uuid;
  tokio::spawn(async move {
    if let Err(error) = announce_update(&*store, cuuid, sender, update).await {
      tracing::warn!(%error, %cuuid, "failed to announce chat update");
    }
  });

  Ok(Json(chat))
}

/// Append the system `chat_update` message and fan out unread markers to the
/// membership as of now.
async fn announce_update<S>(
  store: &S,
  cuuid: Uuid,
  sender: Uuid,
  update: ChatUpdate,
) -> Result<(), ApiError>
where
  S: MessagingStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let content = serde_json::to_string(&update).map_err(ApiError::store)?;
  let sent_at = Utc::now();

  store
    .append_message(ChatMessage {
      cuuid,
      message_type: MessageKind::ChatUpdate.tag(),
      content,
      sent_at,
      sender,
    })
    .await
    .map_err(ApiError::store)?;
  store
    .fan_out_unread(cuuid, sent_at)
    .await
    .map_err(ApiError::store)?;
  Ok(())
}

// ─── Info ────────────────────────────────────────────────────────────────────

/// `POST /chat/info` — a chat's metadata.
pub async fn info<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<ChatRef>,
) -> Result<Json<Chat>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let cuuid = require_membership(&state, account.uuid, body.cuuid).await?;

  let chat = state
    .store
    .chat_by_id(cuuid)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::ChatLookupFailed)?;
  Ok(Json(chat))
}
