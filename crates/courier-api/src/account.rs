//! Handlers for `/account` endpoints: code dispatch, verification, session
//! upkeep, and profile reads and writes.
//!
//! | Method   | Path                | Notes |
//! |----------|---------------------|-------|
//! | `POST`   | `/account/dispatch` | Body: `{"email": ...}` |
//! | `POST`   | `/account/verify`   | Body: `{"code", "destination"?}` |
//! | `GET`    | `/account`          | Requires login |
//! | `PUT`    | `/account/modify`   | Requires login |
//! | `POST`   | `/account/search`   | Unauthenticated |
//! | `POST`   | `/account/refresh`  | Requires login |
//! | `POST`   | `/account/logout`   | Requires login |

use std::sync::{Arc, LazyLock};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use courier_core::{
  account::{Profile, VerificationRequest},
  store::MessagingStore,
};
use courier_notify::OutgoingMail;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppState, error::ApiError, session};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[a-zA-Z0-9_.-]+@[a-zA-Z0-9_.-]+\.[a-zA-Z]{2,5}$")
    .expect("email pattern")
});

// ─── Dispatch ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DispatchBody {
  pub email: Option<String>,
}

/// `POST /account/dispatch` — send a login code to an email address.
///
/// Everything past validation is best-effort: the client is told the code is
/// on its way whether or not the store write or the mail delivery succeed.
pub async fn dispatch<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<DispatchBody>,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let email = match body.email {
    Some(email) if !email.is_empty() => email,
    _ => return Err(ApiError::UnsupportedDestination),
  };
  if !EMAIL_RE.is_match(&email) {
    return Err(ApiError::InvalidFormat);
  }

  let code = courier_notify::verification_code();
  let request = VerificationRequest {
    destination: email.clone(),
    code:        code.clone(),
    expires_at:  Utc::now() + Duration::hours(1),
  };
  if let Err(error) = state.store.put_verification(request).await {
    tracing::warn!(%error, destination = %email, "failed to record verification code");
  }

  match state.templates.render(
    &state.config.mail.verification_template,
    &[("email", email.as_str()), ("code", code.as_str())],
  ) {
    Ok(html) => {
      let mail = OutgoingMail {
        from:    state.config.mail.from.clone(),
        to:      email.clone(),
        subject: state.config.mail.verification_subject.clone(),
        html,
      };
      let mailer = Arc::clone(&state.mailer);
      tokio::spawn(async move {
        if let Err(error) = mailer.send(mail).await {
          tracing::warn!(%error, "verification mail delivery failed");
        }
      });
    }
    Err(error) => {
      tracing::warn!(%error, "failed to render verification template");
    }
  }

  Ok(Json(json!({ "destination": email, "type": "email" })))
}

// ─── Verify ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub code:        Option<String>,
  pub destination: Option<String>,
}

/// `POST /account/verify` — trade a dispatched code for a logged-in session.
///
/// The only authentication primitive, and the only path that creates a
/// profile.
pub async fn verify<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<VerifyBody>,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let code = match body.code {
    Some(code) if !code.is_empty() => code,
    _ => return Err(ApiError::CodeMissing),
  };
  let destination = match body.destination {
    Some(destination) if !destination.is_empty() => destination,
    _ => session::destination(&session)
      .await?
      .ok_or(ApiError::DestinationMissing)?,
  };

  let now = Utc::now();
  let request = state
    .store
    .find_verification(destination.clone(), code)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::VerificationFailed)?;

  // The row is single-use either way: an expired match is burned too.
  state
    .store
    .delete_verification(destination.clone())
    .await
    .map_err(ApiError::store)?;
  if !request.is_live(now) {
    return Err(ApiError::VerificationFailed);
  }

  let profile = match state
    .store
    .profile_by_destination(destination.clone())
    .await
    .map_err(ApiError::store)?
  {
    Some(profile) => profile,
    None => {
      let fresh = Profile::new_for_destination(&destination);
      state
        .store
        .create_profile(fresh.clone())
        .await
        .map_err(ApiError::store)?;
      fresh
    }
  };

  let refresh_by = now + Duration::days(1);
  session::establish(&session, profile.uuid, destination.clone(), refresh_by)
    .await?;

  Ok(Json(json!({
    "uuid":        profile.uuid,
    "picture_id":  profile.picture_id,
    "name":        profile.display_name,
    "contacts":    profile.contacts,
    "refresh_by":  refresh_by,
    "destination": destination,
  })))
}

// ─── Info ────────────────────────────────────────────────────────────────────

/// `GET /account`
pub async fn info<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;

  // A live session whose profile row is gone is server-side breakage, not a
  // client mistake.
  let profile = state
    .store
    .profile_by_uuid(account.uuid)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::ProfileLookupFailed)?;

  Ok(Json(json!({
    "uuid":        profile.uuid,
    "picture_id":  profile.picture_id,
    "name":        profile.display_name,
    "contacts":    profile.contacts,
    "refresh_by":  account.expiry,
    "destination": account.destination,
  })))
}

// ─── Modify ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ModifyBody {
  pub name:       Option<String>,
  pub picture_id: Option<String>,
  pub contacts:   Option<Value>,
}

/// `PUT /account/modify` — each present field updates independently; there is
/// no transaction across them.
pub async fn modify<S>(
  State(state): State<AppState<S>>,
  session: Session,
  Json(body): Json<ModifyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let account = session::require(&session).await?;
  let mut profile = state
    .store
    .profile_by_uuid(account.uuid)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::ProfileLookupFailed)?;

  if let Some(name) = body.name {
    state
      .store
      .set_profile_name(account.uuid, name.clone())
      .await
      .map_err(ApiError::store)?;
    profile.display_name = name;
  }
  if let Some(picture_id) = body.picture_id {
    state
      .store
      .set_profile_picture(account.uuid, picture_id.clone())
      .await
      .map_err(ApiError::store)?;
    profile.picture_id = Some(picture_id);
  }
  if let Some(contacts) = body.contacts {
    // Contacts are stored as the serialised JSON text, never inspected.
    let encoded = serde_json::to_string(&contacts).map_err(ApiError::store)?;
    state
      .store
      .set_profile_contacts(account.uuid, encoded.clone())
      .await
      .map_err(ApiError::store)?;
    profile.contacts = Some(encoded);
  }

  Ok((
    StatusCode::ACCEPTED,
    Json(json!({
      "uuid":        profile.uuid,
      "picture_id":  profile.picture_id,
      "name":        profile.display_name,
      "contacts":    profile.contacts,
      "refresh_by":  account.expiry,
      "destination": account.destination,
    })),
  ))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchBody {
  pub destination: Option<String>,
  pub uuid:        Option<Uuid>,
}

/// `POST /account/search` — public lookup by destination or uuid.
/// Destination wins when both are present. A miss is an ordinary answer, not
/// an error. The summary never includes contacts.
pub async fn search<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SearchBody>,
) -> Result<Json<Value>, ApiError>
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let found = if let Some(destination) = body.destination {
    state
      .store
      .profile_by_destination(destination)
      .await
      .map_err(ApiError::store)?
  } else if let Some(uuid) = body.uuid {
    state
      .store
      .profile_by_uuid(uuid)
      .await
      .map_err(ApiError::store)?
  } else {
    return Err(ApiError::DestinationMissing);
  };

  Ok(Json(match found {
    Some(profile) => json!({
      "uuid":        profile.uuid,
      "destination": profile.destination,
      "name":        profile.display_name,
      "picture_id":  profile.picture_id,
    }),
    None => json!({ "comment": "no matching account found" }),
  }))
}

// ─── Refresh / logout ────────────────────────────────────────────────────────

/// `POST /account/refresh` — push the session expiry another day out.
pub async fn refresh(session: Session) -> Result<Json<Value>, ApiError> {
  let account = session::require(&session).await?;

  let refresh_by = Utc::now() + Duration::days(1);
  session::establish(&session, account.uuid, account.destination, refresh_by)
    .await?;

  Ok(Json(json!({ "refresh_by": refresh_by })))
}

/// `POST /account/logout` — destroy the session. Already-logged-out callers
/// get the same 401 as any other unauthenticated request.
pub async fn logout(session: Session) -> Result<Json<Value>, ApiError> {
  session::require(&session).await?;
  session::clear(&session).await?;
  Ok(Json(json!({ "comment": "you have been logged out" })))
}
