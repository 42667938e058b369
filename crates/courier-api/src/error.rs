//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use courier_core::codec::USER_MESSAGE_TYPES;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Every variant maps to a JSON `{"error": ...}` body; the two "unsupported"
/// variants also carry a `supported` list so clients can self-correct.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("you are not logged in")]
  NotAuthenticated,

  #[error("you are not a member of this chat")]
  NotInChat,

  #[error("no chat was specified")]
  ChatNotSpecified,

  #[error("no user was specified")]
  UserNotSpecified,

  #[error("no verification code was provided")]
  CodeMissing,

  #[error("no destination was provided")]
  DestinationMissing,

  #[error("the format of the provided destination was invalid")]
  InvalidFormat,

  #[error("no supported destination parameter was specified")]
  UnsupportedDestination,

  #[error("unsupported message type: {provided:?}")]
  UnsupportedMessageType { provided: String },

  #[error("verification code invalid")]
  VerificationFailed,

  #[error("unable to find account info for this session")]
  ProfileLookupFailed,

  #[error("unable to find this chat")]
  ChatLookupFailed,

  #[error("session error: {0}")]
  Session(#[from] tower_sessions::session::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Box any store-layer error into the opaque `Store` variant.
  pub fn store<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(error))
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
      Self::NotInChat => StatusCode::FORBIDDEN,
      Self::ChatNotSpecified
      | Self::UserNotSpecified
      | Self::CodeMissing
      | Self::DestinationMissing
      | Self::InvalidFormat
      | Self::UnsupportedDestination
      | Self::UnsupportedMessageType { .. }
      | Self::VerificationFailed => StatusCode::BAD_REQUEST,
      Self::ProfileLookupFailed
      | Self::ChatLookupFailed
      | Self::Session(_)
      | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let mut body = json!({ "error": self.to_string() });
    match &self {
      ApiError::UnsupportedDestination => {
        body["supported"] = json!(["email"]);
      }
      ApiError::UnsupportedMessageType { .. } => {
        body["supported"] = json!(USER_MESSAGE_TYPES);
      }
      _ => {}
    }
    (self.status(), Json(body)).into_response()
  }
}
