//! Login state stored in the `tower-sessions` session.
//!
//! The whole account record lives under a single key. "Logged in" holds only
//! while the flag is set and the expiry is in the future; a stale record is
//! treated exactly like no record at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::ApiError;

const ACCOUNT_KEY: &str = "account";

/// The session-resident account record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAccount {
  pub logged_in:   bool,
  pub uuid:        Uuid,
  pub destination: String,
  pub expiry:      DateTime<Utc>,
}

impl SessionAccount {
  pub fn is_live(&self, now: DateTime<Utc>) -> bool {
    self.logged_in && self.expiry > now
  }
}

/// Read the account record, live or not.
pub async fn current(session: &Session) -> Result<Option<SessionAccount>, ApiError> {
  Ok(session.get::<SessionAccount>(ACCOUNT_KEY).await?)
}

/// Read the account record and demand a live login.
pub async fn require(session: &Session) -> Result<SessionAccount, ApiError> {
  match current(session).await? {
    Some(account) if account.is_live(Utc::now()) => Ok(account),
    _ => Err(ApiError::NotAuthenticated),
  }
}

/// Write a fresh logged-in record. Also used to refresh: re-establishing with
/// a new expiry is the only way the record changes.
pub async fn establish(
  session: &Session,
  uuid: Uuid,
  destination: String,
  expiry: DateTime<Utc>,
) -> Result<(), ApiError> {
  session
    .insert(ACCOUNT_KEY, SessionAccount {
      logged_in: true,
      uuid,
      destination,
      expiry,
    })
    .await?;
  Ok(())
}

/// The destination remembered from an earlier login, if any. Verify uses this
/// as a fallback when the body omits one; liveness is deliberately not
/// required here.
pub async fn destination(session: &Session) -> Result<Option<String>, ApiError> {
  Ok(current(session).await?.map(|account| account.destination))
}

/// Destroy the session record entirely.
pub async fn clear(session: &Session) -> Result<(), ApiError> {
  session.flush().await?;
  Ok(())
}
