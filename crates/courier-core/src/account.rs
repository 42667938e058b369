//! Account types — verification requests and profiles.
//!
//! A profile is created lazily on the first successful code verification for
//! a destination; there is no other registration path and no passwords.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pending login code for one destination.
///
/// At most one row exists per destination — a new dispatch replaces any
/// pending code. The row is deleted on the first verify attempt that finds
/// it, whether the code was live or expired (single-use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
  /// Email address. Phone numbers are not an accepted destination.
  pub destination: String,
  /// 6 decimal digits, leading zeros allowed.
  pub code:        String,
  pub expires_at:  DateTime<Utc>,
}

impl VerificationRequest {
  /// A code is valid only while unexpired; expiry is checked against the
  /// caller-supplied clock reading so one request uses one timestamp.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool { self.expires_at > now }
}

/// A user account. `uuid` is the stable identifier; `destination` is the
/// login identity (unique). Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub uuid:         Uuid,
  pub destination:  String,
  pub display_name: String,
  pub picture_id:   Option<String>,
  /// Opaque serialised contacts blob; the server stores and returns it
  /// verbatim and never inspects it.
  pub contacts:     Option<String>,
}

impl Profile {
  /// The profile created on first verification: display name defaults to
  /// the destination string, no picture, no contacts.
  pub fn new_for_destination(destination: &str) -> Self {
    Self {
      uuid:         Uuid::new_v4(),
      destination:  destination.to_owned(),
      display_name: destination.to_owned(),
      picture_id:   None,
      contacts:     None,
    }
  }
}
