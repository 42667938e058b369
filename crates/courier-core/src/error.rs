//! Error types for `courier-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown message type tag: {0}")]
  UnknownMessageTag(i64),

  #[error("malformed message content: {0}")]
  MalformedContent(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
