//! Error type for `courier-notify`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to read template {path}: {source}")]
  TemplateRead {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("bad placeholder pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("mail delivery failed: {0}")]
  Delivery(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
