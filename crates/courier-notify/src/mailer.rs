//! Mail delivery contract.
//!
//! Courier never blocks a request on delivery; senders spawn [`Mailer::send`]
//! into a background task and log failures.

use async_trait::async_trait;

use crate::Result;

/// A fully rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
  pub from:    String,
  pub to:      String,
  pub subject: String,
  pub html:    String,
}

/// Transport-agnostic mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Development mailer that writes the message to the log instead of
/// delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  async fn send(&self, mail: OutgoingMail) -> Result<()> {
    tracing::info!(
      to = %mail.to,
      from = %mail.from,
      subject = %mail.subject,
      body = %mail.html,
      "outgoing mail (log transport)"
    );
    Ok(())
  }
}
