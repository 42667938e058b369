//! Outbound notification support for Courier: verification codes, the HTML
//! template engine behind them, and the mail delivery contract.

pub mod code;
pub mod error;
pub mod mailer;
pub mod template;

pub use code::verification_code;
pub use error::{Error, Result};
pub use mailer::{LogMailer, Mailer, OutgoingMail};
pub use template::{TemplateSource, Templates};
