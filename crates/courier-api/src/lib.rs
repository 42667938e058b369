//! JSON HTTP API for Courier.
//!
//! Exposes an axum [`Router`] backed by any
//! [`courier_core::store::MessagingStore`], with login state held in
//! `tower-sessions` cookies. TLS and anything in front of the socket are the
//! deployment's responsibility.

pub mod account;
pub mod chats;
pub mod error;
pub mod messages;
pub mod session;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use courier_core::store::MessagingStore;
use courier_notify::{Mailer, TemplateSource, Templates};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Outbound-mail configuration for verification codes.
#[derive(Deserialize, Clone)]
pub struct MailConfig {
  pub from:                  String,
  pub verification_subject:  String,
  pub verification_template: TemplateSource,
}

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub mail:       MailConfig,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: MessagingStore> {
  pub store:     Arc<S>,
  pub mailer:    Arc<dyn Mailer>,
  pub templates: Arc<Templates>,
  pub config:    Arc<ServerConfig>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the bare route table for `state`, without the session or trace
/// layers. Prefer [`app`] unless composing layers yourself.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Accounts
    .route("/account/dispatch", post(account::dispatch::<S>))
    .route("/account/verify",   post(account::verify::<S>))
    .route("/account",          get(account::info::<S>))
    .route("/account/modify",   put(account::modify::<S>))
    .route("/account/search",   post(account::search::<S>))
    .route("/account/refresh",  post(account::refresh))
    .route("/account/logout",   post(account::logout))
    // Chats
    .route("/chat/create",  post(chats::create::<S>))
    .route("/chat/member",  post(chats::add_member::<S>))
    .route("/chat/modify",  put(chats::modify::<S>))
    .route("/chat/info",    post(chats::info::<S>))
    .route("/chat/members", post(chats::members::<S>))
    .route("/chat/active",  get(chats::active::<S>))
    // Messages
    .route("/chat/send",     post(messages::send::<S>))
    .route("/chat/messages", post(messages::history::<S>))
    .route(
      "/notifications",
      get(messages::notifications::<S>)
        .delete(messages::clear_notifications::<S>),
    )
    .with_state(state)
}

/// The full application: routes plus in-memory cookie sessions and request
/// tracing.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: MessagingStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let sessions =
    SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

  router(state)
    .layer(sessions)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
