//! Integration tests driving the full router, session layer included,
//! through `tower::ServiceExt::oneshot`.

use std::{
  path::PathBuf,
  sync::{Arc, Mutex},
  time::Duration,
};

use async_trait::async_trait;
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use courier_notify::{Mailer, OutgoingMail, TemplateSource, Templates};
use courier_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, MailConfig, ServerConfig, app};

// ─── Harness ─────────────────────────────────────────────────────────────────

/// Captures outgoing mail instead of delivering it.
#[derive(Default)]
struct RecordingMailer {
  sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send(&self, mail: OutgoingMail) -> courier_notify::Result<()> {
    self.sent.lock().unwrap().push(mail);
    Ok(())
  }
}

struct TestApp {
  app:    Router,
  mailer: Arc<RecordingMailer>,
}

async fn make_app() -> TestApp {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let mailer = Arc::new(RecordingMailer::default());

  let state = AppState {
    store,
    mailer: Arc::clone(&mailer) as Arc<dyn Mailer>,
    templates: Arc::new(Templates::new()),
    config: Arc::new(ServerConfig {
      host:       "127.0.0.1".to_string(),
      port:       0,
      store_path: PathBuf::from(":memory:"),
      mail:       MailConfig {
        from:                  "noreply@courier.test".to_string(),
        verification_subject:  "Your login code".to_string(),
        // The rendered body is exactly the code, so tests can read it back.
        verification_template: TemplateSource::Inline("{code}".to_string()),
      },
    }),
  };

  TestApp { app: app(state), mailer }
}

impl TestApp {
  fn mail_count(&self) -> usize { self.mailer.sent.lock().unwrap().len() }

  /// Wait for the mail spawned by a dispatch and return the code it carried.
  ///
  /// Mail delivery is a spawned task, so the helper waits for a mail past the
  /// `baseline` count captured before the dispatch; returning the newest mail
  /// as soon as the list is non-empty would hand a second login the first
  /// user's code.
  async fn code_after(&self, baseline: usize) -> String {
    for _ in 0..100 {
      {
        let sent = self.mailer.sent.lock().unwrap();
        if sent.len() > baseline {
          return sent[baseline].html.clone();
        }
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no verification mail arrived");
  }
}

async fn req(
  app: &Router,
  method: &str,
  uri: &str,
  cookie: Option<&str>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(cookie) = cookie {
    builder = builder.header(header::COOKIE, cookie);
  }
  let request = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  app.clone().oneshot(request).await.unwrap()
}

fn session_cookie(resp: &Response) -> Option<String> {
  resp
    .headers()
    .get(header::SET_COOKIE)
    .and_then(|v| v.to_str().ok())
    .map(|v| v.split(';').next().unwrap_or(v).to_string())
}

async fn body_json(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

/// Run the dispatch → verify flow and return the session cookie and uuid.
async fn login(t: &TestApp, email: &str) -> (String, Uuid) {
  let baseline = t.mail_count();
  let resp = req(
    &t.app,
    "POST",
    "/account/dispatch",
    None,
    Some(json!({ "email": email })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let code = t.code_after(baseline).await;
  let resp = req(
    &t.app,
    "POST",
    "/account/verify",
    None,
    Some(json!({ "code": code, "destination": email })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let cookie = session_cookie(&resp).expect("verify sets a session cookie");

  let body = body_json(resp).await;
  let uuid = Uuid::parse_str(body["uuid"].as_str().unwrap()).unwrap();
  (cookie, uuid)
}

/// Create a chat as `cookie` and return its cuuid.
async fn create_chat(t: &TestApp, cookie: &str) -> Uuid {
  let resp = req(&t.app, "POST", "/chat/create", Some(cookie), None).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = body_json(resp).await;
  assert_eq!(body["name"], "New Chat");
  Uuid::parse_str(body["cuuid"].as_str().unwrap()).unwrap()
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dispatch_without_email_lists_supported_destinations() {
  let t = make_app().await;
  let resp =
    req(&t.app, "POST", "/account/dispatch", None, Some(json!({}))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["supported"], json!(["email"]));
}

#[tokio::test]
async fn dispatch_rejects_malformed_email() {
  let t = make_app().await;
  for bad in ["not-an-email", "a@b", "a b@example.com", "a@example.toolong"] {
    let resp = req(
      &t.app,
      "POST",
      "/account/dispatch",
      None,
      Some(json!({ "email": bad })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "accepted {bad:?}");
  }
  assert!(t.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_sends_a_six_digit_code() {
  let t = make_app().await;
  let resp = req(
    &t.app,
    "POST",
    "/account/dispatch",
    None,
    Some(json!({ "email": "alice@example.com" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["destination"], "alice@example.com");
  assert_eq!(body["type"], "email");

  let code = t.code_after(0).await;
  assert_eq!(code.len(), 6);
  assert!(code.chars().all(|c| c.is_ascii_digit()));
  let mail = t.mailer.sent.lock().unwrap().last().cloned().unwrap();
  assert_eq!(mail.to, "alice@example.com");
  assert_eq!(mail.subject, "Your login code");
}

// ─── Verify ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn verify_with_wrong_code_fails() {
  let t = make_app().await;
  req(
    &t.app,
    "POST",
    "/account/dispatch",
    None,
    Some(json!({ "email": "alice@example.com" })),
  )
  .await;
  let code = t.code_after(0).await;
  // A wrong code of the right shape.
  let wrong = if code == "000000" { "000001" } else { "000000" };

  let resp = req(
    &t.app,
    "POST",
    "/account/verify",
    None,
    Some(json!({ "code": wrong, "destination": "alice@example.com" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_requires_code_and_destination() {
  let t = make_app().await;
  let resp =
    req(&t.app, "POST", "/account/verify", None, Some(json!({}))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  // Code present but no destination anywhere (body or session).
  let resp = req(
    &t.app,
    "POST",
    "/account/verify",
    None,
    Some(json!({ "code": "123456" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_creates_a_profile_named_after_the_destination() {
  let t = make_app().await;
  req(
    &t.app,
    "POST",
    "/account/dispatch",
    None,
    Some(json!({ "email": "alice@example.com" })),
  )
  .await;
  let code = t.code_after(0).await;

  let resp = req(
    &t.app,
    "POST",
    "/account/verify",
    None,
    Some(json!({ "code": code, "destination": "alice@example.com" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["name"], "alice@example.com");
  assert_eq!(body["destination"], "alice@example.com");
  assert!(body["picture_id"].is_null());
  assert!(body["contacts"].is_null());
  assert!(body["refresh_by"].is_string());
}

#[tokio::test]
async fn verification_code_is_single_use() {
  let t = make_app().await;
  req(
    &t.app,
    "POST",
    "/account/dispatch",
    None,
    Some(json!({ "email": "alice@example.com" })),
  )
  .await;
  let code = t.code_after(0).await;
  let body = json!({ "code": code, "destination": "alice@example.com" });

  let first =
    req(&t.app, "POST", "/account/verify", None, Some(body.clone())).await;
  assert_eq!(first.status(), StatusCode::OK);

  let second = req(&t.app, "POST", "/account/verify", None, Some(body)).await;
  assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn second_login_reuses_the_existing_profile() {
  let t = make_app().await;
  let (cookie, uuid) = login(&t, "alice@example.com").await;

  // Log out, then go through the whole flow again.
  let resp =
    req(&t.app, "POST", "/account/logout", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let (_, second_uuid) = login(&t, "alice@example.com").await;
  assert_eq!(uuid, second_uuid);
}

// ─── Session lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn authenticated_endpoints_reject_anonymous_callers() {
  let t = make_app().await;
  for (method, uri, body) in [
    ("GET", "/account", None),
    ("PUT", "/account/modify", Some(json!({ "name": "x" }))),
    ("POST", "/account/refresh", None),
    ("POST", "/account/logout", None),
    ("POST", "/chat/create", None),
    ("GET", "/chat/active", None),
    ("GET", "/notifications", None),
    ("DELETE", "/notifications", None),
  ] {
    let resp = req(&t.app, method, uri, None, body).await;
    assert_eq!(
      resp.status(),
      StatusCode::UNAUTHORIZED,
      "{method} {uri} let an anonymous caller through"
    );
  }
}

#[tokio::test]
async fn refresh_returns_a_new_expiry() {
  let t = make_app().await;
  let (cookie, _) = login(&t, "alice@example.com").await;

  let resp =
    req(&t.app, "POST", "/account/refresh", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert!(body["refresh_by"].is_string());
}

#[tokio::test]
async fn logout_invalidates_the_cookie() {
  let t = make_app().await;
  let (cookie, _) = login(&t, "alice@example.com").await;

  let resp =
    req(&t.app, "POST", "/account/logout", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = req(&t.app, "GET", "/account", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  // Logging out twice is the same as never being logged in.
  let resp =
    req(&t.app, "POST", "/account/logout", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn modify_account_applies_each_field_and_info_reflects_it() {
  let t = make_app().await;
  let (cookie, uuid) = login(&t, "alice@example.com").await;

  let resp = req(
    &t.app,
    "PUT",
    "/account/modify",
    Some(&cookie),
    Some(json!({
      "name": "Alice",
      "contacts": ["bob@example.com"],
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::ACCEPTED);
  let body = body_json(resp).await;
  assert_eq!(body["name"], "Alice");
  assert_eq!(body["contacts"], json!("[\"bob@example.com\"]"));
  assert!(body["picture_id"].is_null());

  let resp = req(&t.app, "GET", "/account", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["uuid"], json!(uuid));
  assert_eq!(body["name"], "Alice");
  assert_eq!(body["contacts"], json!("[\"bob@example.com\"]"));
}

#[tokio::test]
async fn search_finds_by_destination_and_omits_contacts() {
  let t = make_app().await;
  let (cookie, uuid) = login(&t, "alice@example.com").await;
  req(
    &t.app,
    "PUT",
    "/account/modify",
    Some(&cookie),
    Some(json!({ "contacts": ["secret@example.com"] })),
  )
  .await;

  // Search needs no session at all.
  let resp = req(
    &t.app,
    "POST",
    "/account/search",
    None,
    Some(json!({ "destination": "alice@example.com" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["uuid"], json!(uuid));
  assert!(body.get("contacts").is_none());

  // By uuid too.
  let resp = req(
    &t.app,
    "POST",
    "/account/search",
    None,
    Some(json!({ "uuid": uuid })),
  )
  .await;
  let body = body_json(resp).await;
  assert_eq!(body["destination"], "alice@example.com");
}

#[tokio::test]
async fn search_miss_is_a_success_and_empty_search_is_not() {
  let t = make_app().await;

  let resp = req(
    &t.app,
    "POST",
    "/account/search",
    None,
    Some(json!({ "destination": "nobody@example.com" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert!(body.get("uuid").is_none());
  assert!(body["comment"].is_string());

  let resp =
    req(&t.app, "POST", "/account/search", None, Some(json!({}))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ─── Chats ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_operations_are_gated_on_membership() {
  let t = make_app().await;
  let (alice, _) = login(&t, "alice@example.com").await;
  let (bob, _) = login(&t, "bob@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  // Bob is logged in but not a member.
  let body = json!({ "cuuid": cuuid });
  for (method, uri) in [
    ("POST", "/chat/info"),
    ("POST", "/chat/members"),
    ("POST", "/chat/messages"),
    ("PUT", "/chat/modify"),
  ] {
    let resp = req(&t.app, method, uri, Some(&bob), Some(body.clone())).await;
    assert_eq!(
      resp.status(),
      StatusCode::FORBIDDEN,
      "{method} {uri} ignored the membership gate"
    );
  }

  // A body with no cuuid at all is a different failure.
  let resp =
    req(&t.app, "POST", "/chat/info", Some(&alice), Some(json!({}))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adding_a_member_opens_the_chat_to_them() {
  let t = make_app().await;
  let (alice, alice_uuid) = login(&t, "alice@example.com").await;
  let (bob, bob_uuid) = login(&t, "bob@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  let resp = req(
    &t.app,
    "POST",
    "/chat/member",
    Some(&alice),
    Some(json!({ "cuuid": cuuid, "uuid": bob_uuid })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  let members = body["members"].as_array().unwrap();
  assert_eq!(members.len(), 2);
  assert!(members.contains(&json!(alice_uuid)));
  assert!(members.contains(&json!(bob_uuid)));

  let resp = req(
    &t.app,
    "POST",
    "/chat/info",
    Some(&bob),
    Some(json!({ "cuuid": cuuid })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = req(&t.app, "GET", "/chat/active", Some(&bob), None).await;
  let body = body_json(resp).await;
  assert!(body["chats"].as_array().unwrap().contains(&json!(cuuid)));
}

#[tokio::test]
async fn adding_a_member_without_a_uuid_is_a_bad_request() {
  let t = make_app().await;
  let (alice, _) = login(&t, "alice@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  let resp = req(
    &t.app,
    "POST",
    "/chat/member",
    Some(&alice),
    Some(json!({ "cuuid": cuuid })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_modify_responds_then_announces_in_the_background() {
  let t = make_app().await;
  let (alice, alice_uuid) = login(&t, "alice@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  let resp = req(
    &t.app,
    "PUT",
    "/chat/modify",
    Some(&alice),
    Some(json!({ "cuuid": cuuid, "name": "Weekend plans" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["name"], "Weekend plans");

  // The chat_update message lands asynchronously.
  let mut messages = json!([]);
  for _ in 0..100 {
    let resp = req(
      &t.app,
      "POST",
      "/chat/messages",
      Some(&alice),
      Some(json!({ "cuuid": cuuid })),
    )
    .await;
    let body = body_json(resp).await;
    if !body["messages"].as_array().unwrap().is_empty() {
      messages = body["messages"].clone();
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  let update = &messages.as_array().unwrap()[0];
  assert_eq!(update["message_type"], "chat_update");
  assert_eq!(
    update["content"],
    json!({ "name": "Weekend plans", "picture_id": null })
  );
  assert_eq!(update["sender"], json!(alice_uuid));

  // And it shows up as an unread notification for members.
  let resp = req(&t.app, "GET", "/notifications", Some(&alice), None).await;
  let body = body_json(resp).await;
  let notifications = body["messages"].as_array().unwrap();
  assert_eq!(notifications.len(), 1);
  assert_eq!(notifications[0]["message_type"], "chat_update");
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_fans_out_to_every_member_and_clear_is_idempotent() {
  let t = make_app().await;
  let (alice, alice_uuid) = login(&t, "alice@example.com").await;
  let (bob, bob_uuid) = login(&t, "bob@example.com").await;
  let cuuid = create_chat(&t, &alice).await;
  req(
    &t.app,
    "POST",
    "/chat/member",
    Some(&alice),
    Some(json!({ "cuuid": cuuid, "uuid": bob_uuid })),
  )
  .await;

  let resp = req(
    &t.app,
    "POST",
    "/chat/send",
    Some(&alice),
    Some(json!({
      "cuuid": cuuid,
      "message_type": "text",
      "content": "hello bob",
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["message_type"], "text");
  assert_eq!(body["content"], "hello bob");
  assert_eq!(body["sender"], json!(alice_uuid));

  // Both members, sender included, see it unread.
  for cookie in [&alice, &bob] {
    let resp = req(&t.app, "GET", "/notifications", Some(cookie), None).await;
    let body = body_json(resp).await;
    let notifications = body["messages"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["content"], "hello bob");
  }

  let resp = req(&t.app, "DELETE", "/notifications", Some(&bob), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_json(resp).await["cleared"], 1);

  let resp = req(&t.app, "GET", "/notifications", Some(&bob), None).await;
  assert!(
    body_json(resp).await["messages"]
      .as_array()
      .unwrap()
      .is_empty()
  );

  let resp = req(&t.app, "DELETE", "/notifications", Some(&bob), None).await;
  assert_eq!(body_json(resp).await["cleared"], 0);

  // Alice's markers were untouched by Bob's clear.
  let resp = req(&t.app, "GET", "/notifications", Some(&alice), None).await;
  assert_eq!(
    body_json(resp).await["messages"].as_array().unwrap().len(),
    1
  );
}

#[tokio::test]
async fn typing_messages_are_coerced_to_booleans() {
  let t = make_app().await;
  let (alice, _) = login(&t, "alice@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  let resp = req(
    &t.app,
    "POST",
    "/chat/send",
    Some(&alice),
    Some(json!({ "cuuid": cuuid, "message_type": "typing", "content": 1 })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body_json(resp).await;
  assert_eq!(body["message_type"], "typing");
  assert_eq!(body["content"], json!(true));
}

#[tokio::test]
async fn clients_cannot_forge_chat_updates() {
  let t = make_app().await;
  let (alice, _) = login(&t, "alice@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  let resp = req(
    &t.app,
    "POST",
    "/chat/send",
    Some(&alice),
    Some(json!({
      "cuuid": cuuid,
      "message_type": "chat_update",
      "content": { "name": "Hijacked", "picture_id": null },
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = body_json(resp).await;
  assert_eq!(body["supported"], json!(["text", "typing"]));

  // Nothing was written.
  let resp = req(
    &t.app,
    "POST",
    "/chat/messages",
    Some(&alice),
    Some(json!({ "cuuid": cuuid })),
  )
  .await;
  let body = body_json(resp).await;
  assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn history_returns_messages_oldest_first() {
  let t = make_app().await;
  let (alice, _) = login(&t, "alice@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  for text in ["one", "two", "three"] {
    let resp = req(
      &t.app,
      "POST",
      "/chat/send",
      Some(&alice),
      Some(json!({
        "cuuid": cuuid,
        "message_type": "text",
        "content": text,
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  let resp = req(
    &t.app,
    "POST",
    "/chat/messages",
    Some(&alice),
    Some(json!({ "cuuid": cuuid })),
  )
  .await;
  let body = body_json(resp).await;
  let contents: Vec<&str> = body["messages"]
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["content"].as_str().unwrap())
    .collect();
  assert_eq!(contents, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn send_to_a_chat_you_are_not_in_is_forbidden() {
  let t = make_app().await;
  let (alice, _) = login(&t, "alice@example.com").await;
  let (bob, _) = login(&t, "bob@example.com").await;
  let cuuid = create_chat(&t, &alice).await;

  let resp = req(
    &t.app,
    "POST",
    "/chat/send",
    Some(&bob),
    Some(json!({
      "cuuid": cuuid,
      "message_type": "text",
      "content": "let me in",
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  // The refused send left no trace for members either.
  let resp = req(&t.app, "GET", "/notifications", Some(&alice), None).await;
  assert!(
    body_json(resp).await["messages"]
      .as_array()
      .unwrap()
      .is_empty()
  );
}
