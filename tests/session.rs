//! Chat session integration tests
//!
//! Drives the session against a local axum webhook and gated fakes.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::post;
use serde_json::{Value, json};
use tax_assistant::chat::{
    ChatSession, FAILURE_TEXT, NO_ANSWER_TEXT, Reference, Role, SessionConfig, SubmitOutcome,
};
use tax_assistant::voice::SilentPlayer;
use tokio::sync::Notify;
use tokio_test::assert_ok;

mod common;
use common::{GatedWebhook, RecordingPlayer, http_session, serve, wait_until};

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default();
    Json(json!({
        "message": format!("You asked: {query}"),
        "sources": [
            { "title": "Section 12", "url": "https://tax.example.com/s12" },
            { "title": "Form 1040" },
            { "url": "https://untitled.example.com" }
        ]
    }))
}

async fn spoken() -> Json<Value> {
    Json(json!({ "text": "Here you go", "speech": "https://cdn.example.com/reply.mp3" }))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn empty_object() -> Json<Value> {
    Json(json!({}))
}

async fn html_page() -> Html<&'static str> {
    Html("<html><body>Gateway timeout</body></html>")
}

async fn webhook_server() -> String {
    serve(
        Router::new()
            .route("/echo", post(echo))
            .route("/spoken", post(spoken))
            .route("/broken", post(broken))
            .route("/empty", post(empty_object))
            .route("/html", post(html_page)),
    )
    .await
}

#[tokio::test]
async fn test_reply_is_appended_with_references() {
    let base = webhook_server().await;
    let session = http_session(Some(format!("{base}/echo")), Arc::new(SilentPlayer));

    let outcome = session.submit("  What deductions can I claim?  ", None).await;
    assert_eq!(outcome, SubmitOutcome::Answered);

    let messages = session.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].text, "What deductions can I claim?");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].text, "You asked: What deductions can I claim?");
    assert_eq!(
        messages[2].references(),
        &[
            Reference {
                title: "Section 12".into(),
                url: Some("https://tax.example.com/s12".into()),
            },
            Reference {
                title: "Form 1040".into(),
                url: None,
            },
        ]
    );
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_server_error_appends_failure_text() {
    let base = webhook_server().await;
    let session = http_session(Some(format!("{base}/broken")), Arc::new(SilentPlayer));

    assert_eq!(session.submit("hello", None).await, SubmitOutcome::Failed);

    let last = session.last_assistant().unwrap();
    assert_eq!(last.text, FAILURE_TEXT);
    assert!(last.references().is_empty());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_missing_endpoint_fails_gracefully() {
    let session = http_session(None, Arc::new(SilentPlayer));
    assert_eq!(session.submit("hello", None).await, SubmitOutcome::Failed);
    assert_eq!(session.len(), 3);
}

/// Address of a local port with nothing listening
async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/webhook")
}

fn failure_count(session: &ChatSession) -> usize {
    session
        .messages()
        .iter()
        .filter(|m| m.text == FAILURE_TEXT)
        .count()
}

#[tokio::test]
async fn test_unreachable_webhook_appends_failure_text() {
    let session = http_session(Some(closed_port_url().await), Arc::new(SilentPlayer));

    assert_eq!(session.submit("hello", None).await, SubmitOutcome::Failed);
    assert_eq!(session.len(), 3);
    assert_eq!(failure_count(&session), 1);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_html_body_appends_failure_text() {
    let base = webhook_server().await;
    let session = http_session(Some(format!("{base}/html")), Arc::new(SilentPlayer));

    assert_eq!(session.submit("hello", None).await, SubmitOutcome::Failed);
    assert_eq!(session.len(), 3);
    assert_eq!(failure_count(&session), 1);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_unrecognized_body_gets_no_answer_text() {
    let base = webhook_server().await;
    let session = http_session(Some(format!("{base}/empty")), Arc::new(SilentPlayer));

    assert_eq!(session.submit("hello", None).await, SubmitOutcome::Answered);
    assert_eq!(session.last_assistant().unwrap().text, NO_ANSWER_TEXT);
}

#[tokio::test]
async fn test_override_endpoint_wins() {
    let base = webhook_server().await;
    let session = http_session(Some(format!("{base}/broken")), Arc::new(SilentPlayer));

    let outcome = session.submit("hi", Some(format!("{base}/echo").as_str())).await;
    assert_eq!(outcome, SubmitOutcome::Answered);

    // blank override falls back to the configured endpoint
    assert_eq!(session.submit("hi", Some("  ")).await, SubmitOutcome::Failed);
}

#[tokio::test]
async fn test_submission_while_loading_is_ignored() {
    let webhook = GatedWebhook::new();
    let session = Arc::new(ChatSession::new(
        SessionConfig::default(),
        webhook.clone(),
        Arc::new(SilentPlayer),
    ));

    let first = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit("first", None).await }
    });
    wait_until(|| session.is_loading()).await;

    assert_eq!(session.submit("second", None).await, SubmitOutcome::Busy);
    assert_eq!(session.len(), 2);

    webhook.release();
    assert_eq!(assert_ok!(first.await), SubmitOutcome::Answered);
    assert_eq!(webhook.queries(), vec!["first".to_string()]);
    assert_eq!(session.len(), 3);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_background_submission_reserves_session_at_once() {
    let webhook = GatedWebhook::new();
    let session = Arc::new(ChatSession::new(
        SessionConfig::default(),
        webhook.clone(),
        Arc::new(SilentPlayer),
    ));

    let first = session.spawn_submit("first", None).unwrap();
    assert!(session.is_loading());
    assert_eq!(session.len(), 2);

    assert_eq!(
        session.spawn_submit("second", None).unwrap_err(),
        SubmitOutcome::Busy
    );
    assert_eq!(
        session.spawn_submit("   ", None).unwrap_err(),
        SubmitOutcome::Rejected
    );
    assert_eq!(session.len(), 2);

    wait_until(|| !webhook.queries().is_empty()).await;
    webhook.release();
    assert_eq!(assert_ok!(first.await), SubmitOutcome::Answered);
    assert_eq!(webhook.queries(), vec!["first".to_string()]);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_cancel_discards_reply() {
    let webhook = GatedWebhook::new();
    let session = Arc::new(ChatSession::new(
        SessionConfig::default(),
        webhook.clone(),
        Arc::new(SilentPlayer),
    ));

    let pending = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit("never mind", None).await }
    });
    wait_until(|| session.is_loading()).await;

    assert!(session.cancel());
    assert_eq!(assert_ok!(pending.await), SubmitOutcome::Cancelled);
    assert!(!session.is_loading());

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].text, "never mind");

    // a late answer has nowhere to go
    webhook.release();
    assert!(!session.cancel());
}

#[tokio::test]
async fn test_reply_audio_played_once() {
    let base = webhook_server().await;
    let player = Arc::new(RecordingPlayer::default());
    let session = http_session(Some(format!("{base}/spoken")), player.clone());

    assert_eq!(session.submit("read it to me", None).await, SubmitOutcome::Answered);
    assert_eq!(player.played(), vec!["https://cdn.example.com/reply.mp3".to_string()]);
    assert_eq!(
        session.last_assistant().unwrap().speech_url.as_deref(),
        Some("https://cdn.example.com/reply.mp3")
    );
}

#[tokio::test]
async fn test_no_audio_without_speech_url() {
    let base = webhook_server().await;
    let player = Arc::new(RecordingPlayer::default());
    let session = http_session(Some(format!("{base}/echo")), player.clone());

    session.submit("quiet please", None).await;
    assert!(player.played().is_empty());
}

#[tokio::test]
async fn test_playback_failure_is_discarded() {
    let base = webhook_server().await;
    let player = Arc::new(RecordingPlayer {
        fail: true,
        ..RecordingPlayer::default()
    });
    let session = http_session(Some(format!("{base}/spoken")), player.clone());

    assert_eq!(session.submit("hello", None).await, SubmitOutcome::Answered);
    assert_eq!(session.last_assistant().unwrap().text, "Here you go");
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_loading_until_playback_starts() {
    let base = webhook_server().await;
    let player = Arc::new(RecordingPlayer {
        gate: Some(Notify::new()),
        ..RecordingPlayer::default()
    });
    let session = Arc::new(http_session(Some(format!("{base}/spoken")), player.clone()));

    let pending = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit("hello", None).await }
    });

    wait_until(|| !player.played().is_empty()).await;
    assert_eq!(session.len(), 3);
    assert!(session.is_loading());

    player.gate.as_ref().unwrap().notify_one();
    assert_eq!(assert_ok!(pending.await), SubmitOutcome::Answered);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_revision_observed_on_each_change() {
    let base = webhook_server().await;
    let session = http_session(Some(format!("{base}/echo")), Arc::new(SilentPlayer));
    let mut revisions = session.subscribe();
    revisions.borrow_and_update();

    session.submit("hello", None).await;
    assert!(revisions.has_changed().unwrap());
}
