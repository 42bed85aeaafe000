//! Shared test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tax_assistant::chat::{ChatSession, Reply, SessionConfig, Webhook};
use tax_assistant::voice::AudioPlayer;
use tax_assistant::{Error, Result};
use tokio::sync::Notify;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    format!("http://{addr}")
}

/// Webhook that holds every answer until released
#[derive(Default)]
pub struct GatedWebhook {
    gate: Notify,
    queries: Mutex<Vec<String>>,
}

impl GatedWebhook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let one pending (or the next) request answer
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Webhook for GatedWebhook {
    async fn ask(&self, _endpoint: &str, query: &str) -> Result<Reply> {
        self.queries.lock().unwrap().push(query.to_string());
        self.gate.notified().await;
        Ok(Reply {
            text: format!("answer to {query}"),
            speech_url: None,
            references: None,
        })
    }
}

/// Player that records requested URLs and can be told to fail or stall
#[derive(Default)]
pub struct RecordingPlayer {
    pub played: Mutex<Vec<String>>,
    pub fail: bool,
    pub gate: Option<Notify>,
}

impl RecordingPlayer {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayer for RecordingPlayer {
    async fn play(&self, url: &str) -> Result<()> {
        self.played.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(Error::Audio("no output device available".into()));
        }
        Ok(())
    }
}

/// Session over an HTTP webhook at `endpoint`
pub fn http_session(endpoint: Option<String>, player: Arc<dyn AudioPlayer>) -> ChatSession {
    ChatSession::new(
        SessionConfig { endpoint },
        Arc::new(tax_assistant::HttpWebhook::new()),
        player,
    )
}

/// Poll `condition` until it holds, failing after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
