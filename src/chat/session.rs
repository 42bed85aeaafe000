//! Chat session store
//!
//! Holds the ordered message list and the in-flight flag for one run of the
//! client. The list is append-only; at most one webhook request is in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::message::{ChatMessage, Role};
use super::webhook::Webhook;
use crate::voice::AudioPlayer;

/// Text appended when the webhook cannot be reached or answers badly
pub const FAILURE_TEXT: &str = "I'm sorry, I'm currently unable to process your request. This could be due to a connectivity issue or the service being temporarily unavailable. Please try again shortly.";

/// Session construction parameters
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Webhook URL used when a submission carries no override
    pub endpoint: Option<String>,
}

/// What a call to [`ChatSession::submit`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank; nothing changed
    Rejected,
    /// Another request was in flight; nothing changed
    Busy,
    /// The webhook answered and its reply was appended
    Answered,
    /// The request failed and the fallback reply was appended
    Failed,
    /// The request was cancelled; only the user message was appended
    Cancelled,
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

/// A submission whose user message is appended and flag is set
struct Started {
    query: String,
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SessionState {
    messages: Vec<ChatMessage>,
    in_flight: Option<InFlight>,
    generation: u64,
}

/// In-memory conversation state shared between the shell and its tasks
pub struct ChatSession {
    config: SessionConfig,
    webhook: Arc<dyn Webhook>,
    player: Arc<dyn AudioPlayer>,
    state: Mutex<SessionState>,
    revision: watch::Sender<u64>,
}

/// Clears the in-flight flag when a submission ends, however it ends
struct InFlightGuard<'a> {
    session: &'a ChatSession,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.session.lock();
            if state
                .in_flight
                .as_ref()
                .is_some_and(|f| f.generation == self.generation)
            {
                state.in_flight = None;
            }
        }
        self.session.bump();
    }
}

impl ChatSession {
    /// Create a session seeded with the welcome message
    #[must_use]
    pub fn new(
        config: SessionConfig,
        webhook: Arc<dyn Webhook>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            config,
            webhook,
            player,
            state: Mutex::new(SessionState {
                messages: vec![ChatMessage::welcome()],
                ..SessionState::default()
            }),
            revision,
        }
    }

    /// Submit a question and wait for the reply to settle
    ///
    /// `endpoint_override` replaces the configured webhook URL for this
    /// request when it is non-empty.
    pub async fn submit(&self, text: &str, endpoint_override: Option<&str>) -> SubmitOutcome {
        match self.begin(text) {
            Ok(started) => self.settle(started, endpoint_override).await,
            Err(outcome) => outcome,
        }
    }

    /// Submit a question and let the reply settle on a background task
    ///
    /// The user message and the in-flight flag are in place when this
    /// returns, so an immediate second call reports
    /// [`SubmitOutcome::Busy`].
    ///
    /// # Errors
    ///
    /// Returns [`SubmitOutcome::Rejected`] or [`SubmitOutcome::Busy`] when
    /// nothing was started
    pub fn spawn_submit(
        self: &Arc<Self>,
        text: &str,
        endpoint_override: Option<String>,
    ) -> Result<JoinHandle<SubmitOutcome>, SubmitOutcome> {
        let started = self.begin(text)?;
        let session = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let outcome = session.settle(started, endpoint_override.as_deref()).await;
            tracing::debug!(?outcome, "submission settled");
            outcome
        }))
    }

    fn begin(&self, text: &str) -> Result<Started, SubmitOutcome> {
        let query = text.trim();
        if query.is_empty() {
            tracing::trace!("ignoring blank submission");
            return Err(SubmitOutcome::Rejected);
        }

        let started = {
            let mut state = self.lock();
            if state.in_flight.is_some() {
                tracing::debug!("request already in flight, ignoring submission");
                return Err(SubmitOutcome::Busy);
            }

            state.messages.push(ChatMessage::user(query));
            state.generation += 1;
            let cancel = CancellationToken::new();
            state.in_flight = Some(InFlight {
                generation: state.generation,
                cancel: cancel.clone(),
            });

            Started {
                query: query.to_string(),
                generation: state.generation,
                cancel,
            }
        };
        self.bump();
        Ok(started)
    }

    async fn settle(&self, started: Started, endpoint_override: Option<&str>) -> SubmitOutcome {
        let Started {
            query,
            generation,
            cancel,
        } = started;
        let guard = InFlightGuard {
            session: self,
            generation,
        };

        let endpoint = endpoint_override
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .or(self.config.endpoint.as_deref())
            .unwrap_or_default();

        tracing::info!(generation, "submitting question");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            reply = self.webhook.ask(endpoint, &query) => Some(reply),
        };

        let (outcome, speech_url) = {
            let mut state = self.lock();
            match result {
                None => {
                    tracing::info!(generation, "request cancelled");
                    (SubmitOutcome::Cancelled, None)
                }
                Some(Ok(reply)) => {
                    let speech_url = reply.speech_url.clone();
                    state.messages.push(
                        ChatMessage::assistant(reply.text)
                            .with_speech_url(reply.speech_url)
                            .with_references(reply.references),
                    );
                    (SubmitOutcome::Answered, speech_url)
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "webhook request failed");
                    state.messages.push(ChatMessage::assistant(FAILURE_TEXT));
                    (SubmitOutcome::Failed, None)
                }
            }
        };
        self.bump();

        if let Some(url) = speech_url
            && let Err(e) = self.player.play(&url).await
        {
            tracing::debug!(error = %e, url, "discarding playback failure");
        }

        drop(guard);
        outcome
    }

    /// Cancel the in-flight request, if any
    ///
    /// Returns `true` when a request was cancelled.
    pub fn cancel(&self) -> bool {
        let state = self.lock();
        let Some(in_flight) = state.in_flight.as_ref() else {
            return false;
        };
        in_flight.cancel.cancel();
        tracing::debug!(generation = in_flight.generation, "cancelling request");
        true
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Snapshot of the message list
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    /// Number of messages, welcome included
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    /// Always false: the welcome message is present from the start
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    /// Message at `index` in arrival order
    #[must_use]
    pub fn message(&self, index: usize) -> Option<ChatMessage> {
        self.lock().messages.get(index).cloned()
    }

    /// Most recent assistant message
    #[must_use]
    pub fn last_assistant(&self) -> Option<ChatMessage> {
        self.lock()
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .cloned()
    }

    /// Watch the revision counter, bumped on every list or flag change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
