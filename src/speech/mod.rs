//! Speech input
//!
//! [`SpeechRecognizer`] is the capability seam: start, stop and a stream of
//! [`RecognitionEvent`]s. [`SpeechInput`] turns that stream into listening
//! state plus a transcript the shell mirrors into its input field.

mod microphone;

use std::sync::Arc;

use tokio::sync::broadcast;

pub use microphone::MicrophoneRecognizer;

use crate::{Error, Result};

/// Notice shown when voice input cannot be offered
pub const UNSUPPORTED_NOTICE: &str = "Speech recognition is not supported on this system. Configure an OpenAI API key and connect a microphone to use voice input.";

/// Capacity of recognizer event channels
pub const EVENT_CAPACITY: usize = 32;

/// Event emitted by a recognizer during a listening session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Capture began
    Started,
    /// Transcript so far (replaces any earlier transcript)
    Transcript(String),
    /// Recognition failed; an `Ended` follows
    Error(String),
    /// The listening session is over
    Ended,
}

/// A speech-recognition capability
pub trait SpeechRecognizer: Send + Sync {
    /// Whether this recognizer can ever listen
    fn is_available(&self) -> bool;

    /// Begin a listening session
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be started
    fn start(&self) -> Result<()>;

    /// End the current listening session, if any
    fn stop(&self);

    /// Subscribe to recognition events
    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent>;
}

/// Recognizer for systems without voice input
#[derive(Debug)]
pub struct UnavailableRecognizer {
    events: broadcast::Sender<RecognitionEvent>,
}

impl Default for UnavailableRecognizer {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl SpeechRecognizer for UnavailableRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self) -> Result<()> {
        Err(Error::SpeechUnavailable(UNSUPPORTED_NOTICE.to_string()))
    }

    fn stop(&self) {}

    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }
}

/// Listening state of the speech adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningState {
    /// Not listening
    Idle,
    /// A listening session is active
    Listening,
}

/// Change the shell should react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechUpdate {
    /// New transcript to mirror into the input
    Transcript(String),
    /// Listening ended, with the failure if any
    Stopped {
        /// Recognizer error message
        error: Option<String>,
    },
}

/// Listening state machine over a [`SpeechRecognizer`]
pub struct SpeechInput {
    recognizer: Arc<dyn SpeechRecognizer>,
    events: broadcast::Receiver<RecognitionEvent>,
    state: ListeningState,
    transcript: String,
}

impl SpeechInput {
    /// Wrap a recognizer
    #[must_use]
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let events = recognizer.subscribe();
        Self {
            recognizer,
            events,
            state: ListeningState::Idle,
            transcript: String::new(),
        }
    }

    /// Whether voice input can be offered at all
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Begin listening
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpeechUnavailable`] when the capability is missing;
    /// the adapter stays idle.
    pub fn start_listening(&mut self) -> Result<()> {
        if self.state == ListeningState::Listening {
            return Ok(());
        }
        if !self.recognizer.is_available() {
            return Err(Error::SpeechUnavailable(UNSUPPORTED_NOTICE.to_string()));
        }

        // drop events left over from an earlier session
        self.events = self.events.resubscribe();
        self.recognizer.start()?;
        self.state = ListeningState::Listening;
        tracing::debug!("listening started");
        Ok(())
    }

    /// Stop listening immediately
    pub fn stop_listening(&mut self) {
        if self.state == ListeningState::Listening {
            self.recognizer.stop();
            tracing::debug!("listening stopped");
        }
        self.state = ListeningState::Idle;
    }

    /// Apply one recognizer event
    ///
    /// Events arriving while idle are ignored.
    pub fn apply(&mut self, event: RecognitionEvent) -> Option<SpeechUpdate> {
        if self.state == ListeningState::Idle {
            tracing::trace!(?event, "ignoring event while idle");
            return None;
        }

        match event {
            RecognitionEvent::Started => None,
            RecognitionEvent::Transcript(text) => {
                self.transcript.clone_from(&text);
                Some(SpeechUpdate::Transcript(text))
            }
            RecognitionEvent::Error(error) => {
                tracing::warn!(error = %error, "speech recognition failed");
                self.state = ListeningState::Idle;
                Some(SpeechUpdate::Stopped { error: Some(error) })
            }
            RecognitionEvent::Ended => {
                self.state = ListeningState::Idle;
                Some(SpeechUpdate::Stopped { error: None })
            }
        }
    }

    /// Wait for the next event that changes state or transcript
    ///
    /// Returns `None` once the recognizer is gone.
    pub async fn next_update(&mut self) -> Option<SpeechUpdate> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if let Some(update) = self.apply(event) {
                        return Some(update);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "speech events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Current listening state
    #[must_use]
    pub const fn state(&self) -> ListeningState {
        self.state
    }

    /// Whether a listening session is active
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == ListeningState::Listening
    }

    /// Latest transcript
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Forget the transcript
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }
}
