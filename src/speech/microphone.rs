//! Microphone-backed recognizer
//!
//! A listening session records one utterance from the default input device.
//! Capture runs on a blocking thread; WAV chunks go to an async task that
//! transcribes them and emits [`RecognitionEvent`]s. While the user speaks,
//! the audio so far is re-transcribed periodically for interim results.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::{EVENT_CAPACITY, RecognitionEvent, SpeechRecognizer};
use crate::voice::{Activity, AudioCapture, Endpointer, SAMPLE_RATE, SpeechToText, encode_wav, has_input_device};
use crate::{Error, Result};

/// How often the capture thread drains the microphone buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default speech between interim transcriptions
pub const DEFAULT_INTERIM_INTERVAL: Duration = Duration::from_secs(2);

/// Audio handed from the capture thread to the transcriber
enum Chunk {
    Interim(Vec<u8>),
    Final(Vec<u8>),
    NoSpeech,
    Failed(String),
}

/// Speech recognizer using the local microphone and Whisper
pub struct MicrophoneRecognizer {
    stt: Arc<SpeechToText>,
    events: broadcast::Sender<RecognitionEvent>,
    active: Mutex<Option<CancellationToken>>,
    interim_samples: usize,
}

impl MicrophoneRecognizer {
    /// Create a recognizer transcribing with `stt`
    #[must_use]
    pub fn new(stt: SpeechToText) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            stt: Arc::new(stt),
            events,
            active: Mutex::new(None),
            interim_samples: samples_for(DEFAULT_INTERIM_INTERVAL),
        }
    }

    /// Change how much speech accumulates between interim transcripts
    ///
    /// A zero interval disables interim results.
    #[must_use]
    pub fn with_interim_interval(mut self, interval: Duration) -> Self {
        self.interim_samples = samples_for(interval);
        self
    }
}

impl SpeechRecognizer for MicrophoneRecognizer {
    fn is_available(&self) -> bool {
        has_input_device()
    }

    fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Audio(format!("no async runtime for capture: {e}")))?;

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = active.replace(cancel.clone()) {
                previous.cancel();
            }
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(4);
        let events = self.events.clone();
        let interim_samples = self.interim_samples;
        let capture_cancel = cancel.clone();
        runtime.spawn_blocking(move || {
            record_utterance(&capture_cancel, &chunk_tx, &events, interim_samples);
        });

        runtime.spawn(transcribe_chunks(
            Arc::clone(&self.stt),
            chunk_rx,
            self.events.clone(),
            cancel,
        ));

        Ok(())
    }

    fn stop(&self) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = active {
            cancel.cancel();
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }
}

fn samples_for(interval: Duration) -> usize {
    #[allow(clippy::cast_possible_truncation)]
    let samples = (interval.as_millis() * u128::from(SAMPLE_RATE) / 1000) as usize;
    samples
}

fn emit(events: &broadcast::Sender<RecognitionEvent>, event: RecognitionEvent) {
    if events.send(event).is_err() {
        tracing::trace!("no speech subscribers");
    }
}

/// Record until the utterance ends, the session is cancelled or no speech
/// arrives in time
fn record_utterance(
    cancel: &CancellationToken,
    chunks: &mpsc::Sender<Chunk>,
    events: &broadcast::Sender<RecognitionEvent>,
    interim_samples: usize,
) {
    let mut capture = match AudioCapture::new().and_then(|mut c| c.start().map(|()| c)) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = chunks.blocking_send(Chunk::Failed(e.to_string()));
            return;
        }
    };
    if cancel.is_cancelled() {
        capture.stop();
        return;
    }
    emit(events, RecognitionEvent::Started);

    let mut endpointer = Endpointer::default();
    let mut utterance: Vec<f32> = Vec::new();
    let mut since_interim = 0usize;

    while !cancel.is_cancelled() {
        std::thread::sleep(POLL_INTERVAL);
        let samples = capture.take_buffer();

        match endpointer.process(&samples) {
            Activity::Waiting => {}
            Activity::Speaking => {
                since_interim += samples.len();
                utterance.extend_from_slice(&samples);
                if interim_samples > 0 && since_interim >= interim_samples {
                    since_interim = 0;
                    if let Ok(wav) = encode_wav(&utterance, SAMPLE_RATE) {
                        // drop interim audio when the transcriber is behind
                        let _ = chunks.try_send(Chunk::Interim(wav));
                    }
                }
            }
            Activity::Complete => {
                utterance.extend_from_slice(&samples);
                break;
            }
            Activity::TimedOut => break,
        }
    }

    capture.stop();
    if cancel.is_cancelled() {
        tracing::debug!("listening cancelled, discarding captured audio");
        return;
    }

    let last = if utterance.is_empty() {
        Chunk::NoSpeech
    } else {
        match encode_wav(&utterance, SAMPLE_RATE) {
            Ok(wav) => Chunk::Final(wav),
            Err(e) => Chunk::Failed(e.to_string()),
        }
    };
    let _ = chunks.blocking_send(last);
}

/// Transcribe chunks until the capture side finishes
///
/// Once `cancel` fires nothing more is emitted, so a stopped session cannot
/// reach the subscribers of the next one.
async fn transcribe_chunks(
    stt: Arc<SpeechToText>,
    mut chunks: mpsc::Receiver<Chunk>,
    events: broadcast::Sender<RecognitionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            event = chunk_event(&stt, chunk) => event,
        };
        if let Some(event) = event {
            emit(&events, event);
        }
    }

    if !cancel.is_cancelled() {
        emit(&events, RecognitionEvent::Ended);
    }
}

async fn chunk_event(stt: &SpeechToText, chunk: Chunk) -> Option<RecognitionEvent> {
    match chunk {
        Chunk::Interim(wav) => match stt.transcribe(&wav).await {
            Ok(text) if !text.is_empty() => Some(RecognitionEvent::Transcript(text)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "interim transcription failed");
                None
            }
        },
        Chunk::Final(wav) => Some(match stt.transcribe(&wav).await {
            Ok(text) => RecognitionEvent::Transcript(text),
            Err(e) => RecognitionEvent::Error(e.to_string()),
        }),
        Chunk::NoSpeech => Some(RecognitionEvent::Error("no speech detected".to_string())),
        Chunk::Failed(reason) => Some(RecognitionEvent::Error(reason)),
    }
}
