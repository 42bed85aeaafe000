//! Voice I/O
//!
//! Microphone capture, utterance endpointing, Whisper transcription and
//! playback of reply audio.

mod activity;
mod capture;
mod playback;
mod stt;

pub use activity::{Activity, DEFAULT_NO_SPEECH_TIMEOUT, Endpointer, rms};
pub use capture::{AudioCapture, SAMPLE_RATE, encode_wav, has_input_device};
pub use playback::{AudioPlayer, Clip, SilentPlayer, SpeakerPlayer, decode_audio, start_clip};
pub use stt::{SpeechToText, WHISPER_URL};
