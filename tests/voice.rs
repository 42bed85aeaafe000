//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tax_assistant::voice::{
    Activity, Endpointer, SAMPLE_RATE, SpeakerPlayer, SpeechToText, decode_audio, encode_wav,
};

mod common;
use common::serve;

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_silence_times_out() {
    let mut endpointer = Endpointer::new(Duration::from_secs(1));

    assert_eq!(endpointer.process(&generate_silence(0.5)), Activity::Waiting);
    assert_eq!(endpointer.process(&generate_silence(0.5)), Activity::TimedOut);
    assert!(!endpointer.heard_speech());
}

#[test]
fn test_utterance_completes_after_trailing_silence() {
    let mut endpointer = Endpointer::default();

    assert_eq!(
        endpointer.process(&generate_sine_samples(440.0, 0.5, 0.5)),
        Activity::Speaking
    );
    // a short pause keeps the utterance open
    assert_eq!(endpointer.process(&generate_silence(0.5)), Activity::Speaking);
    assert_eq!(endpointer.process(&generate_silence(0.5)), Activity::Complete);
}

#[test]
fn test_speech_resets_silence() {
    let mut endpointer = Endpointer::default();

    endpointer.process(&generate_sine_samples(440.0, 0.5, 0.5));
    endpointer.process(&generate_silence(0.8));
    endpointer.process(&generate_sine_samples(440.0, 0.2, 0.5));
    assert_eq!(endpointer.process(&generate_silence(0.8)), Activity::Speaking);
}

#[test]
fn test_wav_encoding_decodes_back() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav = encode_wav(&samples, SAMPLE_RATE).unwrap();

    assert!(wav.starts_with(b"RIFF"));
    let clip = decode_audio(&wav).unwrap();
    assert_eq!(clip.sample_rate, SAMPLE_RATE);
    assert_eq!(clip.samples.len(), samples.len());
}

async fn whisper(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer test-key");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    axum::Json(serde_json::json!({ "text": "  How are dividends taxed?  " })).into_response()
}

#[tokio::test]
async fn test_transcription_against_local_server() {
    let base = serve(Router::new().route("/v1/audio/transcriptions", post(whisper))).await;
    let stt = SpeechToText::new_whisper("test-key".into(), "whisper-1".into(), "en-US")
        .unwrap()
        .with_endpoint(format!("{base}/v1/audio/transcriptions"));

    let wav = encode_wav(&generate_sine_samples(440.0, 0.1, 0.5), SAMPLE_RATE).unwrap();
    assert_eq!(stt.transcribe(&wav).await.unwrap(), "How are dividends taxed?");
}

#[tokio::test]
async fn test_transcription_error_status() {
    let base = serve(Router::new().route("/v1/audio/transcriptions", post(whisper))).await;
    let stt = SpeechToText::new_whisper("wrong-key".into(), "whisper-1".into(), "en")
        .unwrap()
        .with_endpoint(format!("{base}/v1/audio/transcriptions"));

    let wav = encode_wav(&generate_silence(0.1), SAMPLE_RATE).unwrap();
    let err = stt.transcribe(&wav).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_reply_audio_fetch_and_decode() {
    let wav = encode_wav(&generate_sine_samples(440.0, 0.25, 0.3), SAMPLE_RATE).unwrap();
    let base = serve(
        Router::new()
            .route("/reply.wav", get(move || {
                let wav = wav.clone();
                async move { wav }
            }))
            .route("/missing.mp3", get(|| async { StatusCode::NOT_FOUND })),
    )
    .await;

    let player = SpeakerPlayer::new();
    let clip = player.fetch(&format!("{base}/reply.wav")).await.unwrap();
    assert_eq!(clip.duration(), Duration::from_millis(250));

    assert!(player.fetch(&format!("{base}/missing.mp3")).await.is_err());
}
