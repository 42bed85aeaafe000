//! Audio playback of reply recordings

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Plays the audio behind a reply's speech URL
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playing the audio at `url`
    ///
    /// Resolves once playback has begun, not when it ends.
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be fetched, decoded or played
    async fn play(&self, url: &str) -> Result<()>;
}

/// Player used when voice output is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, url: &str) -> Result<()> {
        tracing::debug!(url, "voice output disabled, skipping playback");
        Ok(())
    }
}

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Samples per second
    pub sample_rate: u32,
}

impl Clip {
    /// Playback length
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples.len() as u64 * 1000 / u64::from(self.sample_rate))
    }
}

/// Downloads audio over HTTP and plays it on the default output device
#[derive(Debug, Clone, Default)]
pub struct SpeakerPlayer {
    client: reqwest::Client,
}

impl SpeakerPlayer {
    /// Create a speaker player
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Download and decode the audio at `url`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not WAV or MP3
    pub async fn fetch(&self, url: &str) -> Result<Clip> {
        tracing::debug!(url, "fetching reply audio");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Audio(format!("audio fetch failed with {status}")));
        }

        let bytes = response.bytes().await?;
        decode_audio(&bytes)
    }
}

#[async_trait]
impl AudioPlayer for SpeakerPlayer {
    async fn play(&self, url: &str) -> Result<()> {
        let clip = self.fetch(url).await?;
        start_clip(clip).await
    }
}

/// Play `clip` on the default output device
///
/// Resolves once the stream is running; playback continues on a blocking
/// thread.
///
/// # Errors
///
/// Returns error if no output stream can be opened
pub async fn start_clip(clip: Clip) -> Result<()> {
    let (started_tx, started_rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || play_clip_blocking(&clip, started_tx));

    started_rx
        .await
        .map_err(|_| Error::Audio("playback thread exited early".to_string()))?
}

/// Decode WAV or MP3 bytes into a mono clip
///
/// # Errors
///
/// Returns error if the bytes are neither valid WAV nor MP3
pub fn decode_audio(data: &[u8]) -> Result<Clip> {
    if data.starts_with(b"RIFF") {
        decode_wav(data)
    } else {
        decode_mp3(data)
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode_wav(data: &[u8]) -> Result<Clip> {
    let reader = hound::WavReader::new(Cursor::new(data)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    Ok(Clip {
        samples: downmix(&interleaved, usize::from(spec.channels)),
        sample_rate: spec.sample_rate,
    })
}

fn decode_mp3(data: &[u8]) -> Result<Clip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                }
                let frame_samples: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&frame_samples, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("no audio frames found".to_string()));
    }

    Ok(Clip {
        samples,
        sample_rate,
    })
}

/// Average interleaved channels down to mono
#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1))
        .or_else(|| {
            device
                .supported_output_configs()
                .ok()?
                .find(|c| supports(c, 2))
        })
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Play a clip to completion, reporting on `started` once the stream runs
fn play_clip_blocking(clip: &Clip, started: oneshot::Sender<Result<()>>) {
    let (stream, finished) = match open_stream(clip) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = started.send(Err(Error::Audio(e.to_string())));
        return;
    }
    let _ = started.send(Ok(()));

    let deadline = Instant::now() + clip.duration() + Duration::from_millis(500);
    while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    // let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);
    tracing::debug!(samples = clip.samples.len(), "playback complete");
}

fn open_stream(clip: &Clip) -> Result<(cpal::Stream, Arc<AtomicBool>)> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
    let config = output_config(&device, clip.sample_rate)?;
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = clip.sample_rate,
        channels,
        "starting playback"
    );

    let samples = clip.samples.clone();
    let finished = Arc::new(AtomicBool::new(false));
    let finished_cb = Arc::clone(&finished);
    let mut position = 0usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(position).copied().unwrap_or_else(|| {
                        finished_cb.store(true, Ordering::Release);
                        0.0
                    });
                    frame.fill(sample);
                    position = position.saturating_add(1);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    Ok((stream, finished))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::encode_wav;

    #[test]
    fn downmix_averages_stereo() {
        assert_eq!(downmix(&[0.5, -0.5, 1.0, 0.0], 2), vec![0.0, 0.5]);
    }

    #[test]
    fn decodes_wav_bytes() {
        let wav = encode_wav(&[0.0, 0.5, -0.5, 0.25], 16000).unwrap();
        let clip = decode_audio(&wav).unwrap();
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.samples.len(), 4);
        assert!((clip.samples[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_audio(b"definitely not audio").is_err());
    }

    #[test]
    fn clip_duration() {
        let clip = Clip {
            samples: vec![0.0; 24000],
            sample_rate: 24000,
        };
        assert_eq!(clip.duration(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn silent_player_accepts_anything() {
        assert!(SilentPlayer.play("https://example.com/a.mp3").await.is_ok());
    }
}
