use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tax_assistant::chat::{ChatSession, HttpWebhook, SessionConfig, SubmitOutcome};
use tax_assistant::config::{
    FileStore, LoadOptions, SettingsStore, WEBHOOK_URL_KEY, default_data_dir, validate_webhook_url,
};
use tax_assistant::render::{RenderOptions, render_message};
use tax_assistant::speech::{
    MicrophoneRecognizer, SpeechInput, SpeechRecognizer, UnavailableRecognizer,
};
use tax_assistant::voice::{AudioCapture, AudioPlayer, SilentPlayer, SpeakerPlayer, SpeechToText, rms, start_clip};
use tax_assistant::{Config, PageShell, Terminal};

/// Tax Assistant - ask tax questions through a research webhook
#[derive(Parser)]
#[command(name = "tax-assistant", version, about)]
struct Cli {
    /// Webhook URL questions are posted to
    #[arg(long, env = "TAX_ASSISTANT_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice input and reply playback
    #[arg(long, env = "TAX_ASSISTANT_DISABLE_VOICE")]
    no_voice: bool,

    /// Show replies as literal text instead of markdown
    #[arg(long)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// Ask one question and print the reply
    Ask {
        /// Question text
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Show, save or clear the stored webhook URL
    Webhook {
        /// New webhook URL
        url: Option<String>,
        /// Remove the stored URL
        #[arg(long, conflicts_with = "url")]
        clear: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output with a reply recording
    TestSpeaker {
        /// URL of a WAV or MP3 file
        url: String,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the conversation
    let filter = match cli.verbose {
        0 => "warn",
        1 => "warn,tax_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = LoadOptions {
        webhook_url: cli.webhook_url,
        disable_voice: cli.no_voice,
        plain: cli.plain,
    };

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&options).await,
        Command::Ask { question } => ask(&options, &question.join(" ")).await,
        Command::Webhook { url, clear } => webhook(url.as_deref(), clear),
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker { url } => test_speaker(&url).await,
        Command::Setup => tax_assistant::setup::run_setup(),
    }
}

/// Run the interactive chat
async fn chat(options: &LoadOptions) -> anyhow::Result<()> {
    let config = Config::load_with_options(options);
    tracing::debug!(?config, "loaded configuration");

    let (player, recognizer) = voice_io(&config);
    let session = Arc::new(ChatSession::new(
        SessionConfig {
            endpoint: config.webhook_url.clone(),
        },
        Arc::new(HttpWebhook::new()),
        Arc::clone(&player),
    ));

    let shell = PageShell::new(
        config.ui,
        Arc::new(config.settings_store()),
        config.webhook_url.clone(),
    );

    tracing::info!(
        webhook = config.webhook_url.as_deref().unwrap_or("<unset>"),
        voice = config.voice.enabled,
        "starting chat"
    );

    Terminal::new(
        session,
        shell,
        SpeechInput::new(recognizer),
        player,
        config.download_dir.clone(),
    )
    .run()
    .await?;

    Ok(())
}

/// Pick playback and recognition backends for the configuration
fn voice_io(config: &Config) -> (Arc<dyn AudioPlayer>, Arc<dyn SpeechRecognizer>) {
    if !config.voice.enabled {
        return (Arc::new(SilentPlayer), Arc::new(UnavailableRecognizer::default()));
    }

    let player: Arc<dyn AudioPlayer> = Arc::new(SpeakerPlayer::new());

    let Some(key) = config.api_keys.openai.clone() else {
        tracing::info!("no OpenAI API key configured, voice input unavailable");
        return (player, Arc::new(UnavailableRecognizer::default()));
    };

    match SpeechToText::new_whisper(key, config.voice.stt_model.clone(), &config.voice.language) {
        Ok(stt) => (player, Arc::new(MicrophoneRecognizer::new(stt))),
        Err(e) => {
            tracing::warn!(error = %e, "speech-to-text unavailable");
            (player, Arc::new(UnavailableRecognizer::default()))
        }
    }
}

/// Ask a single question
async fn ask(options: &LoadOptions, question: &str) -> anyhow::Result<()> {
    let config = Config::load_with_options(options);
    let session = ChatSession::new(
        SessionConfig {
            endpoint: config.webhook_url.clone(),
        },
        Arc::new(HttpWebhook::new()),
        Arc::new(SilentPlayer),
    );

    let outcome = session.submit(question, None).await;
    if outcome == SubmitOutcome::Rejected {
        anyhow::bail!("question is empty");
    }

    let render = RenderOptions {
        markdown: config.ui.markdown,
    };
    if let Some(reply) = session.last_assistant() {
        let index = session.len() - 1;
        print!("{}", render_message(&reply, &render).to_terminal(index, &reply.text));
    }

    if outcome == SubmitOutcome::Failed {
        anyhow::bail!("the webhook did not answer");
    }
    Ok(())
}

/// Show, save or clear the stored webhook URL
fn webhook(url: Option<&str>, clear: bool) -> anyhow::Result<()> {
    let store = FileStore::in_dir(&default_data_dir());

    if clear {
        store.remove(WEBHOOK_URL_KEY)?;
        println!("Stored webhook URL cleared");
        return Ok(());
    }

    if let Some(url) = url {
        let url = validate_webhook_url(url)?;
        store.set(WEBHOOK_URL_KEY, &url)?;
        println!("Stored webhook URL: {url}");
        return Ok(());
    }

    match store.get(WEBHOOK_URL_KEY)? {
        Some(url) => println!("Stored webhook URL: {url}"),
        None => println!("No webhook URL stored ({})", store.path().display()),
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output by playing a recording to the end
async fn test_speaker(url: &str) -> anyhow::Result<()> {
    println!("Fetching {url}...");

    let clip = SpeakerPlayer::new().fetch(url).await?;
    let length = clip.duration();
    println!(
        "Playing {:.1}s at {} Hz...",
        length.as_secs_f32(),
        clip.sample_rate
    );

    start_clip(clip).await?;
    tokio::time::sleep(length + Duration::from_millis(500)).await;

    println!("\n---");
    println!("If you heard the recording, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
