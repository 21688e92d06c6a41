use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use sakura_companion::avatar::AvatarLoadOutcome;
use sakura_companion::voice::{
    AudioClip, AudioOutput, AudioPlayback, ConsoleInput, LipSync, MicrophoneDictationFactory,
    OutputTap, RecognizerFactory, SpeechToText,
};
use sakura_companion::{
    Assistant, AvatarLoader, AvatarPreferences, Config, HttpAvatarLoader,
    OrchestratorSettings, RemoteAssistantClient, SpeechSession, TerminalLog, VoiceOrchestrator,
    WakeWordMatcher,
};

/// Lip sync sampling interval, roughly one render frame at 30 fps
const LIP_SYNC_TICK: Duration = Duration::from_millis(33);

/// Sakura - voice-driven avatar companion
#[derive(Parser)]
#[command(name = "sakura", version, about)]
struct Cli {
    /// Type utterances on stdin instead of speaking them
    #[arg(long)]
    text: bool,

    /// Avatar model URL (overrides the stored preference)
    #[arg(long)]
    avatar_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Store the avatar URL used on the next start
    SetAvatar {
        /// Avatar model URL
        url: String,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Speak a text file line by line
    Present {
        /// Path to the text file
        file: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sakura_companion=info",
        1 => "info,sakura_companion=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::SetAvatar { url } => set_avatar(&url),
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::Present { file } => present(&file).await,
        };
    }

    tracing::info!(text_mode = cli.text, "starting sakura companion");

    let mut config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    if cli.avatar_url.is_some() {
        config.avatar_url = cli.avatar_url;
    }

    let factory: Box<dyn RecognizerFactory> = if cli.text {
        Box::new(ConsoleInput::stdin())
    } else {
        let stt = SpeechToText::new(
            &config.assistant.api_base,
            config.assistant.api_key(),
            config.assistant.stt_model.clone(),
        )?;
        Box::new(MicrophoneDictationFactory::new(stt))
    };

    let playback = AudioPlayback::new()?;
    let lip_sync = tokio::spawn(drive_lip_sync(
        playback.tap(),
        LipSync::new(config.audio.lip_sync_max_open),
    ));

    let orchestrator = build_orchestrator(&config, factory, Box::new(playback))?;
    let avatar_ready = load_avatar(&config);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                // Keep the sender alive so the orchestrator keeps running
                std::future::pending::<()>().await;
            }
        }
    });

    if cli.text {
        tracing::info!("sakura ready - type \"ok sakura ...\"");
    } else {
        tracing::info!("sakura ready - say \"ok sakura ...\"");
    }

    orchestrator.run(avatar_ready, shutdown_rx).await;
    lip_sync.abort();

    Ok(())
}

/// Wire the orchestrator to the remote assistant and terminal log
fn build_orchestrator(
    config: &Config,
    factory: Box<dyn RecognizerFactory>,
    output: Box<dyn AudioOutput>,
) -> anyhow::Result<VoiceOrchestrator> {
    let assistant: Arc<dyn Assistant> = Arc::new(RemoteAssistantClient::new(&config.assistant)?);
    let (session, events) = SpeechSession::new(factory, config.dictation);
    let matcher = WakeWordMatcher::new(
        config.wake.words.clone(),
        config.wake.identity_prompts.clone(),
    );

    Ok(VoiceOrchestrator::new(
        session,
        events,
        assistant,
        output,
        Box::new(TerminalLog::stdout()),
        matcher,
        OrchestratorSettings::from_config(config),
    ))
}

/// Start loading the avatar, or report right away that there is none
fn load_avatar(config: &Config) -> oneshot::Receiver<AvatarLoadOutcome> {
    let prefs = AvatarPreferences::in_dir(&config.data_dir);
    let loader: Arc<dyn AvatarLoader> = Arc::new(HttpAvatarLoader::new(config.cache_dir.clone()));

    prefs.start_load(config.avatar_url.as_deref(), loader)
}

/// Sample the playback tap like a render loop would
async fn drive_lip_sync(tap: OutputTap, lip_sync: LipSync) {
    let mut ticker = tokio::time::interval(LIP_SYNC_TICK);
    let mut last = 0.0_f32;

    loop {
        ticker.tick().await;
        let openness = lip_sync.update(&tap.window());
        if (openness - last).abs() > f32::EPSILON {
            tracing::trace!(openness, "mouth openness");
            last = openness;
        }
    }
}

/// Store the avatar URL used on the next start
fn set_avatar(url: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let prefs = AvatarPreferences::in_dir(&config.data_dir);

    // No loader here, the URL is picked up on the next start
    prefs.submit_url(url, None)?;

    match prefs.avatar_url() {
        Some(saved) => println!("Avatar URL: {saved}"),
        None => println!("No avatar URL stored"),
    }

    Ok(())
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;
    let clip = AudioClip::tone(440.0, Duration::from_secs(2), 0.3, playback.sample_rate());

    println!(
        "Playing {} samples at {} Hz...",
        clip.samples().len(),
        clip.sample_rate()
    );

    playback.play(&clip)?;
    wait_for_playback(&playback).await;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output via the remote speech endpoint
#[allow(clippy::future_not_send)]
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let client = RemoteAssistantClient::new(&config.assistant)?;

    println!("Synthesizing speech...");
    let clip = client.request_speech(text, &config.assistant.voice).await?;
    println!(
        "Got {:.1}s of audio at {} Hz",
        clip.duration().as_secs_f32(),
        clip.sample_rate()
    );

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play(&clip)?;
    wait_for_playback(&playback).await;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Speak a text file one line at a time
#[allow(clippy::future_not_send)]
async fn present(file: &std::path::Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)?;
    let config = Config::load()?;

    // Presentation never listens, so the line source stays empty
    let (_lines_tx, lines_rx) = mpsc::unbounded_channel();
    let factory = Box::new(ConsoleInput::from_channel(lines_rx));

    let playback = AudioPlayback::new()?;
    let mut orchestrator = build_orchestrator(&config, factory, Box::new(playback))?;

    tracing::info!(file = %file.display(), "presenting");
    orchestrator.present(&text).await;

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn wait_for_playback(playback: &AudioPlayback) {
    while playback.is_playing() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
