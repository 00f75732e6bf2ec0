//! Application entry point for the speech reader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse command-line arguments.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Extract the document's text.
//! 6. Create the event channel and build both playback sessions.
//! 7. Segment the text and hand it to the [`ModeCoordinator`].
//! 8. Spawn the stdin command thread.
//! 9. Run the [`Reader`] loop until `quit` or end of input.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use speech_reader::{
    app::{Reader, ReaderCommand, StdinCommands, HELP},
    audio::{AudioSink, RodioSink, UnavailableSink},
    config::AppConfig,
    document::{DocumentFile, DocumentLoader},
    gateway::build_gateway,
    playback::{event_channel, CommandVoiceEngine, DeviceSession, Mode, ModeCoordinator, RemoteSession},
};

#[derive(Debug, Parser)]
#[command(name = "speech-reader", version, about = "Read documents aloud, sentence by sentence")]
struct Args {
    /// Document to read (.txt, .md, .docx or .pdf).
    document: PathBuf,

    /// Synthesis mode to start in (device or remote).
    #[arg(long)]
    mode: Option<Mode>,

    /// Voice to select before reading.
    #[arg(long)]
    voice: Option<String>,

    /// Settings file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Arguments
    let args = Args::parse();
    log::info!("speech reader starting up");

    // 3. Configuration
    let loaded = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 4. Tokio runtime (2 worker threads: fetches and engine processes)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // The audio output stream is not Send, so everything that owns it lives
    // in the future driven by block_on rather than in a spawned task.
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: AppConfig) -> anyhow::Result<()> {
    // 5. Document
    let file = DocumentFile::from_path(&args.document)
        .with_context(|| format!("cannot open {}", args.document.display()))?;
    let loader = DocumentLoader::from_config(&config.document);
    let text = loader
        .load(&file)
        .await
        .with_context(|| format!("cannot read {}", args.document.display()))?;

    // 6. Sessions
    let (bus, events) = event_channel();
    let restart_delay = Duration::from_millis(config.playback.restart_delay_ms);

    let engine = CommandVoiceEngine::new(&config.device, bus.sender(Mode::Device));
    engine.discover_voices();
    let device = DeviceSession::new(
        Box::new(engine),
        bus.sender(Mode::Device),
        &config.device,
        restart_delay,
    );

    // Degrade to an output-less sink so device mode still works without a
    // sound card for rodio.
    let sink: Box<dyn AudioSink> = match RodioSink::new(bus.sender(Mode::Remote)) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            log::warn!("Audio output unavailable: {e}. Remote mode cannot play.");
            Box::new(UnavailableSink::new(e.to_string()))
        }
    };
    let remote = RemoteSession::new(
        build_gateway(&config.remote),
        sink,
        bus.sender(Mode::Remote),
        &config.remote,
        restart_delay,
    );

    // 7. Coordinator
    let mode = args.mode.unwrap_or(config.playback.default_mode);
    let mut coordinator = ModeCoordinator::new(
        Box::new(device),
        Box::new(remote),
        mode,
        config.playback.max_segment_chars,
    );
    let count = coordinator.load_text(&text);
    println!("{}: {count} segment(s), {mode} mode", file.name);

    if let Some(voice) = &args.voice {
        if let Err(e) = coordinator.select_voice(voice) {
            log::warn!("Cannot select voice '{voice}': {e}");
        }
    }

    // 8. Stdin commands
    let (command_tx, command_rx) = mpsc::channel::<ReaderCommand>(16);
    let _stdin = StdinCommands::start(command_tx).context("failed to spawn stdin thread")?;
    println!("{HELP}");

    // 9. Run until quit
    Reader::new(coordinator).run(command_rx, events).await;
    Ok(())
}
