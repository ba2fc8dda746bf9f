use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use duotalk::audio::{self, AudioSessionConfigurer, DesktopSession, MicCapture};
use duotalk::speech::{FallbackSpeaker, ProcessSynthesizer, RemoteTtsClient, SpeechOutput};
use duotalk::transcribe::{MicTranscriber, SttClient};
use duotalk::translate::{TranslationGateway, Translator};
use duotalk::turn::{SessionEvent, Side, TurnController, TurnState};
use duotalk::{Config, Language};

/// duotalk - real-time bidirectional voice translation
#[derive(Parser)]
#[command(name = "duotalk", version, about)]
struct Cli {
    /// Source language tag (e.g. "en")
    #[arg(long)]
    source: Option<String>,

    /// Target language tag (e.g. "zh")
    #[arg(long)]
    target: Option<String>,

    /// Re-orient the pair from the detected utterance language
    #[arg(long)]
    auto_detect: bool,

    /// Silence debounce in milliseconds before an utterance is finalized
    #[arg(long)]
    silence_timeout_ms: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test speech synthesis
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech system.")]
        text: String,
        /// Language tag to speak in (defaults to the configured source)
        #[arg(long)]
        lang: Option<String>,
    },
    /// Translate a single line of text and exit
    Translate {
        /// Text to translate
        text: String,
        /// Source language tag (defaults to the configured source)
        #[arg(long)]
        from: Option<String>,
        /// Target language tag (defaults to the configured target)
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,duotalk=info",
        1 => "info,duotalk=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli)?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text, lang } => test_tts(&config, &text, lang.as_deref()).await,
            Command::Translate { text, from, to } => {
                translate_once(&config, &text, from.as_deref(), to.as_deref()).await
            }
        };
    }

    run_session(config).await
}

/// CLI flags override the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(source) = &cli.source {
        config.pair.source = source.parse()?;
    }
    if let Some(target) = &cli.target {
        config.pair.target = target.parse()?;
    }
    if config.pair.source == config.pair.target {
        anyhow::bail!("source and target language must differ");
    }
    if cli.auto_detect {
        config.auto_detect = true;
    }
    if let Some(ms) = cli.silence_timeout_ms {
        config.silence_timeout = Duration::from_millis(ms);
    }
    Ok(())
}

/// Build the speech output stack from configuration
fn build_speaker(config: &Config) -> anyhow::Result<Arc<FallbackSpeaker>> {
    let remote = config
        .tts_url
        .as_ref()
        .map(|url| {
            RemoteTtsClient::new(url.clone(), config.token.clone(), config.request_timeout)
                .map(|client| Box::new(client) as Box<dyn duotalk::speech::RemoteSynthesis>)
        })
        .transpose()?;
    let local = ProcessSynthesizer::discover()?;
    Ok(Arc::new(FallbackSpeaker::new(remote, Box::new(local))))
}

/// Run the interactive dialog session
async fn run_session(config: Config) -> anyhow::Result<()> {
    tracing::info!(pair = %config.pair, "starting session");

    let audio_session: Arc<dyn AudioSessionConfigurer> = Arc::new(DesktopSession);
    audio_session.configure_playback()?;

    let stt = SttClient::new(
        config.stt_url.clone(),
        config.stt_model.clone(),
        config.token.clone(),
        config.request_timeout,
    )?;
    let source = MicTranscriber::new(stt, Arc::clone(&audio_session));
    let translator = Arc::new(TranslationGateway::new(
        config.translate_url.clone(),
        config.token.clone(),
        config.request_timeout,
    )?);
    let speaker = build_speaker(&config)?;

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = TurnController::spawn(
        Box::new(source),
        translator,
        speaker,
        config.pair,
        config.turn_options(),
        events_tx,
    );

    // Render session events as they arrive
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            render_event(&event);
        }
    });

    println!("duotalk ready - {}", config.pair);
    println!("  l  listen on the {} side", config.pair.source);
    println!("  r  listen on the {} side", config.pair.target);
    println!("  s  swap languages");
    println!("  h  show history");
    println!("  q  quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match line.trim() {
                    "l" => handle.toggle(Side::Left),
                    "r" => handle.toggle(Side::Right),
                    "s" => handle.swap_languages(),
                    "h" => {
                        for entry in handle.history().await {
                            println!(
                                "  [{}] {} ({}) -> {} ({})",
                                entry.created_at.format("%H:%M:%S"),
                                entry.source_text,
                                entry.source_language,
                                entry.target_text,
                                entry.target_language,
                            );
                        }
                    }
                    "q" => break,
                    "" => {}
                    other => println!("unknown command: {other}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    handle.shutdown();
    Ok(())
}

/// Print a session event for the terminal UI
fn render_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => match state {
            TurnState::Idle => println!("-- idle"),
            TurnState::Listening(side) => println!("-- listening ({side:?})"),
            TurnState::Finalizing(_) => println!("-- finalizing"),
            TurnState::Translating(_) => println!("-- translating"),
            TurnState::Speaking(_) => println!("-- speaking"),
        },
        SessionEvent::Partial { text, .. } => println!("  ... {text}"),
        SessionEvent::TurnCompleted(result) => {
            println!(
                "  {} ({}) -> {} ({})",
                result.source_text,
                result.source_language,
                result.target_text,
                result.target_language,
            );
        }
        SessionEvent::TurnFailed { message, .. } => println!("  error: {message}"),
        SessionEvent::LanguagesSwapped(pair) => println!("-- languages: {pair}"),
    }
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = MicCapture::new()?;
    capture.start()?;
    println!("Sample rate: {} Hz", audio::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    DesktopSession.configure_playback()?;

    let sample_rate = 24000_i32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    tokio::task::spawn_blocking(move || {
        let stop = AtomicBool::new(false);
        audio::play_samples(samples, &stop)
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test speech synthesis through the configured stack
async fn test_tts(config: &Config, text: &str, lang: Option<&str>) -> anyhow::Result<()> {
    let language: Language = match lang {
        Some(tag) => tag.parse()?,
        None => config.pair.source,
    };

    println!("Testing TTS with text: \"{text}\" ({language})\n");

    let speaker = build_speaker(config)?;
    speaker.speak(text, language).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// One-shot translation
async fn translate_once(
    config: &Config,
    text: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        return Err(duotalk::Error::EmptyInput.into());
    }

    let source: Language = match from {
        Some(tag) => tag.parse()?,
        None => config.pair.source,
    };
    let target: Language = match to {
        Some(tag) => tag.parse()?,
        None => config.pair.target,
    };

    let gateway = TranslationGateway::new(
        config.translate_url.clone(),
        config.token.clone(),
        config.request_timeout,
    )?;

    let translated = gateway.translate(text.trim(), source, target).await?;
    println!("{translated}");

    Ok(())
}
