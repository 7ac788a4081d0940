use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use voicebot::agent::ChatClient;
use voicebot::endpoint::Endpoint;
use voicebot::tools::ToolRegistry;
use voicebot::voice::{
    AudioFormat, AudioSource, LocalSpeaker, Player, ScratchFile, SpeechToText,
    SubprocessRecorder, Synthesizer, SystemPlayer, SystemVoice, TextToSpeech, select_voice,
};
use voicebot::{Config, Daemon};

/// Voicebot - hands-free voice assistant
#[derive(Parser)]
#[command(name = "voicebot", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Chat model
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Speech synthesis model; pass "" to speak with a local voice
    #[arg(long, global = true)]
    tts_model: Option<String>,

    /// Speech synthesis voice
    #[arg(long, global = true)]
    tts_voice: Option<String>,

    /// Stop a turn after this many tool rounds
    #[arg(long, global = true)]
    max_tool_rounds: Option<u32>,

    /// Print replies only once they are complete
    #[arg(long, global = true)]
    no_stream: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Record one utterance and play it back
    TestMic,
    /// Speak a line of text
    TestSpeaker {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// List local voices
    Voices {
        /// Show which voice would be picked for this language (e.g. de_DE)
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voicebot=info",
        1 => "info,voicebot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
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
    apply_overrides(&mut config, &cli);
    tracing::debug!(?config, "loaded configuration");

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic => test_mic(&config, &cancel).await,
            Command::TestSpeaker { text } => test_speaker(config, &text, &cancel).await,
            Command::Voices { language } => list_voices(&config, language.as_deref()).await,
        };
    }

    let endpoint = Arc::new(Endpoint::new(&config.api.base_url, config.api.key.take())?);
    let recorder = SubprocessRecorder::detect(config.capture.clone())?;

    tracing::info!(
        base_url = %config.api.base_url,
        model = %config.llm.model,
        recorder = recorder.backend().name(),
        local_voice = !config.voice.remote_synthesis(),
        "starting voicebot"
    );

    let transcriber = SpeechToText::new(Arc::clone(&endpoint), config.voice.stt_model.clone());
    let model = ChatClient::new(Arc::clone(&endpoint), config.llm.model.clone())
        .with_streaming(config.llm.stream);

    let builder = Daemon::builder(Arc::new(recorder), Arc::new(transcriber), Arc::new(model))
        .tools(ToolRegistry::with_builtins()?)
        .system_prompt(config.llm.system_prompt.clone())
        .max_tool_rounds(config.llm.max_tool_rounds);

    let builder = if config.voice.remote_synthesis() {
        builder.synthesizer(Arc::new(TextToSpeech::new(
            endpoint,
            config.voice.tts_model.clone(),
            config.voice.tts_voice.clone(),
        )))
    } else {
        builder.local_speaker(Arc::new(local_voice(&config)))
    };

    // Run until interrupted
    builder.build()?.run(cancel).await?;

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(base_url) = &cli.base_url {
        config.api.base_url.clone_from(base_url);
    }
    if let Some(model) = &cli.model {
        config.llm.model.clone_from(model);
    }
    if let Some(tts_model) = &cli.tts_model {
        config.voice.tts_model.clone_from(tts_model);
    }
    if let Some(tts_voice) = &cli.tts_voice {
        config.voice.tts_voice.clone_from(tts_voice);
    }
    if cli.max_tool_rounds.is_some() {
        config.llm.max_tool_rounds = cli.max_tool_rounds;
    }
    if cli.no_stream {
        config.llm.stream = false;
    }
}

fn local_voice(config: &Config) -> SystemVoice {
    SystemVoice::new(config.voice.preferred_voices.clone())
        .with_default_locale(config.voice.default_language.clone())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("shutdown requested");
        cancel.cancel();
    });
}

/// Record one utterance and play it back
async fn test_mic(config: &Config, cancel: &CancellationToken) -> anyhow::Result<()> {
    let recorder = SubprocessRecorder::detect(config.capture.clone())?;
    println!("Recording with {}...", recorder.backend().name());
    println!("🙉 Speak now, recording stops after a pause\n");

    let clip = recorder.capture(cancel).await?;
    match clip.duration() {
        Some(duration) => println!(
            "Captured {} bytes ({:.1}s)",
            clip.data.len(),
            duration.as_secs_f32()
        ),
        None => println!("Captured {} bytes", clip.data.len()),
    }

    let scratch = ScratchFile::new(AudioFormat::Wav);
    scratch.write(&clip.data).await?;
    println!("Playing it back...");
    SystemPlayer::detect().play(scratch.path(), cancel).await?;

    println!("\n---");
    println!("If you heard yourself, capture and playback are working!");
    Ok(())
}

/// Speak `text` the way replies are spoken
async fn test_speaker(
    mut config: Config,
    text: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    println!("📣 {text}\n");

    if !config.voice.remote_synthesis() {
        local_voice(&config).speak(text, "", cancel).await?;
        return Ok(());
    }

    let endpoint = Arc::new(Endpoint::new(&config.api.base_url, config.api.key.take())?);
    let tts = TextToSpeech::new(
        endpoint,
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
    );

    println!("Synthesizing speech...");
    let clip = tts.synthesize(text, "", cancel).await?;
    println!("Got {} bytes of audio data", clip.data.len());

    let scratch = ScratchFile::new(clip.format);
    scratch.write(&clip.data).await?;
    SystemPlayer::detect().play(scratch.path(), cancel).await?;

    println!("\n---");
    println!("If you heard the speech, synthesis and playback are working!");
    Ok(())
}

/// Print the local voice catalog
async fn list_voices(config: &Config, language: Option<&str>) -> anyhow::Result<()> {
    let speaker = local_voice(config);
    let voices = speaker.voices().await?;

    for voice in voices {
        println!(
            "{:<28} {:<8} {:<9} {}",
            voice.name,
            voice.language,
            format!("{:?}", voice.quality),
            voice.description
        );
    }
    println!("\n{} voices", voices.len());

    if let Some(language) = language {
        let picked = select_voice(voices, language, config.voice.preferred_voices.as_slice());
        if picked.is_empty() {
            println!("No voice matches {language:?}; the system default would be used");
        } else {
            println!("Selected for {language:?}: {} ({})", picked.name, picked.language);
        }
    }
    Ok(())
}
