//! Daemon - the voice conversation loop
//!
//! Orchestrates capture, transcription, the completion/tool loop, synthesis
//! and playback, one turn at a time, keeping the conversation across turns.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::{
    AgentNotifyEvent, AgentRunConfig, ChatModel, Conversation, run_agent_turn_with,
};
use crate::tools::ToolRegistry;
use crate::voice::{
    AudioFormat, AudioSource, LocalSpeaker, Player, ScratchFile, Synthesizer, SystemPlayer,
    Transcriber,
};
use crate::{Error, Result};

/// Where a turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Listening,
    Transcribing,
    Completion,
    Synthesizing,
    Playing,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::Completion => "completion",
            Self::Synthesizing => "synthesizing",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// How a turn ended when the loop may continue
#[derive(Debug)]
pub enum TurnOutcome {
    /// The reply was spoken (or printed when nothing could speak it)
    Completed { transcript: String, reply: String },
    /// Nothing was said; the conversation is untouched
    NoSpeech,
    /// A recoverable error ended the turn early
    Failed { stage: TurnStage, error: Error },
}

/// How replies are turned into sound
#[derive(Clone)]
pub enum SpeechOutput {
    /// Remote synthesis, played through a local player
    Synthesized(Arc<dyn Synthesizer>),
    /// Spoken directly by a local voice, no audio buffer involved
    Local(Arc<dyn LocalSpeaker>),
}

/// User-facing transcript on the terminal
struct Console {
    out: Box<dyn Write + Send>,
    replying: bool,
}

impl Console {
    fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            replying: false,
        }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }

    fn listening(&mut self) {
        self.line("🙉 Listening...");
    }

    fn transcript(&mut self, text: &str) {
        self.line(&format!("💬 {text}"));
    }

    fn reply_chunk(&mut self, chunk: &str) {
        if !self.replying {
            self.replying = true;
            let _ = write!(self.out, "📣 ");
        }
        let _ = write!(self.out, "{chunk}");
        let _ = self.out.flush();
    }

    fn end_reply(&mut self) {
        if self.replying {
            self.replying = false;
            self.line("");
        }
    }

    fn error(&mut self, error: &Error) {
        self.end_reply();
        self.line(&format!("🚨 {error}"));
    }
}

/// The voice assistant loop
pub struct Daemon {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn ChatModel>,
    speech: SpeechOutput,
    player: Arc<dyn Player>,
    tools: ToolRegistry,
    run_config: AgentRunConfig,
    scratch_dir: PathBuf,
    conversation: Conversation,
    console: Console,
}

impl Daemon {
    /// Start building a daemon
    #[must_use]
    pub fn builder(
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn ChatModel>,
    ) -> DaemonBuilder {
        DaemonBuilder::new(source, transcriber, model)
    }

    /// History accumulated so far
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run turns until cancelled or a fatal error occurs
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the loop (no capture backend,
    /// completion failure); cancellation is a clean exit
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(tools = self.tools.len(), "voice loop started");

        while !cancel.is_cancelled() {
            match self.run_turn(&cancel).await {
                Ok(TurnOutcome::Completed { .. }) => {
                    tracing::debug!(messages = self.conversation.len(), "turn complete");
                }
                Ok(TurnOutcome::NoSpeech) => tracing::debug!("no speech, listening again"),
                Ok(TurnOutcome::Failed { stage, error }) => {
                    tracing::debug!(%stage, error = %error, "turn abandoned");
                }
                Err(Error::Cancelled) => break,
                Err(e) => {
                    tracing::error!(error = %e, "voice loop stopped");
                    return Err(e);
                }
            }
        }

        tracing::info!("voice loop stopped");
        Ok(())
    }

    /// Run one listen, transcribe, complete, speak cycle
    ///
    /// Recoverable failures are reported on the console and returned as
    /// [`TurnOutcome::Failed`]; the conversation keeps whatever was already
    /// appended.
    ///
    /// # Errors
    ///
    /// Returns fatal errors and `Error::Cancelled`
    pub async fn run_turn(&mut self, cancel: &CancellationToken) -> Result<TurnOutcome> {
        self.console.listening();
        let clip = match self.source.capture(cancel).await {
            Ok(clip) => clip,
            Err(e) => return self.recover(TurnStage::Listening, e),
        };
        if clip.is_empty() {
            return Ok(TurnOutcome::NoSpeech);
        }
        tracing::debug!(bytes = clip.data.len(), duration = ?clip.duration(), "utterance captured");

        let transcription = match self.transcriber.transcribe(&clip, cancel).await {
            Ok(transcription) => transcription,
            Err(e) => return self.recover(TurnStage::Transcribing, e),
        };
        drop(clip);

        if transcription.text.is_empty() {
            return Ok(TurnOutcome::NoSpeech);
        }
        self.console.transcript(&transcription.text);
        self.conversation.push_user(transcription.text.clone());

        let reply = {
            let console = &mut self.console;
            let mut sink = |chunk: &str| console.reply_chunk(chunk);
            let mut notify = |event: AgentNotifyEvent| {
                if let AgentNotifyEvent::ToolStart { name, .. } = event {
                    tracing::info!(tool = %name, "calling tool");
                }
            };
            run_agent_turn_with(
                self.model.as_ref(),
                &self.tools,
                &mut self.conversation,
                self.run_config,
                &mut sink,
                &mut notify,
                cancel,
            )
            .await
        };
        self.console.end_reply();

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return self.recover(TurnStage::Completion, e),
        };

        if !reply.trim().is_empty() {
            if let Err((stage, e)) = self.speak(&reply, &transcription.language, cancel).await {
                return self.recover(stage, e);
            }
        }

        Ok(TurnOutcome::Completed {
            transcript: transcription.text,
            reply,
        })
    }

    async fn speak(
        &self,
        text: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), (TurnStage, Error)> {
        let synthesizer = match &self.speech {
            SpeechOutput::Local(speaker) => {
                return speaker
                    .speak(text, language, cancel)
                    .await
                    .map_err(|e| (TurnStage::Synthesizing, e));
            }
            SpeechOutput::Synthesized(synthesizer) => synthesizer,
        };

        let clip = synthesizer
            .synthesize(text, language, cancel)
            .await
            .map_err(|e| (TurnStage::Synthesizing, e))?;

        // Removed when this scope ends, whatever happens below
        let scratch = ScratchFile::in_dir(&self.scratch_dir, AudioFormat::Wav);
        scratch
            .write(&clip.data)
            .await
            .map_err(|e| (TurnStage::Playing, e))?;
        self.player
            .play(scratch.path(), cancel)
            .await
            .map_err(|e| (TurnStage::Playing, e))
    }

    fn recover(&mut self, stage: TurnStage, error: Error) -> Result<TurnOutcome> {
        if matches!(error, Error::Cancelled) {
            return Err(error);
        }
        self.console.error(&error);
        if error.is_fatal() {
            return Err(error);
        }
        tracing::warn!(%stage, error = %error, "turn failed");
        Ok(TurnOutcome::Failed { stage, error })
    }
}

/// Builder for [`Daemon`]
pub struct DaemonBuilder {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn ChatModel>,
    speech: Option<SpeechOutput>,
    player: Option<Arc<dyn Player>>,
    tools: ToolRegistry,
    system_prompt: String,
    run_config: AgentRunConfig,
    scratch_dir: Option<PathBuf>,
    console: Option<Box<dyn Write + Send>>,
}

impl DaemonBuilder {
    /// Create a builder from the three mandatory collaborators
    #[must_use]
    pub fn new(
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            source,
            transcriber,
            model,
            speech: None,
            player: None,
            tools: ToolRegistry::new(),
            system_prompt: String::new(),
            run_config: AgentRunConfig::default(),
            scratch_dir: None,
            console: None,
        }
    }

    /// Speak replies through remote synthesis
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.speech = Some(SpeechOutput::Synthesized(synthesizer));
        self
    }

    /// Speak replies with a local voice
    #[must_use]
    pub fn local_speaker(mut self, speaker: Arc<dyn LocalSpeaker>) -> Self {
        self.speech = Some(SpeechOutput::Local(speaker));
        self
    }

    /// Player for synthesized audio (probed at build time when unset)
    #[must_use]
    pub fn player(mut self, player: Arc<dyn Player>) -> Self {
        self.player = Some(player);
        self
    }

    /// Tools the model may call
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// System prompt that opens the conversation
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Bound tool rounds per turn
    #[must_use]
    pub const fn max_tool_rounds(mut self, max: Option<u32>) -> Self {
        self.run_config.max_tool_rounds = max;
        self
    }

    /// Directory for playback scratch files (defaults to the temp dir)
    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Where the console transcript goes (defaults to stdout)
    #[must_use]
    pub fn console(mut self, out: impl Write + Send + 'static) -> Self {
        self.console = Some(Box::new(out));
        self
    }

    /// Build the daemon
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no speech output was configured
    pub fn build(self) -> Result<Daemon> {
        let speech = self
            .speech
            .ok_or_else(|| Error::Config("no speech output configured".to_string()))?;

        let player = self
            .player
            .unwrap_or_else(|| Arc::new(SystemPlayer::detect()));

        Ok(Daemon {
            source: self.source,
            transcriber: self.transcriber,
            model: self.model,
            speech,
            player,
            tools: self.tools,
            run_config: self.run_config,
            scratch_dir: self.scratch_dir.unwrap_or_else(std::env::temp_dir),
            conversation: Conversation::with_system_prompt(&self.system_prompt),
            console: Console::new(
                self.console
                    .unwrap_or_else(|| Box::new(std::io::stdout())),
            ),
        })
    }
}
