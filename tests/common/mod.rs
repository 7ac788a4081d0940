//! Shared test utilities: scripted fakes for every collaborator of the loop

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use voicebot::agent::{AssistantReply, ChatModel, Message, ToolDefinition};
use voicebot::tools::{Tool, ToolArgs};
use voicebot::voice::{
    AudioClip, AudioSource, LocalSpeaker, Player, Synthesizer, Transcriber, Transcription,
};
use voicebot::{Error, Result};

/// A short silent mono WAV clip
#[must_use]
pub fn wav_clip() -> AudioClip {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for _ in 0..1600 {
            writer.write_sample(0i16).expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    AudioClip::wav(cursor.into_inner())
}

/// Yields scripted recordings, then reports cancellation to end the loop
#[derive(Default)]
pub struct FakeSource {
    clips: Mutex<VecDeque<Result<AudioClip>>>,
}

impl FakeSource {
    pub fn new(clips: Vec<Result<AudioClip>>) -> Self {
        Self {
            clips: Mutex::new(clips.into()),
        }
    }

    /// One good recording
    pub fn once() -> Self {
        Self::new(vec![Ok(wav_clip())])
    }
}

#[async_trait]
impl AudioSource for FakeSource {
    async fn capture(&self, _cancel: &CancellationToken) -> Result<AudioClip> {
        self.clips
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Error::Cancelled))
    }
}

/// Returns scripted transcriptions
pub struct FakeTranscriber {
    results: Mutex<VecDeque<Result<Transcription>>>,
}

impl FakeTranscriber {
    pub fn new(results: Vec<Result<Transcription>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
        }
    }

    /// Always hears `text`, with no language metadata
    pub fn saying(text: &str) -> Self {
        Self::new(vec![Ok(Transcription {
            text: text.to_string(),
            language: String::new(),
        })])
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        _cancel: &CancellationToken,
    ) -> Result<Transcription> {
        assert!(!clip.is_empty(), "transcriber got an empty clip");
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Stt("no more scripted transcriptions".to_string())))
    }
}

/// Replies from a script and records every request
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<AssistantReply>>>,
    pub requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<AssistantReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: Vec<AssistantReply>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        sink: &mut (dyn for<'s> FnMut(&'s str) + Send),
        _cancel: &CancellationToken,
    ) -> Result<AssistantReply> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Completion("script exhausted".to_string())))?;
        if !reply.content.is_empty() {
            sink(&reply.content);
        }
        Ok(reply)
    }
}

/// Records what it was asked to synthesize
#[derive(Default)]
pub struct RecordingSynth {
    pub spoken: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingSynth {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.spoken.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Synthesizer for RecordingSynth {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        _cancel: &CancellationToken,
    ) -> Result<AudioClip> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        if self.fail {
            return Err(Error::Tts("speech service down".to_string()));
        }
        Ok(wav_clip())
    }
}

/// Records played files and whether they existed at play time
#[derive(Default)]
pub struct RecordingPlayer {
    pub played: Mutex<Vec<(PathBuf, bool)>>,
    pub error: Option<fn() -> Error>,
}

impl RecordingPlayer {
    pub fn failing(error: fn() -> Error) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl Player for RecordingPlayer {
    async fn play(&self, path: &Path, _cancel: &CancellationToken) -> Result<()> {
        self.played
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        match self.error {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

/// Records what it was asked to say
#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl LocalSpeaker for RecordingSpeaker {
    async fn speak(&self, text: &str, language: &str, _cancel: &CancellationToken) -> Result<()> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        Ok(())
    }
}

/// `turn_lights` tool that records its arguments and answers "ok"
#[derive(Default)]
pub struct TurnLights {
    pub calls: Mutex<Vec<ToolArgs>>,
}

#[async_trait]
impl Tool for TurnLights {
    fn name(&self) -> &str {
        "turn_lights"
    }

    fn description(&self) -> &str {
        "Switch the lights on or off"
    }

    async fn execute(&self, args: ToolArgs, _cancel: &CancellationToken) -> Result<Value> {
        self.calls.lock().unwrap().push(args);
        Ok(Value::String("ok".to_string()))
    }
}

/// In-memory console sink
#[derive(Clone, Default)]
pub struct ConsoleBuffer(Arc<Mutex<Vec<u8>>>);

impl ConsoleBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for ConsoleBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Number of entries left in a directory
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}
