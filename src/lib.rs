//! Voicebot - a hands-free voice assistant loop
//!
//! This library provides the pieces of a spoken conversation with a
//! language model:
//! - Audio capture with silence endpointing through `sox` or `ffmpeg`
//! - Transcription and speech synthesis against an OpenAI-compatible API
//! - A completion loop that resolves model tool calls
//! - Playback through whichever local player is installed, or local voices
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Daemon                          │
//! │  listen → transcribe → complete ⇄ tools → speak      │
//! └────────┬───────────────┬─────────────────┬──────────┘
//!          │               │                 │
//! ┌────────▼──────┐ ┌──────▼────────┐ ┌──────▼──────────┐
//! │  voice        │ │  agent        │ │  tools          │
//! │  capture, STT │ │  chat stream  │ │  registry,      │
//! │  TTS, play    │ │  conversation │ │  resolution     │
//! └───────────────┘ └───────────────┘ └─────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod error;
pub mod tools;
pub mod voice;

pub use config::Config;
pub use daemon::{Daemon, DaemonBuilder, TurnOutcome, TurnStage};
pub use error::{Error, Result};
