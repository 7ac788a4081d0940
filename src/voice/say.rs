//! Local speech through the system `say` command
//!
//! Used when no remote synthesis model is configured. The installed voice
//! catalog is listed once per process and a voice is picked per reply
//! from the detected language.

use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use super::process;
use crate::{Error, Result};

/// Locale used when no language was detected
pub const DEFAULT_LOCALE: &str = "en_US";

/// Voice names tried first, grouped by language
pub const PREFERRED_VOICES: &[&str] = &[
    // English
    "Samantha", "Daniel", "Moira", "Tessa",
    // German
    "Anna", "Markus", "Petra",
    // French
    "Thomas", "Audrey", "Amélie",
    // Spanish
    "Monica", "Jorge", "Juan",
    // Italian
    "Alice", "Federico",
    // Chinese
    "Ting-Ting",
    // Japanese
    "Kyoko", "Otoya",
    // Arabic
    "Maged",
    // Dutch
    "Xander",
    // Swedish
    "Alva",
    // Korean
    "Yuna",
    // Portuguese
    "Luciana",
];

static VOICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<voice>.+)\s+(?P<language>[a-z]+_[A-Z]+)\s+#\s*(?P<comment>.+)")
        .expect("valid regex")
});

/// Synthesis fidelity of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceQuality {
    #[default]
    Standard,
    Enhanced,
    Premium,
}

impl VoiceQuality {
    /// Best first
    pub const DESCENDING: [Self; 3] = [Self::Premium, Self::Enhanced, Self::Standard];
}

/// One installed voice
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Voice {
    pub name: String,
    pub language: String,
    pub description: String,
    pub quality: VoiceQuality,
}

impl Voice {
    /// Whether this is the "no match" voice
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Parse the output of `say -v ?`
#[must_use]
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let caps = VOICE_LINE.captures(line)?;
            let name = caps["voice"].trim().to_string();

            let quality = if name.contains("(Premium)") {
                VoiceQuality::Premium
            } else if name.contains("(Enhanced)") {
                VoiceQuality::Enhanced
            } else {
                VoiceQuality::Standard
            };

            Some(Voice {
                language: caps["language"].trim().to_string(),
                description: caps["comment"].trim().to_string(),
                name,
                quality,
            })
        })
        .collect()
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// Pick the best voice for `language`
///
/// Tiers, first match wins: full locale then primary subtag; each preferred
/// name then any name; premium, enhanced, then standard quality. Returns the
/// empty voice when nothing matches.
#[must_use]
pub fn select_voice<S: AsRef<str>>(voices: &[Voice], language: &str, preferred: &[S]) -> Voice {
    let mut locale = language.trim().replace('-', "_");
    if locale.is_empty() {
        locale = DEFAULT_LOCALE.to_string();
    }

    let primary = locale.split('_').next().unwrap_or_default();
    let locales = [locale.clone(), format!("{primary}_")];

    let names: Vec<&str> = preferred
        .iter()
        .map(|name| name.as_ref())
        .chain(std::iter::once(""))
        .collect();

    for locale in &locales {
        for name in &names {
            for quality in VoiceQuality::DESCENDING {
                let found = voices.iter().find(|v| {
                    v.quality == quality
                        && starts_with_ignore_case(&v.language, locale)
                        && starts_with_ignore_case(&v.name, name)
                });
                if let Some(voice) = found {
                    return voice.clone();
                }
            }
        }
    }

    Voice::default()
}

/// Speaks text directly, without producing an audio buffer
#[async_trait]
pub trait LocalSpeaker: Send + Sync {
    /// Speak `text`, choosing a voice for `language` (may be empty)
    ///
    /// # Errors
    ///
    /// Returns error if no voice backend is usable or speaking fails
    async fn speak(&self, text: &str, language: &str, cancel: &CancellationToken) -> Result<()>;
}

/// The macOS `say` command
#[derive(Debug)]
pub struct SystemVoice {
    program: String,
    preferred: Vec<String>,
    default_locale: String,
    catalog: OnceCell<Vec<Voice>>,
}

impl Default for SystemVoice {
    fn default() -> Self {
        Self::new(PREFERRED_VOICES.iter().map(ToString::to_string).collect())
    }
}

impl SystemVoice {
    /// Create a speaker with a custom name preference list
    #[must_use]
    pub fn new(preferred: Vec<String>) -> Self {
        Self {
            program: "say".to_string(),
            preferred,
            default_locale: DEFAULT_LOCALE.to_string(),
            catalog: OnceCell::new(),
        }
    }

    /// Locale used when a reply comes without a language hint
    #[must_use]
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        if !locale.trim().is_empty() {
            self.default_locale = locale;
        }
        self
    }

    /// Installed voices, listed on first use
    ///
    /// # Errors
    ///
    /// Returns error if the voice list cannot be read
    pub async fn voices(&self) -> Result<&[Voice]> {
        let voices = self
            .catalog
            .get_or_try_init(|| async {
                let output = Command::new(&self.program)
                    .args(["-v", "?"])
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| Error::Voice(format!("failed to list voices: {e}")))?;

                if !output.status.success() {
                    return Err(Error::Voice(format!(
                        "{} -v ? exited with {}",
                        self.program, output.status
                    )));
                }

                let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
                tracing::debug!(count = voices.len(), "local voices listed");
                Ok::<_, Error>(voices)
            })
            .await?;
        Ok(voices)
    }

    /// The voice that would be used for `language`
    ///
    /// # Errors
    ///
    /// Returns error if the voice list cannot be read
    pub async fn voice_for(&self, language: &str) -> Result<Voice> {
        let language = if language.trim().is_empty() {
            self.default_locale.as_str()
        } else {
            language
        };
        let voices = self.voices().await?;
        Ok(select_voice(voices, language, self.preferred.as_slice()))
    }
}

/// Arguments for `say`; `--` keeps text such as "-5 degrees" from reading as an option
fn say_args<'a>(voice: &'a Voice, text: &'a str) -> Vec<&'a str> {
    let mut args = Vec::with_capacity(4);
    if !voice.is_empty() {
        args.extend(["-v", voice.name.as_str()]);
    }
    args.extend(["--", text]);
    args
}

#[async_trait]
impl LocalSpeaker for SystemVoice {
    async fn speak(&self, text: &str, language: &str, cancel: &CancellationToken) -> Result<()> {
        let voice = self.voice_for(language).await?;

        if voice.is_empty() {
            tracing::debug!(language, "no matching voice, using system default");
        } else {
            tracing::debug!(voice = %voice.name, language = %voice.language, "speaking");
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(say_args(&voice, text))
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        let status = process::run(cmd, cancel).await?;
        if !status.success() {
            return Err(Error::Voice(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, language: &str, quality: VoiceQuality) -> Voice {
        Voice {
            name: name.to_string(),
            language: language.to_string(),
            description: String::new(),
            quality,
        }
    }

    #[test]
    fn text_is_passed_after_option_terminator() {
        let anna = voice("Anna", "de_DE", VoiceQuality::Enhanced);
        assert_eq!(
            say_args(&anna, "-5 degrees outside"),
            ["-v", "Anna", "--", "-5 degrees outside"]
        );
        assert_eq!(say_args(&Voice::default(), "-v"), ["--", "-v"]);
    }

    #[test]
    fn parses_say_output() {
        let output = "\
Alex                en_US    # Most people recognize me by my voice.
Anna (Premium)      de_DE    # Hallo, ich heiße Anna.
Anna (Enhanced)     de_DE    # Hallo, ich heiße Anna.
Eddy (Deutsch (Deutschland)) de_DE    # Hallo! Ich heiße Eddy.
garbage line without a locale
";
        let voices = parse_voice_list(output);
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[0].name, "Alex");
        assert_eq!(voices[0].language, "en_US");
        assert_eq!(voices[0].quality, VoiceQuality::Standard);
        assert_eq!(voices[0].description, "Most people recognize me by my voice.");
        assert_eq!(voices[1].quality, VoiceQuality::Premium);
        assert_eq!(voices[2].quality, VoiceQuality::Enhanced);
        assert_eq!(voices[3].name, "Eddy (Deutsch (Deutschland))");
    }

    #[test]
    fn preferred_name_beats_quality_of_others() {
        let voices = [
            voice("Eddy (Premium)", "de_DE", VoiceQuality::Premium),
            voice("Markus", "de_DE", VoiceQuality::Standard),
        ];
        let picked = select_voice(&voices, "de_DE", &["Anna", "Markus"]);
        assert_eq!(picked.name, "Markus");
    }

    #[test]
    fn primary_subtag_fallback() {
        let voices = [voice("Anna", "de_AT", VoiceQuality::Standard)];
        let picked = select_voice(&voices, "de_DE", PREFERRED_VOICES);
        assert_eq!(picked.name, "Anna");

        let picked = select_voice(&voices, "de", PREFERRED_VOICES);
        assert_eq!(picked.name, "Anna");
    }

    #[test]
    fn hyphenated_hint_is_normalised() {
        let voices = [voice("Thomas", "fr_FR", VoiceQuality::Standard)];
        let picked = select_voice(&voices, "fr-FR", PREFERRED_VOICES);
        assert_eq!(picked.name, "Thomas");
    }

    #[test]
    fn any_name_is_the_last_resort() {
        let voices = [voice("Zelda", "it_IT", VoiceQuality::Standard)];
        let picked = select_voice(&voices, "it_IT", &["Alice"]);
        assert_eq!(picked.name, "Zelda");
    }

    #[test]
    fn language_prefix_is_case_insensitive() {
        let voices = [voice("samantha", "EN_us", VoiceQuality::Standard)];
        let picked = select_voice(&voices, "en_US", &["Samantha"]);
        assert_eq!(picked.name, "samantha");
    }

    #[test]
    fn no_match_returns_empty_voice() {
        let voices = [voice("Kyoko", "ja_JP", VoiceQuality::Enhanced)];
        let picked = select_voice(&voices, "sv_SE", PREFERRED_VOICES);
        assert!(picked.is_empty());
        assert_eq!(picked, Voice::default());
    }
}
