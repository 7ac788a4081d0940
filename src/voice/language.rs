//! Language hints from transcription metadata

/// Language names as reported by Whisper-style transcription, with their
/// primary language subtags
const LANGUAGES: &[(&str, &str)] = &[
    ("afrikaans", "af"),
    ("arabic", "ar"),
    ("armenian", "hy"),
    ("azerbaijani", "az"),
    ("bulgarian", "bg"),
    ("catalan", "ca"),
    ("chinese", "zh"),
    ("croatian", "hr"),
    ("czech", "cs"),
    ("danish", "da"),
    ("dutch", "nl"),
    ("english", "en"),
    ("estonian", "et"),
    ("finnish", "fi"),
    ("french", "fr"),
    ("german", "de"),
    ("greek", "el"),
    ("hebrew", "he"),
    ("hindi", "hi"),
    ("hungarian", "hu"),
    ("icelandic", "is"),
    ("indonesian", "id"),
    ("italian", "it"),
    ("japanese", "ja"),
    ("kannada", "kn"),
    ("kazakh", "kk"),
    ("korean", "ko"),
    ("latvian", "lv"),
    ("lithuanian", "lt"),
    ("macedonian", "mk"),
    ("malay", "ms"),
    ("marathi", "mr"),
    ("nepali", "ne"),
    ("norwegian", "no"),
    ("persian", "fa"),
    ("polish", "pl"),
    ("portuguese", "pt"),
    ("romanian", "ro"),
    ("russian", "ru"),
    ("serbian", "sr"),
    ("slovak", "sk"),
    ("slovenian", "sl"),
    ("spanish", "es"),
    ("swahili", "sw"),
    ("swedish", "sv"),
    ("tamil", "ta"),
    ("thai", "th"),
    ("turkish", "tr"),
    ("ukrainian", "uk"),
    ("urdu", "ur"),
    ("vietnamese", "vi"),
];

/// Normalise a detected language to its primary tag
///
/// Accepts either a language name ("German") or a tag ("de"). Anything
/// unrecognised yields an empty string, meaning "no hint".
#[must_use]
pub fn language_tag(detected: &str) -> String {
    let detected = detected.trim().to_lowercase();
    if detected.is_empty() {
        return String::new();
    }

    LANGUAGES
        .iter()
        .find(|(name, tag)| *name == detected || *tag == detected)
        .map(|(_, tag)| (*tag).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_tags() {
        assert_eq!(language_tag("german"), "de");
        assert_eq!(language_tag("English"), "en");
        assert_eq!(language_tag(" japanese "), "ja");
    }

    #[test]
    fn tags_pass_through() {
        assert_eq!(language_tag("fr"), "fr");
        assert_eq!(language_tag("SV"), "sv");
    }

    #[test]
    fn unknown_is_empty() {
        assert_eq!(language_tag(""), "");
        assert_eq!(language_tag("klingon"), "");
        assert_eq!(language_tag("tagalog"), "");
    }
}
