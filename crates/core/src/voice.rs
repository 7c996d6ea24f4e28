//! Voice name helpers
//!
//! Cloud voice names carry their language as a prefix, e.g.
//! `de-DE-Chirp3-HD-Kore` is a German (Germany) voice named `Kore`.

const DEFAULT_LANGUAGE: &str = "en-US";

/// Language code prefix of a voice name, `en-US` when there is none
pub fn language_code(voice: &str) -> String {
    let mut parts = voice.split('-');
    match (parts.next(), parts.next()) {
        (Some(lang), Some(region)) if is_language_part(lang) && is_language_part(region) => {
            format!("{}-{}", lang, region)
        }
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

fn is_language_part(part: &str) -> bool {
    (2..=3).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphabetic())
}

/// Same-language alternates for `voice`, most similar first
///
/// The first entry keeps the original speaker name on the newest voice
/// family; the rest are stock voices that exist for most languages. The
/// original voice itself is never part of the list.
pub fn language_fallback_voices(voice: &str) -> Vec<String> {
    let lang = language_code(voice);
    let speaker = voice
        .rsplit_once('-')
        .map(|(_, name)| name)
        .filter(|name| !name.is_empty())
        .unwrap_or(voice);

    [
        format!("{}-Chirp3-HD-{}", lang, speaker),
        format!("{}-Chirp-HD-O", lang),
        format!("{}-Neural2-G", lang),
        format!("{}-Standard-G", lang),
        format!("{}-Studio-C", lang),
    ]
    .into_iter()
    .filter(|candidate| candidate != voice)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_code() {
        assert_eq!(language_code("de-DE-Chirp3-HD-Kore"), "de-DE");
        assert_eq!(language_code("en-GB-Neural2-A"), "en-GB");
        assert_eq!(language_code("shimmer"), "en-US");
        assert_eq!(language_code("Chirp3-HD-Kore"), "en-US");
    }

    #[test]
    fn test_fallback_voices_keep_speaker() {
        let voices = language_fallback_voices("de-DE-Chirp-HD-Kore");
        assert_eq!(voices[0], "de-DE-Chirp3-HD-Kore");
        assert!(voices.iter().all(|v| v.starts_with("de-DE-")));
        assert_eq!(voices.len(), 5);
    }

    #[test]
    fn test_original_voice_excluded() {
        let voices = language_fallback_voices("de-DE-Chirp3-HD-Kore");
        assert!(!voices.contains(&"de-DE-Chirp3-HD-Kore".to_string()));
        assert_eq!(voices.len(), 4);
    }

    #[test]
    fn test_plain_voice_name() {
        let voices = language_fallback_voices("shimmer");
        assert_eq!(voices[0], "en-US-Chirp3-HD-shimmer");
    }
}
