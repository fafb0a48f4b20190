//! Language detection: best-guess ISO 639-1 code for a text sample.
//!
//! Detection is stateless and deterministic. When the sample is too short or the
//! statistical detector gives up, the fixed fallback code is returned with
//! `degraded = true` instead of an error.

use serde::Serialize;
use tracing::debug;

pub mod locale;

pub use locale::{resolve_locale, LocaleTag};

/// Returned whenever inference cannot produce a code.
pub const FALLBACK_LANGUAGE: &str = "fr";

/// Only the first N characters are inspected.
pub const SAMPLE_CHARS: usize = 1000;

/// Below this many alphabetic characters the sample is not worth classifying.
const MIN_ALPHABETIC_CHARS: usize = 8;

/// A short, never-empty language identifier such as `"en"` or `"fr"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Builds a code from caller input; blank input is rejected.
    #[cfg(test)]
    pub fn new(code: &str) -> Option<Self> {
        let code = code.trim();
        (!code.is_empty()).then(|| Self(code.to_ascii_lowercase()))
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_LANGUAGE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one detection call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub code: LanguageCode,
    /// Detector confidence in [0, 1]; 0 when the fallback was used.
    pub confidence: f64,
    /// True when `code` is the fallback rather than an inferred language.
    pub degraded: bool,
}

impl Detection {
    fn fallback() -> Self {
        Self {
            code: LanguageCode::fallback(),
            confidence: 0.0,
            degraded: true,
        }
    }
}

pub fn detect_language(text: &str) -> Detection {
    let sample: String = text.chars().take(SAMPLE_CHARS).collect();

    let alphabetic = sample.chars().filter(|c| c.is_alphabetic()).count();
    if alphabetic < MIN_ALPHABETIC_CHARS {
        debug!("Language detection skipped ({alphabetic} letters), using {FALLBACK_LANGUAGE}");
        return Detection::fallback();
    }

    match whatlang::detect(&sample) {
        Some(info) => {
            let code = to_iso639_1(info.lang().code());
            debug!(
                "Detected language: {code} (confidence {:.2})",
                info.confidence()
            );
            Detection {
                code: LanguageCode(code.to_string()),
                confidence: info.confidence(),
                degraded: false,
            }
        }
        None => {
            debug!("Language detection failed, using default: {FALLBACK_LANGUAGE}");
            Detection::fallback()
        }
    }
}

/// Narrows whatlang's ISO 639-3 codes to the two-letter codes used everywhere else.
/// Languages without a two-letter code keep their three-letter form.
fn to_iso639_1(code: &'static str) -> &'static str {
    match code {
        "eng" => "en",
        "fra" => "fr",
        "spa" => "es",
        "ara" => "ar",
        "deu" => "de",
        "por" => "pt",
        "ita" => "it",
        "rus" => "ru",
        "nld" => "nl",
        "pol" => "pl",
        "ron" => "ro",
        "tur" => "tr",
        "ukr" => "uk",
        "cmn" => "zh",
        "jpn" => "ja",
        "kor" => "ko",
        "hin" => "hi",
        "ben" => "bn",
        "urd" => "ur",
        "pes" => "fa",
        "heb" => "he",
        "ell" => "el",
        "swe" => "sv",
        "dan" => "da",
        "nob" => "no",
        "fin" => "fi",
        "hun" => "hu",
        "ces" => "cs",
        "slk" => "sk",
        "bul" => "bg",
        "hrv" => "hr",
        "srp" => "sr",
        "slv" => "sl",
        "cat" => "ca",
        "vie" => "vi",
        "ind" => "id",
        "tha" => "th",
        "tgl" => "tl",
        "amh" => "am",
        "afr" => "af",
        "lit" => "lt",
        "lav" => "lv",
        "est" => "et",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGLISH: &str = "Hello, I am a driver with 5 years experience.";
    const FRENCH: &str = "Bonjour, je suis chauffeur depuis cinq ans. J'aime beaucoup \
        conduire et je cherche un nouveau travail dans une entreprise de transport.";
    const SPANISH: &str = "Buscamos una persona responsable para trabajar en nuestro \
        almacén. Es necesario tener experiencia con clientes y hablar bien el español.";

    #[test]
    fn test_detects_english_sentence() {
        let detection = detect_language(ENGLISH);
        assert_eq!(detection.code.as_str(), "en");
        assert!(!detection.degraded);
    }

    #[test]
    fn test_detects_french_and_spanish() {
        assert_eq!(detect_language(FRENCH).code.as_str(), "fr");
        assert_eq!(detect_language(SPANISH).code.as_str(), "es");
    }

    #[test]
    fn test_empty_input_falls_back() {
        let detection = detect_language("");
        assert_eq!(detection.code.as_str(), FALLBACK_LANGUAGE);
        assert!(detection.degraded);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn test_non_linguistic_input_falls_back() {
        for input in ["12345 67890 !!!", "   \n\t  ", "ab", "€€€ 42 %%%"] {
            let detection = detect_language(input);
            assert_eq!(detection.code.as_str(), "fr", "input {input:?}");
            assert!(detection.degraded);
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let first = detect_language(FRENCH);
        for _ in 0..5 {
            assert_eq!(detect_language(FRENCH), first);
        }
    }

    #[test]
    fn test_only_first_thousand_chars_are_sampled() {
        // An English head followed by a long Spanish tail: only the head is seen.
        let head = ENGLISH.repeat(30);
        assert!(head.chars().count() >= SAMPLE_CHARS);
        let text = format!("{head}{}", SPANISH.repeat(50));
        assert_eq!(detect_language(&text).code.as_str(), "en");
    }

    #[test]
    fn test_iso_narrowing_keeps_unknown_codes() {
        assert_eq!(to_iso639_1("deu"), "de");
        assert_eq!(to_iso639_1("epo"), "epo");
    }
}
