//! Speech playback: builds the utterance a browser speech engine should play.
//!
//! The server never synthesizes audio. It hands the client a `SpeechRequest`
//! (or a ready-made speak/stop widget) and the browser's `speechSynthesis` does the rest.

use serde::{Deserialize, Serialize};

use crate::language::{LanguageCode, LocaleTag};

pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 1.5;
pub const DEFAULT_RATE: f32 = 0.8;

/// Language code that bypasses the locale table, see `build_speech_request`.
const FRENCH: &str = "fr";
const FRENCH_LOCALE: &str = "fr-FR";

/// Playback rate clamped to [0.5, 1.5] and snapped to 0.1 steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpeechRate(f32);

impl SpeechRate {
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        let clamped = value.clamp(MIN_RATE, MAX_RATE);
        Self((clamped * 10.0).round() / 10.0)
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self(DEFAULT_RATE)
    }
}

/// A voice the client reports as installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub lang: String,
}

/// One utterance for the browser speech engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    /// Text with line breaks flattened to spaces.
    pub text: String,
    pub rate: SpeechRate,
    /// Locale the utterance is spoken in.
    pub lang: String,
    /// Exact voice to use, when one was picked from the client's voice list.
    pub voice_name: Option<String>,
    /// Language prefix the client should match against its own voices when
    /// `voice_name` is absent.
    pub voice_prefix: Option<String>,
}

/// Replaces every line break with a space.
pub fn flatten_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Builds the utterance for a finished track result.
///
/// French is special-cased: when the raw detected code is `"fr"`, the locale is
/// forced to `fr-FR` and the first client voice whose language starts with `fr`
/// is preferred. Every other language uses the resolved locale tag as-is.
// TODO: decide whether voice preference should apply to every language with a
// matching installed voice rather than French only.
pub fn build_speech_request(
    text: &str,
    language: &LanguageCode,
    locale: LocaleTag,
    rate: SpeechRate,
    voices: &[VoiceInfo],
) -> SpeechRequest {
    let text = flatten_line_breaks(text);

    if language.as_str() == FRENCH {
        let voice_name = voices
            .iter()
            .find(|v| v.lang.to_ascii_lowercase().starts_with(FRENCH))
            .map(|v| v.name.clone());
        return SpeechRequest {
            text,
            rate,
            lang: FRENCH_LOCALE.to_string(),
            voice_name,
            voice_prefix: Some(FRENCH.to_string()),
        };
    }

    SpeechRequest {
        text,
        rate,
        lang: locale.as_str().to_string(),
        voice_name: None,
        voice_prefix: None,
    }
}

/// Renders a self-contained speak/stop widget for `request`.
///
/// The request is embedded as a JSON literal, so quotes and backslashes in the
/// text arrive escaped; `</` is escaped too so the text cannot close the script.
pub fn player_html(request: &SpeechRequest, title: &str) -> String {
    let payload = serde_json::to_string(request)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    let title = escape_html(title);

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<script>
    const request = {payload};
    let utterance;
    function speak() {{
        if (utterance) window.speechSynthesis.cancel();
        utterance = new SpeechSynthesisUtterance(request.text);
        utterance.rate = request.rate;
        utterance.lang = request.lang;
        const voices = window.speechSynthesis.getVoices();
        let voice = null;
        if (request.voice_name) {{
            voice = voices.find(v => v.name === request.voice_name) || null;
        }}
        if (!voice && request.voice_prefix) {{
            voice = voices.find(v => v.lang.startsWith(request.voice_prefix)) || null;
        }}
        if (voice) utterance.voice = voice;
        window.speechSynthesis.speak(utterance);
    }}
    function stopSpeech() {{
        window.speechSynthesis.cancel();
    }}
</script>
<button onclick="speak()">Read aloud</button>
<button onclick="stopSpeech()">Stop</button>
</body>
</html>
"#
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
