//! Locale resolution: maps a detected language code to a speech-synthesis locale tag.

use serde::Serialize;

use super::LanguageCode;

/// Locale used for every language without an entry in `LOCALE_TABLE`.
pub const DEFAULT_LOCALE: &str = "en-US";

static LOCALE_TABLE: &[(&str, &str)] = &[
    ("en", "en-US"),
    ("fr", "fr-FR"),
    ("es", "es-ES"),
    ("ar", "ar-SA"),
    ("de", "de-DE"),
    ("pt", "pt-PT"),
    ("it", "it-IT"),
    ("ru", "ru-RU"),
];

/// A BCP 47 locale tag understood by the browser speech engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LocaleTag(&'static str);

impl LocaleTag {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Total: unmapped codes resolve to `DEFAULT_LOCALE`.
pub fn resolve_locale(code: &LanguageCode) -> LocaleTag {
    lookup(code.as_str())
}

fn lookup(code: &str) -> LocaleTag {
    LOCALE_TABLE
        .iter()
        .find(|(lang, _)| *lang == code)
        .map(|(_, tag)| LocaleTag(tag))
        .unwrap_or(LocaleTag(DEFAULT_LOCALE))
}
