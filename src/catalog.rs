//! Localized message catalog.
//!
//! Messages live in `<locales_dir>/<code>/messages.json`, one flat
//! key → string map per language. Lookup falls back to the default language
//! and finally to the raw key, so a missing translation never breaks a
//! reply.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::language::{Direction, Language};

/// Unicode directional embedding marks for RTL replies.
const RTL_EMBED: char = '\u{202B}';
const POP_DIRECTIONAL: char = '\u{202C}';

pub struct MessageCatalog {
    messages: HashMap<Language, HashMap<String, String>>,
    default_language: Language,
}

impl MessageCatalog {
    /// Load every supported language's catalog from `locales_dir`.
    /// A missing or malformed file is logged and skipped; lookups for that
    /// language fall through to the default.
    pub fn load(locales_dir: &Path, default_language: Language) -> Self {
        let mut messages = HashMap::new();
        for lang in Language::ALL {
            let path = locales_dir.join(lang.code()).join("messages.json");
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                    Ok(map) => {
                        messages.insert(lang, map);
                    }
                    Err(e) => warn!("Skipping malformed catalog {}: {}", path.display(), e),
                },
                Err(e) => warn!("Skipping missing catalog {}: {}", path.display(), e),
            }
        }
        MessageCatalog {
            messages,
            default_language,
        }
    }

    /// Build a catalog from in-memory maps. Used by tests.
    #[cfg(test)]
    pub fn from_maps(
        maps: Vec<(Language, HashMap<String, String>)>,
        default_language: Language,
    ) -> Self {
        MessageCatalog {
            messages: maps.into_iter().collect(),
            default_language,
        }
    }

    /// Look up `key` in `lang`, falling back to the default language and
    /// then to the key itself. `{name}` placeholders are substituted from
    /// `params`.
    pub fn lookup(&self, key: &str, lang: Language, params: &[(&str, String)]) -> String {
        let raw = self
            .messages
            .get(&lang)
            .and_then(|m| m.get(key))
            .or_else(|| {
                self.messages
                    .get(&self.default_language)
                    .and_then(|m| m.get(key))
            })
            .map(String::as_str)
            .unwrap_or(key);

        let mut text = raw.to_string();
        for (name, value) in params {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }

    /// Wrap text in directional embedding marks for RTL languages.
    pub fn render(&self, text: &str, lang: Language) -> String {
        match lang.direction() {
            Direction::Rtl => format!("{}{}{}", RTL_EMBED, text, POP_DIRECTIONAL),
            Direction::Ltr => text.to_string(),
        }
    }

    /// Localized, direction-formatted message in one step.
    pub fn message(&self, key: &str, lang: Language, params: &[(&str, String)]) -> String {
        self.render(&self.lookup(key, lang, params), lang)
    }
}
