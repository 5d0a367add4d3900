//! Supported languages and their per-language tables.

/// Writing direction of a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

/// A supported language. Unknown codes never produce an error anywhere in
/// the bot; they resolve to the configured default via [`Language::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Fa,
    Sv,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fa, Language::Sv];

    /// Short code used in commands and locale directories.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fa => "fa",
            Language::Sv => "sv",
        }
    }

    /// Human-readable name, shown in /settings.
    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fa => "Persian",
            Language::Sv => "Swedish",
        }
    }

    /// Locale tag the speech backend expects.
    pub fn locale_tag(&self) -> &'static str {
        match self {
            Language::En => "en-US",
            Language::Fa => "fa-IR",
            Language::Sv => "sv-SE",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Language::Fa => Direction::Rtl,
            Language::En | Language::Sv => Direction::Ltr,
        }
    }

    /// Parse a short code. Case-insensitive.
    pub fn parse(code: &str) -> Option<Language> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Language::En),
            "fa" => Some(Language::Fa),
            "sv" => Some(Language::Sv),
            _ => None,
        }
    }

    /// Resolve a code, falling back to `default` for anything unrecognized.
    pub fn resolve(code: &str, default: Language) -> Language {
        Language::parse(code).unwrap_or(default)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
