//! Proofreading adapter.
//!
//! The deterministic stage always runs and never fails: whitespace
//! collapse, punctuation spacing for the language's writing direction, and
//! digit localization. The external backend is an enhancement on top; any
//! fault there is swallowed and the deterministic result is kept.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProofreadConfig;
use crate::error::{BotError, Result};
use crate::language::{Direction, Language};

/// Sentence punctuation for left-to-right languages.
const LTR_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];
/// Sentence punctuation for right-to-left languages.
const RTL_PUNCTUATION: &[char] = &['،', '؛', '؟', '.'];

/// Persian digits, indexed by the ASCII digit value.
const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

/// External proofreading service.
#[async_trait]
pub trait ProofreadBackend: Send + Sync {
    async fn improve(&self, text: &str, locale: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ImproveRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImproveResponse {
    text: String,
}

/// HTTP proofreading backend client.
pub struct ProofreadApiClient {
    client: reqwest::Client,
    config: ProofreadConfig,
}

impl ProofreadApiClient {
    pub fn new(config: ProofreadConfig) -> Self {
        ProofreadApiClient {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ProofreadBackend for ProofreadApiClient {
    async fn improve(&self, text: &str, locale: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&ImproveRequest {
                text,
                language: locale,
            })
            .send()
            .await
            .map_err(|e| BotError::Backend {
                service: "proofreading",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Backend {
                service: "proofreading",
                message: format!("{}: {}", status, body),
            });
        }

        let parsed: ImproveResponse = response.json().await.map_err(|e| BotError::Backend {
            service: "proofreading",
            message: format!("malformed response: {}", e),
        })?;
        Ok(parsed.text)
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove spaces before punctuation and keep exactly one space after it.
/// Consecutive marks ("...") and digit-adjacent marks ("3.14") are left
/// untouched.
fn fix_punctuation(text: &str, punctuation: &[char]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == ' ' {
            // Drop the run if it only pads a following punctuation mark.
            let mut j = i;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j < chars.len() && punctuation.contains(&chars[j]) {
                i = j;
                continue;
            }
            out.push(' ');
            i = j;
        } else if punctuation.contains(&c) {
            out.push(c);
            let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let mut j = i + 1;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j < chars.len() {
                let next = chars[j];
                let keep_tight =
                    punctuation.contains(&next) || (prev_digit && next.is_ascii_digit());
                if !keep_tight {
                    out.push(' ');
                }
            }
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }

    out.trim().to_string()
}

/// Transliterate ASCII digits to the language's native digit script.
fn localize_digits(text: &str, language: Language) -> String {
    match language {
        Language::Fa => text
            .chars()
            .map(|c| match c.to_digit(10) {
                Some(d) if c.is_ascii_digit() => PERSIAN_DIGITS[d as usize],
                _ => c,
            })
            .collect(),
        _ => text.to_string(),
    }
}

/// The deterministic normalization stage.
pub fn normalize(text: &str, language: Language) -> String {
    let cleaned = clean_text(text);
    let punctuation = match language.direction() {
        Direction::Ltr => LTR_PUNCTUATION,
        Direction::Rtl => RTL_PUNCTUATION,
    };
    let fixed = fix_punctuation(&cleaned, punctuation);
    localize_digits(&fixed, language)
}

/// Proofreading adapter. `improve` always succeeds from the caller's view.
pub struct Proofreader {
    backend: Option<Arc<dyn ProofreadBackend>>,
}

impl Proofreader {
    pub fn new(backend: Option<Arc<dyn ProofreadBackend>>) -> Self {
        Proofreader { backend }
    }

    /// Normalize the text, then let the external backend refine it when
    /// configured. A backend fault keeps the deterministic result.
    pub async fn improve(&self, text: &str, language: Language) -> String {
        let normalized = normalize(text, language);

        if let Some(backend) = &self.backend {
            match backend.improve(&normalized, language.locale_tag()).await {
                Ok(improved) if !improved.trim().is_empty() => {
                    debug!("Proofreading backend replaced deterministic output");
                    return improved;
                }
                Ok(_) => {}
                Err(e) => warn!("Proofreading backend failed, keeping local result: {}", e),
            }
        }

        normalized
    }
}
