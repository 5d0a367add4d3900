//! Per-event error taxonomy.
//!
//! Every fallible step of message handling surfaces one of these variants.
//! The dispatch boundary converts them into localized user notices via
//! [`BotError::notice_key`]; nothing below that boundary talks to the user.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Authorization
    #[error("sender is not authorized")]
    Unauthorized,

    #[error("admin identity required")]
    AdminRequired,

    // Validation
    #[error("unknown language code: {code}")]
    UnknownLanguage { code: String },

    #[error("audio exceeds maximum size: {size} > {max} bytes")]
    AudioTooLarge { size: u64, max: u64 },

    #[error("unsupported audio format: {mime}")]
    UnsupportedFormat { mime: String },

    #[error("message carries no audio attachment")]
    MissingAudio,

    #[error("no text to proofread")]
    MissingText,

    #[error("the admin id cannot be removed from the whitelist")]
    AdminImmutable,

    // Resources (download / transcode / scratch files)
    #[error("download failed: {message}")]
    Download { message: String },

    #[error("transcoding failed: {message}")]
    Transcode { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // External backends
    #[error("{service} backend error: {message}")]
    Backend {
        service: &'static str,
        message: String,
    },

    // Transport (reply delivery)
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl BotError {
    /// Catalog key for the user-facing notice this error maps to.
    ///
    /// Resource and backend failures all collapse to the generic processing
    /// notice so internals are never exposed to the chat.
    pub fn notice_key(&self) -> &'static str {
        match self {
            BotError::Unauthorized => "not_authorized",
            BotError::AdminRequired => "admin_only",
            BotError::UnknownLanguage { .. } => "invalid_language",
            BotError::AudioTooLarge { .. } => "error_too_large",
            BotError::UnsupportedFormat { .. } => "error_unsupported_format",
            BotError::MissingAudio => "error_no_audio",
            BotError::MissingText => "no_text_to_proofread",
            BotError::AdminImmutable => "cannot_remove_admin",
            BotError::Download { .. }
            | BotError::Transcode { .. }
            | BotError::Io(_)
            | BotError::Backend { .. }
            | BotError::Transport { .. } => "error_processing",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
