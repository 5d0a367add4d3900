pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;

/// Kind of chat an event arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Direct,
    Group,
    Supergroup,
}

impl ChatKind {
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// A voice or audio attachment reference.
#[derive(Debug, Clone)]
pub struct AudioAttachment {
    /// Transport file id, used to resolve a download URL.
    pub file_id: String,
    /// Stable per-attachment id; doubles as the pipeline correlation id.
    pub unique_id: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Declared MIME type, when the transport provides one.
    pub mime_type: Option<String>,
}

/// Payload of an inbound event.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// `/name args` invocation.
    Command { name: String, args: String },
    /// Voice message or audio file.
    Audio(AudioAttachment),
    /// Plain text.
    Text(String),
}

/// A platform-agnostic inbound event. Immutable once built.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Resolved sender id, if the transport provided one.
    pub sender: Option<u64>,
    /// Chat to reply into.
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub payload: EventPayload,
    /// Text of the message this one replies to, for /proofread.
    pub reply_to_text: Option<String>,
}

impl InboundEvent {
    pub fn command_name(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Command { name, .. } => Some(name),
            _ => None,
        }
    }

    /// One-line payload summary for log records. Never includes file
    /// contents or credentials.
    pub fn describe(&self) -> String {
        match &self.payload {
            EventPayload::Command { name, args } if args.is_empty() => format!("/{}", name),
            EventPayload::Command { name, args } => format!("/{} {}", name, args),
            EventPayload::Audio(audio) => format!("audio ({} bytes)", audio.size),
            EventPayload::Text(text) => format!("text ({} chars)", text.chars().count()),
        }
    }
}

/// Parse a command invocation out of message text: `/name args`, with an
/// optional `@botname` suffix on the command as Telegram appends in groups.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.strip_prefix('/')?;
    if rest.is_empty() {
        return None;
    }
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_string()))
}

/// The messaging transport as seen by the core: a reply sink plus
/// file-URL resolution. The wire protocol lives behind this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn reply(&self, chat_id: i64, text: &str) -> Result<()>;
    async fn file_url(&self, file_id: &str) -> Result<String>;
}
