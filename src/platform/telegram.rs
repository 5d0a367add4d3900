//! Telegram binding: teloxide dispatcher, message conversion, transport.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::{info, warn};

use crate::bot::AppState;
use crate::error::BotError;
use crate::platform::{
    parse_command, AudioAttachment, ChatKind, EventPayload, InboundEvent, Transport,
};

/// Telegram as the core's transport collaborator.
pub struct TelegramTransport {
    bot: Bot,
    token: String,
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn reply(&self, chat_id: i64, text: &str) -> crate::error::Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| BotError::Transport {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn file_url(&self, file_id: &str) -> crate::error::Result<String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| BotError::Download {
                message: format!("getFile failed: {}", e),
            })?;
        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.token, file.path
        ))
    }
}

fn chat_kind_of(msg: &Message) -> ChatKind {
    if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Direct
    }
}

fn attachment_from(file: &teloxide::types::FileMeta, mime: Option<String>) -> AudioAttachment {
    AudioAttachment {
        file_id: file.id.0.clone(),
        unique_id: file.unique_id.0.clone(),
        size: u64::from(file.size),
        mime_type: mime,
    }
}

fn payload_of(msg: &Message) -> EventPayload {
    if let Some(voice) = msg.voice() {
        return EventPayload::Audio(attachment_from(
            &voice.file,
            voice.mime_type.as_ref().map(|m| m.to_string()),
        ));
    }
    if let Some(audio) = msg.audio() {
        return EventPayload::Audio(attachment_from(
            &audio.file,
            audio.mime_type.as_ref().map(|m| m.to_string()),
        ));
    }
    match msg.text() {
        Some(text) => match parse_command(text) {
            Some((name, args)) => EventPayload::Command { name, args },
            None => EventPayload::Text(text.to_string()),
        },
        // Stickers, photos and the rest count as non-command noise.
        None => EventPayload::Text(String::new()),
    }
}

fn to_event(msg: &Message) -> InboundEvent {
    InboundEvent {
        sender: msg.from.as_ref().map(|u| u.id.0),
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind_of(msg),
        payload: payload_of(msg),
        reply_to_text: msg
            .reply_to_message()
            .and_then(|m| m.text())
            .map(|t| t.to_string()),
    }
}

/// Run the Telegram event loop. One independent task per inbound message;
/// a failure inside one never reaches another.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);
    let transport = Arc::new(TelegramTransport {
        bot: bot.clone(),
        token: state.config.telegram.bot_token.clone(),
    });

    info!("Starting Telegram bot...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, transport])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    msg: Message,
    state: Arc<AppState>,
    transport: Arc<TelegramTransport>,
) -> ResponseResult<()> {
    let event = to_event(&msg);
    crate::bot::dispatch(&state, transport.as_ref(), event).await;
    Ok(())
}
