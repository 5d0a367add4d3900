//! Per-route handlers.
//!
//! Handlers run only for admitted events. They return typed errors; the
//! dispatch boundary in `bot` converts those into localized notices, so
//! nothing here crafts error replies by hand.

use tracing::{debug, info, warn};

use crate::audio::{check_mime, check_size};
use crate::bot::AppState;
use crate::error::{BotError, Result};
use crate::middleware::Route;
use crate::platform::{EventPayload, InboundEvent, Transport};

pub async fn run(
    state: &AppState,
    transport: &dyn Transport,
    route: Route,
    event: &InboundEvent,
) -> Result<()> {
    match route {
        Route::Start => start(state, transport, event).await,
        Route::Help => help(state, transport, event).await,
        Route::Settings => settings(state, transport, event).await,
        Route::SetLanguage => set_language(state, transport, event).await,
        Route::Proofread => proofread(state, transport, event).await,
        Route::Voice => voice(state, transport, event).await,
        Route::AddUser => add_user(state, transport, event).await,
        Route::RemoveUser => remove_user(state, transport, event).await,
        Route::ListUsers => list_users(state, transport, event).await,
        Route::Debug => toggle_debug(state, transport, event).await,
        Route::None => Ok(()),
    }
}

fn command_args(event: &InboundEvent) -> &str {
    match &event.payload {
        EventPayload::Command { args, .. } => args,
        _ => "",
    }
}

/// Admin handlers re-check admin identity themselves; the middleware's
/// general authorization check is necessary but not sufficient for them.
fn require_admin(state: &AppState, event: &InboundEvent) -> Result<u64> {
    let sender = event.sender.ok_or(BotError::AdminRequired)?;
    if !state.whitelist.is_admin(sender) {
        warn!(
            "Non-admin attempt at an admin command: sender={} payload={}",
            sender,
            event.describe()
        );
        return Err(BotError::AdminRequired);
    }
    Ok(sender)
}

async fn start(state: &AppState, transport: &dyn Transport, event: &InboundEvent) -> Result<()> {
    info!("Interaction: sender={:?} command=start", event.sender);
    state.send_localized(transport, event, "welcome").await?;
    state.send_localized(transport, event, "help").await
}

async fn help(state: &AppState, transport: &dyn Transport, event: &InboundEvent) -> Result<()> {
    info!("Interaction: sender={:?} command=help", event.sender);
    let lang = state.languages.get(event.sender);
    let mut text = state.catalog.lookup("help", lang, &[]);

    let is_admin = event.sender.is_some_and(|id| state.whitelist.is_admin(id));
    if state.config.telegram.whitelist.enabled && is_admin {
        text.push_str("\n\n");
        text.push_str(&state.catalog.lookup("help_admin", lang, &[]));
    }

    transport
        .reply(event.chat_id, &state.catalog.render(&text, lang))
        .await
}

async fn settings(state: &AppState, transport: &dyn Transport, event: &InboundEvent) -> Result<()> {
    info!("Interaction: sender={:?} command=settings", event.sender);
    let lang = state.languages.get(event.sender);
    state
        .send_localized_with(
            transport,
            event,
            "settings_current",
            &[("language", lang.name().to_string())],
        )
        .await
}

async fn set_language(
    state: &AppState,
    transport: &dyn Transport,
    event: &InboundEvent,
) -> Result<()> {
    let sender = event.sender.ok_or(BotError::Unauthorized)?;
    let code = command_args(event);
    let lang = state.languages.set(sender, code)?;
    info!("Interaction: sender={} command=language code={}", sender, lang);
    state.send_localized(transport, event, "language_set").await
}

async fn proofread(
    state: &AppState,
    transport: &dyn Transport,
    event: &InboundEvent,
) -> Result<()> {
    let text = event
        .reply_to_text
        .as_deref()
        .ok_or(BotError::MissingText)?;

    state.send_localized(transport, event, "proofreading").await?;

    let lang = state.languages.get(event.sender);
    let improved = state.proofreader.improve(text, lang).await;
    transport.reply(event.chat_id, &improved).await?;
    info!(
        "Interaction: sender={:?} command=proofread chars={}",
        event.sender,
        text.chars().count()
    );
    Ok(())
}

async fn voice(state: &AppState, transport: &dyn Transport, event: &InboundEvent) -> Result<()> {
    // Groups get no audio processing while commands_only is in force, even
    // if the admission stage let the message through.
    if event.chat_kind.is_group() && state.config.telegram.groups.commands_only {
        debug!("Ignoring audio in group chat: sender={:?}", event.sender);
        return Ok(());
    }

    let EventPayload::Audio(audio) = &event.payload else {
        return Err(BotError::MissingAudio);
    };

    // Cheap gates before any network transfer.
    check_size(audio.size, state.config.audio.max_size_bytes)?;
    check_mime(
        audio.mime_type.as_deref(),
        &state.config.audio.allowed_mime_types,
    )?;

    debug!(
        "Processing audio: sender={:?} file_id={} size={}",
        event.sender, audio.file_id, audio.size
    );
    state
        .send_localized(transport, event, "processing_audio")
        .await?;

    let url = transport.file_url(&audio.file_id).await?;
    let scratch = state.pipeline.prepare(&url, &audio.unique_id).await?;

    // Everything after acquisition runs under the guard; release happens
    // on both exits before the result propagates.
    let result = async {
        let lang = state.languages.get(event.sender);
        let transcript = state.transcriber.transcribe(scratch.wav_path(), lang).await?;

        if transcript.is_empty() {
            state
                .send_localized(transport, event, "no_speech_detected")
                .await?;
        } else {
            transport.reply(event.chat_id, &transcript).await?;
            state.send_localized(transport, event, "success").await?;
        }
        Ok(())
    }
    .await;

    scratch.release().await;

    if result.is_ok() {
        info!(
            "Interaction: sender={:?} command=audio file_id={} ok",
            event.sender, audio.file_id
        );
    }
    result
}

async fn add_user(state: &AppState, transport: &dyn Transport, event: &InboundEvent) -> Result<()> {
    let admin = require_admin(state, event)?;

    let Ok(target) = command_args(event).parse::<u64>() else {
        return state.send_localized(transport, event, "usage_adduser").await;
    };

    state.whitelist.add(target);
    info!("Whitelist operation: add admin={} target={}", admin, target);
    state
        .send_localized_with(
            transport,
            event,
            "user_added",
            &[("user_id", target.to_string())],
        )
        .await
}

async fn remove_user(
    state: &AppState,
    transport: &dyn Transport,
    event: &InboundEvent,
) -> Result<()> {
    let admin = require_admin(state, event)?;

    let Ok(target) = command_args(event).parse::<u64>() else {
        return state
            .send_localized(transport, event, "usage_removeuser")
            .await;
    };

    state.whitelist.remove(target)?;
    info!(
        "Whitelist operation: remove admin={} target={}",
        admin, target
    );
    state
        .send_localized_with(
            transport,
            event,
            "user_removed",
            &[("user_id", target.to_string())],
        )
        .await
}

async fn list_users(
    state: &AppState,
    transport: &dyn Transport,
    event: &InboundEvent,
) -> Result<()> {
    require_admin(state, event)?;

    let lang = state.languages.get(event.sender);
    let members = state.whitelist.members();

    let mut text = state.catalog.lookup("whitelist_users", lang, &[]);
    text.push('\n');
    if members.is_empty() {
        text.push_str(&state.catalog.lookup("whitelist_empty", lang, &[]));
    } else {
        for id in members {
            text.push_str(&id.to_string());
            text.push('\n');
        }
    }
    text.push('\n');
    text.push_str(&state.catalog.lookup(
        "whitelist_admin",
        lang,
        &[("admin_id", state.whitelist.admin_id().to_string())],
    ));

    transport
        .reply(event.chat_id, &state.catalog.render(&text, lang))
        .await
}

async fn toggle_debug(
    state: &AppState,
    transport: &dyn Transport,
    event: &InboundEvent,
) -> Result<()> {
    let admin = require_admin(state, event)?;

    match command_args(event) {
        "on" => {
            state.logs.set_verbose(true);
            info!("Debug logging enabled by admin {}", admin);
            state.send_localized(transport, event, "debug_on").await
        }
        "off" => {
            state.logs.set_verbose(false);
            info!("Debug logging disabled by admin {}", admin);
            state.send_localized(transport, event, "debug_off").await
        }
        _ => state.send_localized(transport, event, "usage_debug").await,
    }
}
