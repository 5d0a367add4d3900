//! Shared application state and the per-event dispatch boundary.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::audio::{AudioFetcher, AudioPipeline, FfmpegTranscoder, HttpFetcher, Transcoder};
use crate::catalog::MessageCatalog;
use crate::config::Config;
use crate::error::BotError;
use crate::handlers;
use crate::language::Language;
use crate::middleware::{screen, Admission};
use crate::platform::{InboundEvent, Transport};
use crate::proofread::{ProofreadApiClient, ProofreadBackend, Proofreader};
use crate::speech::{SpeechApiClient, SpeechBackend, Transcriber};
use crate::store::{LanguageStore, Whitelist};

/// Runtime verbosity toggle for the admin /debug command.
///
/// Wraps the tracing-subscriber reload handle; a state without one (tests)
/// makes the toggle a no-op.
pub struct LogControl {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogControl {
    pub fn new(handle: reload::Handle<EnvFilter, Registry>) -> Self {
        LogControl {
            handle: Some(handle),
        }
    }

    /// A no-op control for tests, which install no subscriber.
    #[cfg(test)]
    pub fn disabled() -> Self {
        LogControl { handle: None }
    }

    /// Swap the active filter. Best-effort: a reload failure is logged and
    /// the previous filter stays in place.
    pub fn set_verbose(&self, verbose: bool) {
        if let Some(handle) = &self.handle {
            let directive = if verbose { "debug" } else { "info" };
            if let Err(e) = handle.reload(EnvFilter::new(directive)) {
                warn!("Failed to reload log filter: {}", e);
            }
        }
    }
}

/// External capabilities injected at the composition root.
pub struct Collaborators {
    pub fetcher: Arc<dyn AudioFetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub speech: Arc<dyn SpeechBackend>,
    pub proofreading: Option<Arc<dyn ProofreadBackend>>,
}

impl Collaborators {
    /// Production wiring: HTTP download, ffmpeg, the configured speech API,
    /// and the proofreading API when enabled.
    pub fn production(config: &Config) -> Self {
        let proofreading: Option<Arc<dyn ProofreadBackend>> = if config.proofreading.enabled() {
            Some(Arc::new(ProofreadApiClient::new(config.proofreading.clone())))
        } else {
            None
        };
        Collaborators {
            fetcher: Arc::new(HttpFetcher::new()),
            transcoder: Arc::new(FfmpegTranscoder),
            speech: Arc::new(SpeechApiClient::new(config.speech.clone())),
            proofreading,
        }
    }
}

/// Shared application state, owned by the composition root and passed to
/// every handler.
pub struct AppState {
    pub config: Config,
    pub catalog: MessageCatalog,
    pub whitelist: Whitelist,
    pub languages: LanguageStore,
    pub pipeline: AudioPipeline,
    pub transcriber: Transcriber,
    pub proofreader: Proofreader,
    pub logs: LogControl,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog: MessageCatalog,
        logs: LogControl,
        collaborators: Collaborators,
    ) -> Self {
        let whitelist = Whitelist::new(
            config.telegram.whitelist.admin_id,
            config.telegram.whitelist.users.iter().copied(),
        );
        let default_language = Language::resolve(&config.bot.default_language, Language::En);
        let languages = LanguageStore::new(default_language);
        let pipeline = AudioPipeline::new(
            config.audio.scratch_dir.clone(),
            collaborators.fetcher,
            collaborators.transcoder,
        );
        let transcriber = Transcriber::new(collaborators.speech);
        let proofreader = Proofreader::new(collaborators.proofreading);

        AppState {
            config,
            catalog,
            whitelist,
            languages,
            pipeline,
            transcriber,
            proofreader,
            logs,
        }
    }

    /// Send a localized, direction-formatted catalog message into the
    /// event's chat, in the sender's preferred language.
    pub async fn send_localized(
        &self,
        transport: &dyn Transport,
        event: &InboundEvent,
        key: &str,
    ) -> crate::error::Result<()> {
        self.send_localized_with(transport, event, key, &[]).await
    }

    pub async fn send_localized_with(
        &self,
        transport: &dyn Transport,
        event: &InboundEvent,
        key: &str,
        params: &[(&str, String)],
    ) -> crate::error::Result<()> {
        let lang = self.languages.get(event.sender);
        transport
            .reply(event.chat_id, &self.catalog.message(key, lang, params))
            .await
    }
}

/// Process one inbound event to completion.
///
/// This is the per-event boundary: admission, handler, and the conversion
/// of every handler fault into a localized notice. Nothing escapes to the
/// transport loop, so one failing event can never affect another.
pub async fn dispatch(state: &AppState, transport: &dyn Transport, event: InboundEvent) {
    let enforce = state.config.telegram.whitelist.enabled;
    let decision = screen(
        &event,
        &state.whitelist,
        enforce,
        &state.config.telegram.groups,
    );

    match decision {
        Admission::Silent(reason) => {
            debug!(
                "Dropping event by group policy ({:?}): sender={:?} payload={}",
                reason,
                event.sender,
                event.describe()
            );
        }
        Admission::Notice(key) => {
            warn!(
                "Unauthorized access attempt: sender={:?} payload={} chat_kind={:?}",
                event.sender,
                event.describe(),
                event.chat_kind
            );
            send_notice(state, transport, &event, key).await;
        }
        Admission::Admit(route) => {
            debug!(
                "Processing event: sender={:?} payload={} route={:?}",
                event.sender,
                event.describe(),
                route
            );
            if let Err(err) = handlers::run(state, transport, route, &event).await {
                log_handler_error(&event, &err);
                send_notice(state, transport, &event, err.notice_key()).await;
            }
        }
    }
}

async fn send_notice(state: &AppState, transport: &dyn Transport, event: &InboundEvent, key: &str) {
    if let Err(e) = state.send_localized(transport, event, key).await {
        error!("Failed to deliver notice '{}': {}", key, e);
    }
}

fn log_handler_error(event: &InboundEvent, err: &BotError) {
    match err {
        BotError::Unauthorized | BotError::AdminRequired | BotError::AdminImmutable => {
            warn!(
                "Rejected operation: sender={:?} payload={} reason={}",
                event.sender,
                event.describe(),
                err
            );
        }
        BotError::UnknownLanguage { .. }
        | BotError::AudioTooLarge { .. }
        | BotError::UnsupportedFormat { .. }
        | BotError::MissingAudio
        | BotError::MissingText => {
            info!(
                "Invalid request: sender={:?} payload={} reason={}",
                event.sender,
                event.describe(),
                err
            );
        }
        _ => {
            error!(
                "Event handling failed: sender={:?} payload={} error={}",
                event.sender,
                event.describe(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::platform::{ChatKind, EventPayload};

    struct RecordingTransport {
        replies: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            RecordingTransport {
                replies: Mutex::new(Vec::new()),
            }
        }

        async fn replies(&self) -> Vec<String> {
            self.replies.lock().await.clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn reply(&self, _chat_id: i64, text: &str) -> crate::error::Result<()> {
            self.replies.lock().await.push(text.to_string());
            Ok(())
        }

        async fn file_url(&self, _file_id: &str) -> crate::error::Result<String> {
            Ok("http://files.example/f".to_string())
        }
    }

    struct NoopFetcher;

    #[async_trait]
    impl AudioFetcher for NoopFetcher {
        async fn fetch(&self, _url: &str, _dest: &Path) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct NoopTranscoder;

    #[async_trait]
    impl Transcoder for NoopTranscoder {
        async fn to_wav(&self, _input: &Path, _output: &Path) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct NoopSpeech;

    #[async_trait]
    impl SpeechBackend for NoopSpeech {
        async fn recognize(
            &self,
            _audio: Vec<u8>,
            _locale: &str,
        ) -> crate::error::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    fn catalog() -> MessageCatalog {
        let en: HashMap<String, String> = [
            ("not_authorized", "Sorry, you are not authorized."),
            ("invalid_language", "That language is not supported."),
            ("language_set", "Language updated."),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        MessageCatalog::from_maps(vec![(Language::En, en)], Language::En)
    }

    fn state() -> AppState {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"

            [telegram.whitelist]
            enabled = true
            users = [100]
            admin_id = 999

            [speech]
            api_key = "sk-test"
        "#,
        )
        .unwrap();
        AppState::new(
            config,
            catalog(),
            LogControl::disabled(),
            Collaborators {
                fetcher: Arc::new(NoopFetcher),
                transcoder: Arc::new(NoopTranscoder),
                speech: Arc::new(NoopSpeech),
                proofreading: None,
            },
        )
    }

    fn text_event(sender: Option<u64>, kind: ChatKind) -> InboundEvent {
        InboundEvent {
            sender,
            chat_id: 1,
            chat_kind: kind,
            payload: EventPayload::Text("hello".to_string()),
            reply_to_text: None,
        }
    }

    #[tokio::test]
    async fn test_unauthorized_sender_gets_notice_and_no_handler_runs() {
        let state = state();
        let transport = RecordingTransport::new();
        dispatch(&state, &transport, text_event(Some(555), ChatKind::Direct)).await;
        assert_eq!(
            transport.replies().await,
            vec!["Sorry, you are not authorized.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_sender_gets_notice() {
        let state = state();
        let transport = RecordingTransport::new();
        dispatch(&state, &transport, text_event(None, ChatKind::Direct)).await;
        assert_eq!(
            transport.replies().await,
            vec!["Sorry, you are not authorized.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_group_non_command_is_fully_silent() {
        let state = state();
        let transport = RecordingTransport::new();
        dispatch(&state, &transport, text_event(Some(100), ChatKind::Group)).await;
        assert!(transport.replies().await.is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_becomes_localized_notice() {
        let state = state();
        let transport = RecordingTransport::new();
        let event = InboundEvent {
            sender: Some(100),
            chat_id: 1,
            chat_kind: ChatKind::Direct,
            payload: EventPayload::Command {
                name: "language".to_string(),
                args: "klingon".to_string(),
            },
            reply_to_text: None,
        };
        dispatch(&state, &transport, event).await;
        assert_eq!(
            transport.replies().await,
            vec!["That language is not supported.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_plain_text_in_direct_chat_is_ignored() {
        let state = state();
        let transport = RecordingTransport::new();
        dispatch(&state, &transport, text_event(Some(100), ChatKind::Direct)).await;
        assert!(transport.replies().await.is_empty());
    }
}
