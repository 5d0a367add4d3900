use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub speech: SpeechConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub proofreading: ProofreadConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub groups: GroupPolicyConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WhitelistConfig {
    /// When false, every sender is authorized and admin commands are not
    /// registered.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub users: Vec<u64>,
    /// Implicitly authorized and the only id allowed to mutate the set.
    #[serde(default)]
    pub admin_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupPolicyConfig {
    /// Restrict group/supergroup chats to explicit commands.
    #[serde(default = "default_true")]
    pub commands_only: bool,
    #[serde(default = "default_group_commands")]
    pub allowed_commands: Vec<String>,
    /// Drop non-command group messages without a reply.
    #[serde(default = "default_true")]
    pub ignore_non_commands: bool,
}

impl Default for GroupPolicyConfig {
    fn default() -> Self {
        GroupPolicyConfig {
            commands_only: true,
            allowed_commands: default_group_commands(),
            ignore_non_commands: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_max_audio_size")]
    pub max_size_bytes: u64,
    #[serde(default = "default_mime_types")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            max_size_bytes: default_max_audio_size(),
            allowed_mime_types: default_mime_types(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,
    #[serde(default = "default_speech_model")]
    pub model: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProofreadConfig {
    /// The external proofreading stage is enabled iff both fields are set.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
}

impl ProofreadConfig {
    pub fn enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_language_code")]
    pub default_language: String,
    #[serde(default = "default_locales_dir")]
    pub locales_dir: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            default_language: default_language_code(),
            locales_dir: default_locales_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_group_commands() -> Vec<String> {
    vec![
        "start".to_string(),
        "help".to_string(),
        "language".to_string(),
    ]
}

fn default_max_audio_size() -> u64 {
    20 * 1024 * 1024
}

fn default_mime_types() -> Vec<String> {
    vec![
        "audio/ogg".to_string(),
        "audio/mpeg".to_string(),
        "audio/wav".to_string(),
        "audio/mp3".to_string(),
    ]
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_speech_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_speech_model() -> String {
    "whisper-1".to_string()
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_locales_dir() -> PathBuf {
    PathBuf::from("locales")
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!("telegram.bot_token is required");
        }
        if self.speech.api_key.is_empty() {
            anyhow::bail!("speech.api_key is required");
        }
        if self.telegram.whitelist.enabled && self.telegram.whitelist.admin_id == 0 {
            anyhow::bail!("telegram.whitelist.admin_id is required when the whitelist is enabled");
        }
        Ok(())
    }
}
