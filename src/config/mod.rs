//! Configuration management for voicebill
//!
//! Values resolve `env > toml > default`. [`Config::from_sources`] does the
//! layering against an injected environment lookup; [`Config::load`] wires it
//! to the real config file and process environment.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::capture::CaptureLimits;
use crate::voice::SttProvider;
use crate::{Error, Result};

use file::ConfigFile;

/// Default billing server
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// voicebill configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Billing server connection
    pub server: ServerConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Where downloaded bills are written (`~/.local/share/voicebill`)
    pub data_dir: PathBuf,
}

/// Billing server connection
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL for `/process-command`, `/download-bill` and `/api/*`
    pub url: String,

    /// Bound on every request, including the interpreter round trip
    pub request_timeout: Duration,

    /// Refresh dashboard data after every applied command
    pub dashboard_refresh: bool,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone capture and spoken feedback
    pub enabled: bool,

    /// Recognition language tag
    pub language: String,

    /// Speech-to-text backend
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// How long to wait for speech to begin
    pub listen_timeout: Duration,

    /// Longest utterance recorded
    pub phrase_limit: Duration,
}

impl VoiceConfig {
    /// Utterance bounds for the microphone adapter
    #[must_use]
    pub const fn capture_limits(&self) -> CaptureLimits {
        CaptureLimits {
            listen_timeout: self.listen_timeout,
            phrase_limit: self.phrase_limit,
        }
    }
}

/// API keys for speech services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` key (Whisper STT and TTS)
    pub openai: Option<String>,

    /// Deepgram key
    pub deepgram: Option<String>,
}

impl ApiKeys {
    /// Key for the chosen STT backend
    #[must_use]
    pub fn stt_key(&self, provider: SttProvider) -> Option<&str> {
        match provider {
            SttProvider::Whisper => self.openai.as_deref(),
            SttProvider::Deepgram => self.deepgram.as_deref(),
        }
    }
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_sources(fc, |key| std::env::var(key).ok())?;

        // Ensure data dir exists
        std::fs::create_dir_all(&config.data_dir).ok();

        Ok(config)
    }

    /// Layer `env` over `fc` over defaults
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the timeout is zero or a value fails to
    /// parse
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let request_timeout_secs = match env("VOICEBILL_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("VOICEBILL_TIMEOUT_SECS: {e}")))?,
            None => fc.server.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if request_timeout_secs == 0 {
            return Err(Error::Config("request timeout must be greater than zero".to_string()));
        }

        let dashboard_refresh = match env("VOICEBILL_DASHBOARD_REFRESH") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| Error::Config(format!("VOICEBILL_DASHBOARD_REFRESH: '{raw}'")))?,
            None => fc.server.dashboard_refresh.unwrap_or(true),
        };

        let server = ServerConfig {
            url: env("VOICEBILL_SERVER_URL")
                .or(fc.server.url)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            dashboard_refresh,
        };

        let stt_provider = fc
            .voice
            .stt_provider
            .as_deref()
            .map_or(Ok(SttProvider::Whisper), str::parse)?;

        let default_stt_model = match stt_provider {
            SttProvider::Whisper => "whisper-1",
            SttProvider::Deepgram => "nova-2",
        };

        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(true),
            language: env("VOICEBILL_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or_else(|| "en-IN".to_string()),
            stt_provider,
            stt_model: env("VOICEBILL_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| default_stt_model.to_string()),
            tts_model: env("VOICEBILL_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: fc.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0).clamp(0.25, 4.0),
            listen_timeout: Duration::from_secs(fc.voice.listen_timeout_secs.unwrap_or(5)),
            phrase_limit: Duration::from_secs(fc.voice.phrase_limit_secs.unwrap_or(8)),
        };

        let api_keys = ApiKeys {
            openai: non_empty(env("OPENAI_API_KEY").or(fc.api_keys.openai)),
            deepgram: non_empty(env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram)),
        };

        // ~/.local/share/voicebill on Linux
        let data_dir = directories::BaseDirs::new()
            .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("voicebill"));

        Ok(Self {
            server,
            voice,
            api_keys,
            data_dir,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(ConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert_eq!(config.server.request_timeout, Duration::from_secs(20));
        assert!(config.server.dashboard_refresh);
        assert_eq!(config.voice.language, "en-IN");
        assert_eq!(config.voice.stt_provider, SttProvider::Whisper);
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = ConfigFile::parse(
            "[server]\nurl = \"http://file:8000\"\nrequest_timeout_secs = 7\n",
        )
        .unwrap();
        let config = Config::from_sources(
            fc,
            env_from(&[("VOICEBILL_SERVER_URL", "http://env:9000")]),
        )
        .unwrap();

        assert_eq!(config.server.url, "http://env:9000");
        assert_eq!(config.server.request_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_sources(
            ConfigFile::default(),
            env_from(&[("VOICEBILL_TIMEOUT_SECS", "0")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_dashboard_flag_rejected() {
        let result = Config::from_sources(
            ConfigFile::default(),
            env_from(&[("VOICEBILL_DASHBOARD_REFRESH", "maybe")]),
        );
        assert!(result.is_err());

        let config = Config::from_sources(
            ConfigFile::default(),
            env_from(&[("VOICEBILL_DASHBOARD_REFRESH", "off")]),
        )
        .unwrap();
        assert!(!config.server.dashboard_refresh);
    }

    #[test]
    fn test_deepgram_provider_selects_key_and_model() {
        let fc = ConfigFile::parse(
            "[voice]\nstt_provider = \"deepgram\"\n[api_keys]\ndeepgram = \"dg\"\nopenai = \"\"\n",
        )
        .unwrap();
        let config = Config::from_sources(fc, env_from(&[])).unwrap();

        assert_eq!(config.voice.stt_provider, SttProvider::Deepgram);
        assert_eq!(config.voice.stt_model, "nova-2");
        assert_eq!(config.api_keys.stt_key(SttProvider::Deepgram), Some("dg"));
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_unknown_stt_provider_rejected() {
        let fc = ConfigFile::parse("[voice]\nstt_provider = \"vosk\"\n").unwrap();
        assert!(Config::from_sources(fc, env_from(&[])).is_err());
    }
}
