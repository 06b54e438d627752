//! TOML configuration file loading
//!
//! Reads `~/.config/voicebill/config.toml`. Every field is optional and the
//! file only overlays the built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Billing server settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Voice input and output
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for speech services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Billing server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Base URL of the command interpreter and billing endpoints
    pub url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Refresh the dashboard after every applied command
    pub dashboard_refresh: Option<bool>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub enabled: Option<bool>,

    /// Recognition language tag (e.g. "en-IN")
    pub language: Option<String>,

    /// "whisper" or "deepgram"
    pub stt_provider: Option<String>,

    pub stt_model: Option<String>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_speed: Option<f64>,

    /// Seconds to wait for speech to begin
    pub listen_timeout_secs: Option<u64>,

    /// Longest utterance in seconds
    pub phrase_limit_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

impl ConfigFile {
    /// Parse a config file from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid TOML for this schema
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse the file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match ConfigFile::read(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voicebill/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicebill").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let fc = ConfigFile::parse(
            r#"
            [server]
            url = "http://shop.local:8000"

            [voice]
            tts_speed = 1.25
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.url.as_deref(), Some("http://shop.local:8000"));
        assert!(fc.server.request_timeout_secs.is_none());
        assert_eq!(fc.voice.tts_speed, Some(1.25));
        assert!(fc.api_keys.openai.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let fc = ConfigFile::parse("").unwrap();
        assert!(fc.server.url.is_none());
        assert!(fc.voice.enabled.is_none());
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        assert!(ConfigFile::parse("[server]\nrequest_timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api_keys]\nopenai = \"sk-test\"\n").unwrap();

        let fc = ConfigFile::read(&path).unwrap();
        assert_eq!(fc.api_keys.openai.as_deref(), Some("sk-test"));
    }
}
