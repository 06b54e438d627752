//! Utterance transcription for voice capture
//!
//! One recorded utterance goes up as WAV and comes back as the command text
//! placed in the transcript buffer.

use reqwest::{RequestBuilder, Url};
use serde::Deserialize;

use crate::{Error, Result};

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

#[derive(Deserialize)]
struct WhisperReply {
    text: String,
}

#[derive(Deserialize)]
struct DeepgramReply {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Hosted recognizer used for captured utterances
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    Whisper,
    /// Deepgram
    Deepgram,
}

impl std::str::FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Client for the configured recognizer
#[derive(Debug, Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Recognizer for `language`, a BCP-47 tag such as `en-IN`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty
    pub fn new(
        provider: SttProvider,
        api_key: String,
        model: String,
        language: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{provider:?} key required to transcribe voice commands"
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider,
        })
    }

    /// Turn one WAV utterance into command text
    ///
    /// Returns an empty string when nothing intelligible was heard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the service rejects the audio, or an
    /// HTTP error if it cannot be reached
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(provider = ?self.provider, bytes = wav.len(), "transcribing utterance");

        let response = self.request(wav)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = ?self.provider, status = %status, "transcription rejected");
            return Err(Error::Capture(format!(
                "{:?} returned {status}: {body}",
                self.provider
            )));
        }

        let text = match self.provider {
            SttProvider::Whisper => response.json::<WhisperReply>().await?.text,
            SttProvider::Deepgram => best_alternative(response.json::<DeepgramReply>().await?),
        };
        let text = text.trim().to_string();

        tracing::info!(transcript = %text, "utterance transcribed");
        Ok(text)
    }

    fn request(&self, wav: &[u8]) -> Result<RequestBuilder> {
        match self.provider {
            SttProvider::Whisper => {
                let file = reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Capture(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .part("file", file)
                    .text("model", self.model.clone())
                    .text("language", self.whisper_language().to_string());

                Ok(self.client.post(WHISPER_URL).bearer_auth(&self.api_key).multipart(form))
            }
            SttProvider::Deepgram => Ok(self
                .client
                .post(self.deepgram_url()?)
                .header("Authorization", format!("Token {}", self.api_key))
                .header("Content-Type", "audio/wav")
                .body(wav.to_vec())),
        }
    }

    /// Whisper takes an ISO-639-1 code, so `en-IN` becomes `en`
    fn whisper_language(&self) -> &str {
        self.language.split(['-', '_']).next().unwrap_or("en")
    }

    fn deepgram_url(&self) -> Result<Url> {
        let mut url = Url::parse(DEEPGRAM_URL).map_err(|e| Error::Config(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("model", &self.model)
            .append_pair("language", &self.language)
            .append_pair("punctuate", "true");
        Ok(url)
    }
}

fn best_alternative(reply: DeepgramReply) -> String {
    reply
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default()
}
