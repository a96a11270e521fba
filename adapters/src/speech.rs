use async_trait::async_trait;
use cg_core::TextToSpeech;
use config::VoiceConfig;
use errors::VoiceError;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.*?)`").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strips markdown so a synthesizer reads prose, not markup.
pub fn clean_for_speech(text: &str) -> String {
    let text = CODE_BLOCK.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: VoiceSettings
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32
}

/// Text-to-speech client. Calls bypass the gateway; failures surface as
/// [`VoiceError`] and never affect quota or circuit state.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    voice_id: Option<String>,
    api_key: Option<String>
}

impl HttpSpeechSynthesizer {
    pub fn new(config: &VoiceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.tts_endpoint.trim_end_matches('/').to_string(),
            voice_id: config.voice_id.clone(),
            api_key: config.api_key.clone()
        })
    }

    pub fn is_configured(&self) -> bool {
        self.voice_id.is_some() && self.api_key.is_some()
    }
}

#[async_trait]
impl TextToSpeech for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        let (Some(voice_id), Some(api_key)) = (&self.voice_id, &self.api_key) else {
            return Err(VoiceError::NotConfigured {
                provider: "text-to-speech".to_string()
            });
        };

        let clean = clean_for_speech(text);
        if clean.is_empty() {
            return Err(VoiceError::Synthesis {
                reason: "no speakable text after cleaning".to_string()
            });
        }

        let request = SynthesisRequest {
            text: &clean,
            model_id: "eleven_monolingual_v1",
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.5
            }
        };

        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, voice_id))
            .header("xi-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis {
                reason: e.to_string()
            })?;

        if !response.status().is_success() {
            return Err(VoiceError::Synthesis {
                reason: format!("Status: {}", response.status())
            });
        }

        let audio = response.bytes().await.map_err(|e| VoiceError::Synthesis {
            reason: e.to_string()
        })?;
        tracing::debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_for_speech_strips_markdown() {
        let text = "## Summary\n**Bold** and *soft* with `code`\n- first item\n1. numbered\nSee [docs](http://x.y)";
        assert_eq!(
            clean_for_speech(text),
            "Summary Bold and soft with code first item numbered See docs"
        );
    }

    #[test]
    fn test_clean_for_speech_drops_code_blocks() {
        assert_eq!(clean_for_speech("Before ```let x = 1;``` after"), "Before after");
    }

    #[tokio::test]
    async fn test_unconfigured_synthesizer() {
        let synthesizer = HttpSpeechSynthesizer::new(&VoiceConfig::default()).unwrap();
        assert!(!synthesizer.is_configured());
        let err = synthesizer.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, VoiceError::NotConfigured { .. }));
    }
}
