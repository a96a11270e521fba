use async_trait::async_trait;
use cg_core::{SpeechToText, TextGenerator, TextToSpeech};
use errors::{UpstreamError, VoiceError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> Result<String, UpstreamError> + Send + Sync>;

/// Text generator driven by a script.
///
/// Each call pops the next scripted step. Once the script is empty the
/// responder (if any) answers; otherwise the call fails fatally so a test
/// notices an unexpected extra call.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, UpstreamError>>>,
    responder: Option<Responder>,
    latency: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: None,
            latency: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0)
        }
    }

    /// A generator that answers every prompt through `responder`.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, UpstreamError> + Send + Sync + 'static
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// A generator that always returns `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::responding(move |_| Ok(reply.clone()))
    }

    /// A generator that always fails with `error`.
    pub fn failing(error: UpstreamError) -> Self {
        Self::responding(move |_| Err(error.clone()))
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn then_fail(self, error: UpstreamError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(step) => step,
            None => match &self.responder {
                Some(responder) => responder(prompt),
                None => {
                    tracing::warn!("Scripted generator called past the end of its script");
                    Err(UpstreamError::fatal("script exhausted"))
                }
            }
        }
    }
}

/// Speech-to-text fake returning a fixed transcript or a failure.
pub struct FakeSpeechToText {
    transcript: Result<String, VoiceError>
}

impl FakeSpeechToText {
    pub fn returning(transcript: impl Into<String>) -> Self {
        Self {
            transcript: Ok(transcript.into())
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: Err(VoiceError::Transcription {
                reason: "audio could not be decoded".to_string()
            })
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeechToText {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, VoiceError> {
        self.transcript.clone()
    }
}

/// Text-to-speech fake that encodes the text as its "audio".
pub struct FakeTextToSpeech {
    fail: bool,
    calls: AtomicUsize
}

impl FakeTextToSpeech {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeTextToSpeech {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextToSpeech for FakeTextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::Synthesis {
                reason: "provider returned 503".to_string()
            });
        }
        Ok(text.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_responder() {
        let generator = ScriptedGenerator::always("steady")
            .then_fail(UpstreamError::transient("503"))
            .then_reply("first");

        assert!(generator.generate("a").await.is_err());
        assert_eq!(generator.generate("b").await.unwrap(), "first");
        assert_eq!(generator.generate("c").await.unwrap(), "steady");
        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails_fatally() {
        let generator = ScriptedGenerator::new().then_reply("only");
        assert!(generator.generate("a").await.is_ok());
        let err = generator.generate("b").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fake_tts_failure() {
        let tts = FakeTextToSpeech::failing();
        assert!(tts.synthesize("hello").await.is_err());
        assert_eq!(tts.calls(), 1);
    }
}
