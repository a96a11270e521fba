use super::{AgentAdapter, prompts};
use async_trait::async_trait;
use cg_core::{
    AgentKind, ConversationTurn, SessionStore, SpeechToText, TextGenerator, TextToSpeech,
};
use config::ConversationConfig;
use errors::{AgentError, ValidationError, VoiceError};
use gateway::Gateway;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::Instant;

static BLOCKED_TOPICS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\b(?:violence|hate|abuse|illegal|drugs|terror|exploit|self-harm|suicide|kill|murder|bomb)\b",
        r"(?i)\b(?:credit card|password|ssn|social security|bank account)\b",
        r"(?i)\b(?:sexual|porn|nude|explicit)\b",
        r"(?i)\b(?:hack|malware|phishing|ransomware)\b"
    ])
    .unwrap()
});

static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:-]{1,128}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub contract_context: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceReply {
    pub session_id: String,
    pub transcript: String,
    pub reply: String,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>
}

/// Several questions answered in one upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchChatRequest {
    pub session_id: String,
    pub questions: Vec<String>,
    #[serde(default)]
    pub contract_context: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchChatReply {
    pub session_id: String,
    pub reply: String,
    pub questions_processed: usize
}

pub const MAX_BATCH_QUESTIONS: usize = 10;

pub fn validate_session_id(session_id: &str) -> Result<(), ValidationError> {
    if SESSION_ID.is_match(session_id) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "session_id",
            "must be 1-128 characters of letters, digits, '_', '-', '.' or ':'"
        ))
    }
}

/// Follow-up assistant with per-session history and optional voice.
pub struct ConversationAgent {
    gateway: Arc<Gateway>,
    generator: Arc<dyn TextGenerator>,
    sessions: Arc<dyn SessionStore>,
    speech_to_text: Option<Arc<dyn SpeechToText>>,
    text_to_speech: Option<Arc<dyn TextToSpeech>>,
    history_turns: usize,
    max_message_chars: usize,
    reply_timeout: Duration
}

impl ConversationAgent {
    pub fn new(
        config: &ConversationConfig,
        gateway: Arc<Gateway>,
        generator: Arc<dyn TextGenerator>,
        sessions: Arc<dyn SessionStore>
    ) -> Self {
        Self {
            gateway,
            generator,
            sessions,
            speech_to_text: None,
            text_to_speech: None,
            history_turns: config.history_turns,
            max_message_chars: config.max_message_chars,
            reply_timeout: config.reply_timeout()
        }
    }

    pub fn with_voice(
        mut self,
        speech_to_text: Option<Arc<dyn SpeechToText>>,
        text_to_speech: Option<Arc<dyn TextToSpeech>>
    ) -> Self {
        self.speech_to_text = speech_to_text;
        self.text_to_speech = text_to_speech;
        self
    }

    /// Rejects empty, oversized or disallowed messages.
    pub fn check_message(&self, message: &str) -> Result<(), ValidationError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::new("message", "must not be empty"));
        }
        if message.chars().count() > self.max_message_chars {
            return Err(ValidationError::new(
                "message",
                format!("longer than {} characters", self.max_message_chars)
            ));
        }
        if BLOCKED_TOPICS.is_match(message) {
            return Err(ValidationError::new(
                "message",
                "blocked by moderation: disallowed content detected"
            ));
        }
        Ok(())
    }

    pub async fn reply(&self, request: ChatRequest) -> Result<ChatReply, AgentError> {
        let deadline = Instant::now() + self.reply_timeout;
        self.run(request, deadline).await
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<ConversationTurn>, AgentError> {
        validate_session_id(session_id)?;
        Ok(self.sessions.get(session_id).await?)
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), AgentError> {
        validate_session_id(session_id)?;
        self.sessions.clear(session_id).await?;
        tracing::info!(session_id, "Conversation history cleared");
        Ok(())
    }

    /// Answers all `questions` with a single upstream call. The exchange is
    /// stored as one user turn and one assistant turn.
    pub async fn batch_reply(&self, request: BatchChatRequest) -> Result<BatchChatReply, AgentError> {
        validate_session_id(&request.session_id)?;
        if request.questions.is_empty() {
            return Err(ValidationError::new("questions", "no questions provided").into());
        }
        if request.questions.len() > MAX_BATCH_QUESTIONS {
            return Err(ValidationError::new(
                "questions",
                format!("at most {} questions per batch", MAX_BATCH_QUESTIONS)
            )
            .into());
        }
        for question in &request.questions {
            self.check_message(question)?;
        }

        let numbered = request
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("Q{}: {}", i + 1, q.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let message = format!("Batch questions:\n{}", numbered);

        let deadline = Instant::now() + self.reply_timeout;
        let reply = self
            .exchange(
                &request.session_id,
                &message,
                request.contract_context.as_deref(),
                deadline
            )
            .await?;

        tracing::info!(
            session_id = %request.session_id,
            questions = request.questions.len(),
            "Batch questions answered"
        );
        Ok(BatchChatReply {
            session_id: request.session_id,
            reply,
            questions_processed: request.questions.len()
        })
    }

    /// Answers a text message and speaks the answer when a synthesizer is
    /// configured. Without one, or when synthesis fails, the reply is text only.
    pub async fn spoken_reply(&self, request: ChatRequest) -> Result<VoiceReply, AgentError> {
        let transcript = request.message.trim().to_string();
        let reply = self.reply(request).await?;
        let audio = self.speak(&reply).await;

        Ok(VoiceReply {
            session_id: reply.session_id,
            transcript,
            reply: reply.reply,
            audio
        })
    }

    /// Transcribes `audio`, then answers it like [`Self::spoken_reply`].
    pub async fn voice_reply(
        &self,
        session_id: &str,
        audio: &[u8],
        contract_context: Option<String>
    ) -> Result<VoiceReply, AgentError> {
        let stt = self
            .speech_to_text
            .as_ref()
            .ok_or_else(|| VoiceError::NotConfigured {
                provider: "speech-to-text".to_string()
            })?;

        let transcript = stt.transcribe(audio).await?;
        if transcript.trim().is_empty() {
            return Err(VoiceError::Transcription {
                reason: "transcription returned no text".to_string()
            }
            .into());
        }

        self.spoken_reply(ChatRequest {
            session_id: session_id.to_string(),
            message: transcript,
            contract_context
        })
        .await
    }

    async fn speak(&self, reply: &ChatReply) -> Option<Vec<u8>> {
        let tts = self.text_to_speech.as_ref()?;
        match tts.synthesize(&reply.reply).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(
                    session_id = %reply.session_id,
                    error = %err,
                    "Speech synthesis failed, replying with text only"
                );
                None
            }
        }
    }

    /// One gated upstream call; both turns are stored only when it succeeds.
    async fn exchange(
        &self,
        session_id: &str,
        message: &str,
        contract_context: Option<&str>,
        deadline: Instant
    ) -> Result<String, AgentError> {
        let history = self.sessions.get(session_id).await?;
        let recent = &history[history.len().saturating_sub(self.history_turns)..];
        let prompt = prompts::conversation(message, recent, contract_context);

        let reply = self
            .gateway
            .execute(deadline, || self.generator.generate(&prompt))
            .await?;
        let reply = reply.trim().to_string();

        self.sessions
            .append(session_id, ConversationTurn::user(message))
            .await?;
        self.sessions
            .append(session_id, ConversationTurn::assistant(reply.clone()))
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl AgentAdapter for ConversationAgent {
    type Request = ChatRequest;
    type Output = ChatReply;

    fn kind(&self) -> AgentKind {
        AgentKind::Conversation
    }

    async fn run(&self, request: ChatRequest, deadline: Instant) -> Result<ChatReply, AgentError> {
        validate_session_id(&request.session_id)?;
        self.check_message(&request.message)?;

        let reply = self
            .exchange(
                &request.session_id,
                request.message.trim(),
                request.contract_context.as_deref(),
                deadline
            )
            .await?;

        Ok(ChatReply {
            session_id: request.session_id,
            reply
        })
    }
}
