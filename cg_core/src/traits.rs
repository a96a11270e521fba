//! Collaborator traits for the contract analysis gateway

use crate::types::ConversationTurn;
use async_trait::async_trait;
use errors::{ExtractionError, SessionError, UpstreamError, VoiceError};

/// The single upstream text-generation operation.
///
/// One call to `generate` is exactly one upstream invocation; admission
/// control, retry and circuit breaking are applied by the caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Turns an uploaded document into an ordered list of clause strings.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract_clauses(&self, document: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Conversation history keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the turns of a session in insertion order; unknown sessions are
    /// empty, not an error.
    async fn get(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SessionError>;

    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), SessionError>;

    async fn clear(&self, session_id: &str) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError>;
}
