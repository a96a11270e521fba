pub mod conversation;
pub mod prompts;
pub mod risk;
pub mod simulation;
pub mod summary;
pub mod translation;

use async_trait::async_trait;
use cg_core::{AgentKind, SessionStore, SpeechToText, TextGenerator, TextToSpeech};
use config::Config;
use errors::AgentError;
use gateway::Gateway;
use std::sync::Arc;
use tokio::time::Instant;

pub use conversation::{
    BatchChatReply, BatchChatRequest, ChatReply, ChatRequest, ConversationAgent, VoiceReply
};
pub use risk::{ClauseReport, RiskAnalysisAgent, RiskReport};
pub use simulation::{RiskDistribution, SafetyIndex, SimulationAgent, SimulationReport};
pub use summary::SummarizationAgent;
pub use translation::{TranslationAgent, TranslationRequest, TranslationResult};

/// A capability that turns a domain request into upstream calls through
/// the shared [`Gateway`] and parses the answer into a typed result.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    type Request: Send + 'static;
    type Output: Send;

    fn kind(&self) -> AgentKind;

    async fn run(&self, request: Self::Request, deadline: Instant) -> Result<Self::Output, AgentError>;
}

/// The upstream and voice collaborators agents are built on.
pub struct AgentCollaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub sessions: Arc<dyn SessionStore>,
    pub speech_to_text: Option<Arc<dyn SpeechToText>>,
    pub text_to_speech: Option<Arc<dyn TextToSpeech>>
}

/// One instance of every agent, all sharing one gateway.
pub struct Agents {
    pub risk: RiskAnalysisAgent,
    pub summary: SummarizationAgent,
    pub translation: TranslationAgent,
    pub simulation: SimulationAgent,
    pub conversation: ConversationAgent
}

impl Agents {
    pub fn new(config: &Config, gateway: Arc<Gateway>, collaborators: AgentCollaborators) -> Self {
        let AgentCollaborators {
            generator,
            sessions,
            speech_to_text,
            text_to_speech
        } = collaborators;

        Self {
            risk: RiskAnalysisAgent::new(
                gateway.clone(),
                generator.clone(),
                config.batch.max_clause_chars
            ),
            summary: SummarizationAgent::new(gateway.clone(), generator.clone()),
            translation: TranslationAgent::new(
                gateway.clone(),
                generator.clone(),
                config.upstream.max_prompt_chars / 2
            ),
            simulation: SimulationAgent::new(gateway.clone(), generator.clone()),
            conversation: ConversationAgent::new(&config.conversation, gateway, generator, sessions)
                .with_voice(speech_to_text, text_to_speech)
        }
    }
}
