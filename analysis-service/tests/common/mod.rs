#![allow(dead_code)]

use adapters::{InMemorySessionStore, PlainTextExtractor};
use analysis_service::{AgentCollaborators, AppState};
use cg_core::{SpeechToText, TextToSpeech};
use config::Config;
use errors::UpstreamError;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use testing::ScriptedGenerator;

static PROMPT_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"CLAUSE_(\d+):").unwrap());

pub const SUMMARY_REPLY: &str = "This contract is mostly fair but watch the indemnity.";
pub const SIMULATION_REPLY: &str = "Renegotiating the indemnity would lower the risk.";
pub const TRANSLATION_REPLY: &str =
    "Aperçu du contrat:\nContrat de fourniture.\nRecommandations:\nNégocier l'indemnité.";
pub const CHAT_REPLY: &str = "Clause 3 makes you pay for the supplier's losses.";

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.batch.max_items_per_batch = 4;
    config
}

pub fn app_state(config: &Config, generator: Arc<ScriptedGenerator>) -> AppState {
    app_state_with_voice(config, generator, None, None)
}

pub fn app_state_with_voice(
    config: &Config,
    generator: Arc<ScriptedGenerator>,
    speech_to_text: Option<Arc<dyn SpeechToText>>,
    text_to_speech: Option<Arc<dyn TextToSpeech>>
) -> AppState {
    AppState::new(
        config,
        AgentCollaborators {
            generator,
            sessions: Arc::new(InMemorySessionStore::from_config(&config.conversation)),
            speech_to_text,
            text_to_speech
        },
        Arc::new(PlainTextExtractor::from_config(&config.pipeline))
    )
}

pub fn clause_numbers(prompt: &str) -> Vec<usize> {
    PROMPT_LABEL
        .captures_iter(prompt)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

pub fn is_risk_prompt(prompt: &str) -> bool {
    PROMPT_LABEL.is_match(prompt)
}

/// Answers every clause of a risk prompt with `level`, except clause 3,
/// which is always High.
pub fn risk_reply(prompt: &str, level: &str) -> String {
    clause_numbers(prompt)
        .into_iter()
        .map(|n| {
            let level = if n == 3 { "High" } else { level };
            format!(
                "CLAUSE_{}_ANALYSIS: {{\"risk_level\": \"{}\", \"analysis\": \"Clause {} reviewed.\"}}\n",
                n, level, n
            )
        })
        .collect()
}

/// Canned answers for every prompt the agents send.
pub fn healthy_reply(prompt: &str) -> Result<String, UpstreamError> {
    if is_risk_prompt(prompt) {
        Ok(risk_reply(prompt, "Low"))
    } else if prompt.contains("negotiation expert") {
        Ok(SIMULATION_REPLY.to_string())
    } else if prompt.contains("translator") {
        Ok(TRANSLATION_REPLY.to_string())
    } else if prompt.contains("User message:") {
        Ok(CHAT_REPLY.to_string())
    } else {
        Ok(SUMMARY_REPLY.to_string())
    }
}

pub fn healthy_generator() -> Arc<ScriptedGenerator> {
    Arc::new(ScriptedGenerator::responding(healthy_reply))
}
