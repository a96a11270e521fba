//! # Contract Gateway Core
//!
//! Shared types and traits for the contract analysis system.
//!
//! This crate provides:
//! - Domain types for clauses, risk assessments and conversation turns
//! - Collaborator traits for the upstream text-generation service, document
//!   extraction, session history and voice providers
//!
//! Nothing here performs I/O; concrete collaborators live in `adapters` and
//! test doubles in `testing`.

pub mod traits;
pub mod types;

pub use traits::{DocumentExtractor, SessionStore, SpeechToText, TextGenerator, TextToSpeech};
pub use types::{
    AgentKind, AssessmentSource, ClauseAssessment, ConversationTurn, RiskLevel, TurnRole
};
