//! # Adapters
//!
//! Concrete implementations of the collaborator traits in `cg_core`.

pub mod extraction;
pub mod generation;
pub mod session;
pub mod speech;

pub use extraction::PlainTextExtractor;
pub use generation::HttpTextGenerator;
pub use session::InMemorySessionStore;
pub use speech::{HttpSpeechSynthesizer, clean_for_speech};
