//! Shared test doubles and fixtures for the contract analysis workspace.
//!
//! - [`ScriptedGenerator`]: a text generator that replays a script of
//!   replies and failures, or answers through a prompt-aware responder
//! - [`FakeSpeechToText`] / [`FakeTextToSpeech`]: voice collaborators with
//!   switchable failure
//! - Fixture contracts of known shape

mod doubles;
mod fixtures;

pub use doubles::*;
pub use fixtures::*;
