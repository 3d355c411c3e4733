//! Infrastructure for Parley.
//!
//! Implements the ports defined in `parley-core`: an HTTP
//! [`TextGenerator`](parley_core::generation::TextGenerator) for
//! OpenAI-compatible and Ollama-native endpoints, an append-only file
//! [`TranscriptLog`](parley_core::conversation::TranscriptLog), and the
//! loaders for `parley.toml`, scene files, and lexicon overrides.

pub mod config;
pub mod generation;
pub mod scene;
pub mod transcript_log;
