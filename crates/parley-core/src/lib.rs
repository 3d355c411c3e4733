//! Conversation orchestration for Parley.
//!
//! This crate schedules agent-to-agent conversations through a single
//! worker, drives their turn-taking loop against a shared text generator,
//! and turns finished transcripts into affinity and sanity changes. It
//! defines the ports (`TextGenerator`, `WorldContext`, `TranscriptLog`)
//! that `parley-infra` implements, and depends on no IO crate.

pub mod conversation;
pub mod event;
pub mod generation;
pub mod prompt;
pub mod roster;
pub mod sentiment;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;
