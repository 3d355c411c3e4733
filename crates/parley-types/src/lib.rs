//! Shared domain types for Parley.
//!
//! This crate contains the data shapes used across the conversation engine:
//! agents, conversation requests and transcripts, events, sentiment scores,
//! configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod sentiment;
