//! Event bus for conversation lifecycle events.
//!
//! Provides an `EventBus` that distributes `ConversationEvent` messages to
//! all subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
