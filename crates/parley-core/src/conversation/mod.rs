//! Agent-to-agent and player conversations.
//!
//! - `registry`: admission rules and the `Chatting` transition
//! - `scheduler`: single-active FIFO with liveness sweeps
//! - `turn`: the per-line generation loop for one conversation
//! - `player`: the player chat session
//! - `lines`: topics, fallbacks, and end-marker handling
//! - `log`: the transcript persistence port

pub mod lines;
pub mod log;
pub mod player;
pub mod registry;
pub mod scheduler;
pub mod turn;

pub use log::{TranscriptEntry, TranscriptLog};
pub use player::{PlayerChat, PlayerChatSession, PlayerReply};
pub use registry::{ConversationRegistry, Rejection};
pub use scheduler::{ConversationScheduler, TickReport};
pub use turn::TurnEngine;
