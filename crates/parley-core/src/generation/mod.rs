//! Text generation abstractions for Parley.
//!
//! - `TextGenerator`: RPITIT trait for concrete generation backends
//! - `BoxTextGenerator`: object-safe wrapper for dynamic dispatch
//! - `ServiceHealth` / `HealthMonitor`: failure tracking and the degraded flag
//! - `GenerationGate`: the single-flight front door every caller goes through

pub mod box_generator;
pub mod gate;
pub mod health;
pub mod provider;

pub use box_generator::BoxTextGenerator;
pub use gate::GenerationGate;
pub use health::{HealthMonitor, ServiceHealth};
pub use provider::{GenerationRequest, TextGenerator};
