//! Single-flight gate in front of the generation service.
//!
//! Every generation call in the process (agent conversations and player
//! chat alike) goes through one `GenerationGate`. The gate holds an async
//! mutex across the whole call, so at most one request is in flight and
//! callers are served in arrival order. Failures never propagate: they
//! are recorded against the health monitor and surface as `None`.

use std::sync::Arc;
use std::time::Instant;

use parley_types::error::GenerationError;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info_span, warn};

use super::box_generator::BoxTextGenerator;
use super::health::HealthMonitor;
use super::provider::GenerationRequest;

pub struct GenerationGate {
    generator: BoxTextGenerator,
    health: Arc<HealthMonitor>,
    in_flight: Mutex<()>,
}

impl GenerationGate {
    pub fn new(generator: BoxTextGenerator, health: Arc<HealthMonitor>) -> Self {
        Self {
            generator,
            health,
            in_flight: Mutex::new(()),
        }
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Whether the service is flagged as degraded right now.
    pub fn is_degraded(&self) -> bool {
        self.health.is_degraded()
    }

    /// Generate text for a prompt pair.
    ///
    /// Returns `None` when the service is paused, when the call fails, or
    /// when nothing is left after removing reasoning blocks.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Option<String> {
        let _slot = self.in_flight.lock().await;

        if !self.health.try_acquire() {
            debug!(error = %GenerationError::Paused, "skipping generation call");
            return None;
        }

        let request = GenerationRequest::new(system_prompt, user_prompt, max_tokens);
        let span = info_span!(
            "gen_ai.generate",
            gen_ai.system = self.generator.name(),
            gen_ai.request.model = self.generator.model(),
            gen_ai.request.max_tokens = max_tokens,
        );

        let started = Instant::now();
        let result = self.generator.generate(&request).instrument(span).await;

        match result {
            Ok(raw) => {
                let text = strip_reasoning(&raw);
                if text.is_empty() {
                    self.health.record_failure(&GenerationError::EmptyResponse);
                    warn!("generation returned no usable text");
                    None
                } else {
                    self.health.record_success(started.elapsed());
                    Some(text)
                }
            }
            Err(e) => {
                self.health.record_failure(&e);
                warn!(error = %e, "generation call failed");
                None
            }
        }
    }
}

/// Remove `<think>...</think>` blocks and trim. An unclosed block drops
/// everything after its opening tag.
pub fn strip_reasoning(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => rest = &after_open[end + CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
