//! Read-only world context and runtime switches.
//!
//! The conversation engine never simulates weather, tasks, or deaths. It
//! asks a `WorldContext` for them when deciding admission, hazards, and
//! prompt content.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use parley_types::agent::AgentId;
use serde::{Deserialize, Serialize};

/// Context providers consulted by the engine.
pub trait WorldContext: Send + Sync {
    /// Simulated hour of day, `[0, 24)`.
    fn hour(&self) -> f64;

    /// Survival day, starting at 1.
    fn day(&self) -> u32;

    fn is_raining(&self) -> bool;

    fn is_outdoor(&self, scene: &str) -> bool;

    /// What the agent is currently assigned to do.
    fn task_description(&self, _agent: &AgentId) -> Option<String> {
        None
    }

    /// Names of recently deceased agents this agent mourns.
    fn grief(&self, _agent: &AgentId) -> Vec<String> {
        Vec::new()
    }

    fn death_summary(&self) -> Option<String> {
        None
    }

    fn urgency_summary(&self) -> Option<String> {
        None
    }

    fn survival_summary(&self) -> Option<String> {
        None
    }

    fn past_life_hint(&self) -> Option<String> {
        None
    }
}

/// Plain-data world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSnapshot {
    pub hour: f64,
    pub day: u32,
    pub raining: bool,
    pub outdoor_scenes: HashSet<String>,
    pub tasks: HashMap<AgentId, String>,
    pub grief: HashMap<AgentId, Vec<String>>,
    pub death_summary: Option<String>,
    pub urgency: Option<String>,
    pub survival: Option<String>,
    pub past_life_hint: Option<String>,
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            hour: 8.0,
            day: 1,
            raining: false,
            outdoor_scenes: HashSet::new(),
            tasks: HashMap::new(),
            grief: HashMap::new(),
            death_summary: None,
            urgency: None,
            survival: None,
            past_life_hint: None,
        }
    }
}

impl WorldSnapshot {
    /// Advance the clock, rolling over into the next day at midnight.
    pub fn advance_minutes(&mut self, minutes: f64) {
        self.hour += minutes / 60.0;
        while self.hour >= 24.0 {
            self.hour -= 24.0;
            self.day += 1;
        }
    }
}

impl WorldContext for WorldSnapshot {
    fn hour(&self) -> f64 {
        self.hour
    }

    fn day(&self) -> u32 {
        self.day
    }

    fn is_raining(&self) -> bool {
        self.raining
    }

    fn is_outdoor(&self, scene: &str) -> bool {
        self.outdoor_scenes.contains(scene)
    }

    fn task_description(&self, agent: &AgentId) -> Option<String> {
        self.tasks.get(agent).cloned()
    }

    fn grief(&self, agent: &AgentId) -> Vec<String> {
        self.grief.get(agent).cloned().unwrap_or_default()
    }

    fn death_summary(&self) -> Option<String> {
        self.death_summary.clone()
    }

    fn urgency_summary(&self) -> Option<String> {
        self.urgency.clone()
    }

    fn survival_summary(&self) -> Option<String> {
        self.survival.clone()
    }

    fn past_life_hint(&self) -> Option<String> {
        self.past_life_hint.clone()
    }
}

/// A `WorldSnapshot` that a driver mutates while the engine reads it.
#[derive(Debug, Default)]
pub struct SharedWorld {
    inner: RwLock<WorldSnapshot>,
}

impl SharedWorld {
    pub fn new(snapshot: WorldSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut WorldSnapshot) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn read<R>(&self, f: impl FnOnce(&WorldSnapshot) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl WorldContext for SharedWorld {
    fn hour(&self) -> f64 {
        self.read(|w| w.hour)
    }

    fn day(&self) -> u32 {
        self.read(|w| w.day)
    }

    fn is_raining(&self) -> bool {
        self.read(|w| w.raining)
    }

    fn is_outdoor(&self, scene: &str) -> bool {
        self.read(|w| w.is_outdoor(scene))
    }

    fn task_description(&self, agent: &AgentId) -> Option<String> {
        self.read(|w| w.task_description(agent))
    }

    fn grief(&self, agent: &AgentId) -> Vec<String> {
        self.read(|w| WorldContext::grief(w, agent))
    }

    fn death_summary(&self) -> Option<String> {
        self.read(|w| w.death_summary.clone())
    }

    fn urgency_summary(&self) -> Option<String> {
        self.read(|w| w.urgency.clone())
    }

    fn survival_summary(&self) -> Option<String> {
        self.read(|w| w.survival.clone())
    }

    fn past_life_hint(&self) -> Option<String> {
        self.read(|w| w.past_life_hint.clone())
    }
}

/// Runtime switches shared between the driver and the engine.
#[derive(Debug)]
pub struct Switches {
    chat_enabled: AtomicBool,
}

impl Switches {
    pub fn new(chat_enabled: bool) -> Self {
        Self {
            chat_enabled: AtomicBool::new(chat_enabled),
        }
    }

    pub fn chat_enabled(&self) -> bool {
        self.chat_enabled.load(Ordering::Relaxed)
    }

    pub fn set_chat_enabled(&self, enabled: bool) {
        self.chat_enabled.store(enabled, Ordering::Relaxed);
    }
}

impl Default for Switches {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_rolls_over_midnight() {
        let mut world = WorldSnapshot {
            hour: 23.5,
            ..Default::default()
        };
        world.advance_minutes(45.0);
        assert_eq!(world.day, 2);
        assert!((world.hour - 0.25).abs() < 1e-9);
    }

    #[test]
    fn shared_world_reflects_updates() {
        let world = SharedWorld::new(WorldSnapshot::default());
        assert!(!world.is_raining());
        world.update(|w| {
            w.raining = true;
            w.outdoor_scenes.insert("yard".to_string());
        });
        assert!(world.is_raining());
        assert!(world.is_outdoor("yard"));
        assert!(!world.is_outdoor("cabin"));
    }

    #[test]
    fn snapshot_deserializes_partial_toml() {
        let world: WorldSnapshot = toml::from_str(
            r#"
            hour = 21.0
            outdoor_scenes = ["yard"]
            "#,
        )
        .unwrap();
        assert_eq!(world.day, 1);
        assert!(world.is_outdoor("yard"));
    }

    #[test]
    fn switches_toggle() {
        let switches = Switches::default();
        assert!(switches.chat_enabled());
        switches.set_chat_enabled(false);
        assert!(!switches.chat_enabled());
    }
}
