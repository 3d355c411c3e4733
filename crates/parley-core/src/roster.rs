//! Shared store of agent records.
//!
//! The roster is the one place the conversation engine reads and mutates
//! agents. Each record sits behind its own mutex inside a `DashMap`, so
//! unrelated agents never contend and pairwise updates can lock two
//! records in a fixed order without ever removing either from the map.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use parley_types::agent::{Agent, AgentId, ConversationState};

type Slot = Arc<Mutex<Agent>>;

#[derive(Debug, Default)]
pub struct AgentRoster {
    agents: DashMap<AgentId, Slot>,
}

fn lock(slot: &Slot) -> MutexGuard<'_, Agent> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        let roster = Self::new();
        for agent in agents {
            roster.insert(agent);
        }
        roster
    }

    /// Insert or replace an agent record.
    pub fn insert(&self, agent: Agent) {
        self.agents
            .insert(agent.id.clone(), Arc::new(Mutex::new(agent)));
    }

    /// Remove an agent (e.g. on death). Returns the last record.
    pub fn remove(&self, id: &AgentId) -> Option<Agent> {
        let (_, slot) = self.agents.remove(id)?;
        let agent = lock(&slot).clone();
        Some(agent)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// All agent ids, sorted for stable iteration.
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn slot(&self, id: &AgentId) -> Option<Slot> {
        self.agents.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Clone of the current record.
    pub fn snapshot(&self, id: &AgentId) -> Option<Agent> {
        self.read(id, Agent::clone)
    }

    pub fn read<R>(&self, id: &AgentId, f: impl FnOnce(&Agent) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let guard = lock(&slot);
        Some(f(&guard))
    }

    pub fn update<R>(&self, id: &AgentId, f: impl FnOnce(&mut Agent) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let mut guard = lock(&slot);
        Some(f(&mut guard))
    }

    /// Mutate two distinct agents together. Locks are taken in id order.
    pub fn update_pair<R>(
        &self,
        a: &AgentId,
        b: &AgentId,
        f: impl FnOnce(&mut Agent, &mut Agent) -> R,
    ) -> Option<R> {
        if a == b {
            return None;
        }
        let slot_a = self.slot(a)?;
        let slot_b = self.slot(b)?;
        if a < b {
            let mut ga = lock(&slot_a);
            let mut gb = lock(&slot_b);
            Some(f(&mut ga, &mut gb))
        } else {
            let mut gb = lock(&slot_b);
            let mut ga = lock(&slot_a);
            Some(f(&mut ga, &mut gb))
        }
    }

    pub fn is_chatting(&self, id: &AgentId) -> bool {
        self.read(id, Agent::is_chatting).unwrap_or(false)
    }

    /// Whether both agents exist and share a scene.
    pub fn co_located(&self, a: &AgentId, b: &AgentId) -> bool {
        let Some(scene_a) = self.read(a, |agent| agent.scene.clone()) else {
            return false;
        };
        self.read(b, |agent| agent.scene == scene_a).unwrap_or(false)
    }

    /// Return an agent to `Idle` and clear its speech bubble. Unknown ids
    /// are ignored.
    pub fn release(&self, id: &AgentId) {
        self.update(id, |agent| {
            agent.state = ConversationState::Idle;
            agent.state_desc.clear();
            agent.speaking = None;
        });
    }

    pub fn set_speaking(&self, id: &AgentId, text: Option<String>) {
        self.update(id, |agent| agent.speaking = text);
    }

    /// Decay affinity cooldowns on every agent.
    pub fn tick_cooldowns(&self, dt_secs: f64) {
        for entry in self.agents.iter() {
            lock(entry.value()).tick_cooldowns(dt_secs);
        }
    }
}
