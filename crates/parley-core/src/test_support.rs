//! Scripted fakes and a wired-up harness for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parley_types::agent::{Agent, AgentId};
use parley_types::config::{ConversationPolicy, HealthConfig};
use parley_types::conversation::ConversationRequest;
use parley_types::error::{GenerationError, TranscriptLogError};

use crate::conversation::log::{TranscriptEntry, TranscriptLog};
use crate::conversation::player::PlayerChat;
use crate::conversation::registry::ConversationRegistry;
use crate::conversation::scheduler::ConversationScheduler;
use crate::conversation::turn::TurnEngine;
use crate::event::EventBus;
use crate::generation::{BoxTextGenerator, GenerationGate, GenerationRequest, HealthMonitor, TextGenerator};
use crate::roster::AgentRoster;
use crate::sentiment::{Lexicon, LexiconScorer};
use crate::world::{SharedWorld, Switches, WorldSnapshot};

pub(crate) fn id(s: &str) -> AgentId {
    AgentId::from(s)
}

type Hook = Box<dyn Fn(usize) + Send + Sync>;

/// Plays back a script of results, then repeats a default reply.
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    repeat: Result<String, GenerationError>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
    on_call: Option<Hook>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Ok("Sounds good.".to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            on_call: None,
        }
    }
}

impl ScriptedGenerator {
    pub(crate) fn failing() -> Self {
        Self {
            repeat: Err(GenerationError::Timeout),
            ..Self::default()
        }
    }

    pub(crate) fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = replies.into_iter().map(|s| Ok(s.into())).collect();
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    pub(crate) fn then_repeat(mut self, reply: impl Into<String>) -> Self {
        self.repeat = Ok(reply.into());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `hook` with the zero-based call index at the start of each call.
    pub(crate) fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub(crate) fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_call {
            hook(n);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .script
            .lock()
            .map(|mut script| script.pop_front())
            .unwrap_or(None);
        next.unwrap_or_else(|| self.repeat.clone())
    }
}

/// Collects entries in memory.
#[derive(Default)]
pub(crate) struct MemoryTranscriptLog {
    pub(crate) entries: Mutex<Vec<TranscriptEntry>>,
}

impl TranscriptLog for MemoryTranscriptLog {
    fn append<'a>(
        &'a self,
        entry: &'a TranscriptEntry,
    ) -> BoxFuture<'a, Result<(), TranscriptLogError>> {
        Box::pin(async move {
            if let Ok(mut entries) = self.entries.lock() {
                entries.push(entry.clone());
            }
            Ok(())
        })
    }
}

/// Always fails to write.
pub(crate) struct BrokenTranscriptLog;

impl TranscriptLog for BrokenTranscriptLog {
    fn append<'a>(
        &'a self,
        _entry: &'a TranscriptEntry,
    ) -> BoxFuture<'a, Result<(), TranscriptLogError>> {
        Box::pin(async {
            Err(TranscriptLogError::Io(std::io::Error::other("disk full")))
        })
    }
}

/// Ada, Bo, Dan and Eve share the cabin; Cy is in the yard (outdoors).
/// 10:00 on day 1.
pub(crate) struct Harness {
    pub(crate) roster: Arc<AgentRoster>,
    pub(crate) world: Arc<SharedWorld>,
    pub(crate) switches: Arc<Switches>,
    pub(crate) health: Arc<HealthMonitor>,
    pub(crate) gate: Arc<GenerationGate>,
    pub(crate) bus: EventBus,
    pub(crate) policy: ConversationPolicy,
    calls: Arc<AtomicUsize>,
}

impl Harness {
    pub(crate) fn new(generator: ScriptedGenerator) -> Self {
        Self::new_with(|_, _| generator)
    }

    pub(crate) fn new_with(
        build: impl FnOnce(&Arc<AgentRoster>, &Arc<SharedWorld>) -> ScriptedGenerator,
    ) -> Self {
        let roster = Arc::new(AgentRoster::from_agents([
            Agent::new("ada", "Ada", "cabin"),
            Agent::new("bo", "Bo", "cabin"),
            Agent::new("cy", "Cy", "yard"),
            Agent::new("dan", "Dan", "cabin"),
            Agent::new("eve", "Eve", "cabin"),
        ]));
        let mut snapshot = WorldSnapshot {
            hour: 10.0,
            ..WorldSnapshot::default()
        };
        snapshot.outdoor_scenes.insert("yard".to_string());
        let world = Arc::new(SharedWorld::new(snapshot));

        let generator = build(&roster, &world);
        let calls = generator.call_counter();
        let health = Arc::new(HealthMonitor::new(&HealthConfig::default()));
        let gate = Arc::new(GenerationGate::new(
            BoxTextGenerator::new(generator),
            Arc::clone(&health),
        ));

        Self {
            roster,
            world,
            switches: Arc::new(Switches::default()),
            health,
            gate,
            bus: EventBus::new(256),
            policy: ConversationPolicy::default(),
            calls,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn engine(&self) -> TurnEngine {
        TurnEngine::new(
            Arc::clone(&self.roster),
            self.world.clone(),
            Arc::clone(&self.gate),
            self.bus.clone(),
            self.policy.clone(),
        )
    }

    pub(crate) fn registry(&self) -> ConversationRegistry {
        ConversationRegistry::new(
            Arc::clone(&self.roster),
            self.world.clone(),
            Arc::clone(&self.switches),
            self.policy.clone(),
        )
    }

    pub(crate) fn player_chat(&self) -> PlayerChat {
        PlayerChat::new(
            Arc::clone(&self.roster),
            self.world.clone(),
            Arc::clone(&self.gate),
            self.bus.clone(),
            self.policy.clone(),
        )
    }

    pub(crate) fn scheduler(&self) -> ConversationScheduler {
        let scorer = LexiconScorer::new(&Lexicon::default()).expect("default lexicon compiles");
        ConversationScheduler::new(
            self.registry(),
            self.engine(),
            Arc::clone(&self.roster),
            self.world.clone(),
            self.bus.clone(),
            Arc::new(scorer),
        )
    }

    /// Admit a conversation, panicking if it is rejected.
    pub(crate) fn engage(&self, a: &str, b: &str) -> ConversationRequest {
        self.registry()
            .try_start(&id(a), &id(b), Instant::now())
            .unwrap_or_else(|r| panic!("rejected: {r}"))
    }
}
