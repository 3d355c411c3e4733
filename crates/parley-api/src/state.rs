//! Application state wiring the engine together.
//!
//! `AppState` owns the shared pieces (roster, world, generation gate, event
//! bus) and builds the scheduler and player chat on top of them.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parley_core::conversation::{ConversationRegistry, ConversationScheduler, PlayerChat, TurnEngine};
use parley_core::event::EventBus;
use parley_core::generation::{BoxTextGenerator, GenerationGate, HealthMonitor};
use parley_core::roster::AgentRoster;
use parley_core::sentiment::LexiconScorer;
use parley_core::world::{SharedWorld, Switches};
use parley_infra::config::{load_config, load_lexicon};
use parley_infra::generation::HttpGenerator;
use parley_infra::scene::load_scene;
use parley_infra::transcript_log::FileTranscriptLog;
use parley_types::config::{ConversationPolicy, ParleyConfig};

/// Lexicon override looked up next to the config file.
const LEXICON_FILE: &str = "lexicon.toml";

/// Shared application state used by the CLI commands.
pub struct AppState {
    pub config: ParleyConfig,
    pub policy: ConversationPolicy,
    pub roster: Arc<AgentRoster>,
    pub world: Arc<SharedWorld>,
    pub switches: Arc<Switches>,
    pub gate: Arc<GenerationGate>,
    pub bus: EventBus,
}

impl AppState {
    /// Load config and scene, then wire the generator, gate, and bus.
    pub async fn init(config_path: &Path, scene_path: &Path) -> anyhow::Result<Self> {
        let config = load_config(config_path).await;
        let scene = load_scene(scene_path)
            .await
            .with_context(|| format!("failed to load scene {}", scene_path.display()))?;
        anyhow::ensure!(!scene.agents.is_empty(), "scene {} has no agents", scene_path.display());

        let generator = HttpGenerator::new(&config.generation)
            .context("failed to create the generation client")?;
        tracing::info!(
            base_url = %config.generation.base_url,
            model = %config.generation.model,
            agents = scene.agents.len(),
            "engine initialized"
        );

        let health = Arc::new(HealthMonitor::new(&config.health));
        let gate = Arc::new(GenerationGate::new(BoxTextGenerator::new(generator), health));

        Ok(Self {
            policy: config.conversation.policy(),
            switches: Arc::new(Switches::new(config.conversation.chat_enabled)),
            roster: Arc::new(AgentRoster::from_agents(scene.agents)),
            world: Arc::new(SharedWorld::new(scene.world)),
            gate,
            bus: EventBus::default(),
            config,
        })
    }

    /// Build the agent-to-agent scheduler, with the transcript file if one
    /// is configured.
    pub async fn scheduler(&self, config_path: &Path) -> anyhow::Result<ConversationScheduler> {
        let lexicon_path = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(LEXICON_FILE);
        let lexicon = load_lexicon(&lexicon_path).await;
        let scorer = LexiconScorer::new(&lexicon).context("invalid conflict pattern in lexicon")?;

        let registry = ConversationRegistry::new(
            Arc::clone(&self.roster),
            self.world.clone(),
            Arc::clone(&self.switches),
            self.policy.clone(),
        );
        let engine = TurnEngine::new(
            Arc::clone(&self.roster),
            self.world.clone(),
            Arc::clone(&self.gate),
            self.bus.clone(),
            self.policy.clone(),
        );
        let scheduler = ConversationScheduler::new(
            registry,
            engine,
            Arc::clone(&self.roster),
            self.world.clone(),
            self.bus.clone(),
            Arc::new(scorer),
        );

        Ok(match &self.config.log.transcript_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "appending transcripts");
                scheduler.with_transcript_log(Arc::new(FileTranscriptLog::new(path.clone())))
            }
            None => scheduler,
        })
    }

    pub fn player_chat(&self) -> PlayerChat {
        PlayerChat::new(
            Arc::clone(&self.roster),
            self.world.clone(),
            Arc::clone(&self.gate),
            self.bus.clone(),
            self.policy.clone(),
        )
    }
}
