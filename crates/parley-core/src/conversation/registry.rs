//! Admission control for agent-to-agent conversations.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use parley_types::agent::{AgentId, ConversationState};
use parley_types::config::ConversationPolicy;
use parley_types::conversation::ConversationRequest;
use tracing::debug;

use crate::roster::AgentRoster;
use crate::world::{Switches, WorldContext};

/// Why a conversation was not started. A normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    ChatDisabled,
    SameAgent,
    UnknownAgent(AgentId),
    AlreadyChatting(AgentId),
    Bedtime(AgentId),
    NotCoLocated,
    OutdoorWeather,
    /// A participant already has a request in the queue.
    AlreadyQueued,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ChatDisabled => write!(f, "agent chat is disabled"),
            Rejection::SameAgent => write!(f, "an agent cannot talk to itself"),
            Rejection::UnknownAgent(id) => write!(f, "agent '{id}' not found"),
            Rejection::AlreadyChatting(id) => write!(f, "agent '{id}' is already chatting"),
            Rejection::Bedtime(id) => write!(f, "agent '{id}' is past bedtime"),
            Rejection::NotCoLocated => write!(f, "agents are not in the same scene"),
            Rejection::OutdoorWeather => write!(f, "too wet to talk outdoors"),
            Rejection::AlreadyQueued => write!(f, "a participant is already queued"),
        }
    }
}

/// Decides whether two agents may start talking and, if so, engages them.
pub struct ConversationRegistry {
    roster: Arc<AgentRoster>,
    world: Arc<dyn WorldContext>,
    switches: Arc<Switches>,
    policy: ConversationPolicy,
}

impl ConversationRegistry {
    pub fn new(
        roster: Arc<AgentRoster>,
        world: Arc<dyn WorldContext>,
        switches: Arc<Switches>,
        policy: ConversationPolicy,
    ) -> Self {
        Self {
            roster,
            world,
            switches,
            policy,
        }
    }

    /// Check admission and, on success, freeze both agents, mark them
    /// `Chatting`, and stamp the pairwise chat cooldown.
    ///
    /// Checks and mutation happen under both agents' locks, so two
    /// concurrent attempts cannot both claim the same agent.
    pub fn try_start(
        &self,
        a: &AgentId,
        b: &AgentId,
        now: Instant,
    ) -> Result<ConversationRequest, Rejection> {
        if !self.switches.chat_enabled() {
            return Err(Rejection::ChatDisabled);
        }
        if a == b {
            return Err(Rejection::SameAgent);
        }
        for id in [a, b] {
            if !self.roster.contains(id) {
                return Err(Rejection::UnknownAgent(id.clone()));
            }
        }

        let hour = self.world.hour();
        let raining = self.world.is_raining();
        let stamped_at = Utc::now();

        let admitted = self
            .roster
            .update_pair(a, b, |agent_a, agent_b| {
                for agent in [&*agent_a, &*agent_b] {
                    if agent.is_chatting() {
                        return Err(Rejection::AlreadyChatting(agent.id.clone()));
                    }
                }
                for agent in [&*agent_a, &*agent_b] {
                    if agent.is_bedtime(hour) {
                        return Err(Rejection::Bedtime(agent.id.clone()));
                    }
                }
                if agent_a.scene != agent_b.scene {
                    return Err(Rejection::NotCoLocated);
                }
                if raining
                    && (self.world.is_outdoor(&agent_a.scene)
                        || self.world.is_outdoor(&agent_b.scene))
                {
                    return Err(Rejection::OutdoorWeather);
                }

                for (me, other) in [(&mut *agent_a, &b), (&mut *agent_b, &a)] {
                    me.freeze_movement();
                    me.state = ConversationState::Chatting;
                    me.chat_cooldowns.insert((*other).clone(), stamped_at);
                }
                agent_a.state_desc = format!("talking with {}", agent_b.name);
                agent_b.state_desc = format!("talking with {}", agent_a.name);
                Ok(())
            })
            // Removed between the membership check and the lock.
            .unwrap_or_else(|| Err(Rejection::UnknownAgent(a.clone())));

        match admitted {
            Ok(()) => {
                let request =
                    ConversationRequest::new(a.clone(), b.clone(), self.policy.max_turns, now);
                debug!(conversation_id = %request.id, a = %a, b = %b, "conversation admitted");
                Ok(request)
            }
            Err(rejection) => {
                debug!(a = %a, b = %b, reason = %rejection, "conversation rejected");
                Err(rejection)
            }
        }
    }

    /// Whether `a` started a conversation with `b` within `window` of `now`.
    pub fn recently_chatted(
        &self,
        a: &AgentId,
        b: &AgentId,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> bool {
        self.roster
            .read(a, |agent| {
                agent
                    .chat_cooldowns
                    .get(b)
                    .is_some_and(|at| now.signed_duration_since(*at) < window)
            })
            .unwrap_or(false)
    }

    pub fn policy(&self) -> &ConversationPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use parley_types::agent::Agent;

    use super::*;
    use crate::world::SharedWorld;

    struct Fixture {
        roster: Arc<AgentRoster>,
        world: Arc<SharedWorld>,
        switches: Arc<Switches>,
        registry: ConversationRegistry,
    }

    fn fixture() -> Fixture {
        let roster = Arc::new(AgentRoster::from_agents([
            Agent::new("ada", "Ada", "cabin"),
            Agent::new("bo", "Bo", "cabin"),
            Agent::new("cy", "Cy", "yard"),
            Agent::new("di", "Di", "yard"),
        ]));
        let world = Arc::new(SharedWorld::default());
        world.update(|w| {
            w.hour = 10.0;
            w.outdoor_scenes.insert("yard".to_string());
        });
        let switches = Arc::new(Switches::default());
        let registry = ConversationRegistry::new(
            Arc::clone(&roster),
            world.clone(),
            Arc::clone(&switches),
            ConversationPolicy::default(),
        );
        Fixture {
            roster,
            world,
            switches,
            registry,
        }
    }

    fn id(s: &str) -> AgentId {
        AgentId::from(s)
    }

    #[test]
    fn accepted_request_engages_both_agents() {
        let f = fixture();
        f.roster.update(&id("ada"), |a| {
            a.movement.is_moving = true;
            a.movement.path = vec![(1, 2)];
        });

        let request = f.registry.try_start(&id("ada"), &id("bo"), Instant::now()).unwrap();
        assert_eq!(request.max_turns, 20);

        let ada = f.roster.snapshot(&id("ada")).unwrap();
        let bo = f.roster.snapshot(&id("bo")).unwrap();
        assert!(ada.is_chatting() && bo.is_chatting());
        assert!(ada.movement.is_frozen());
        assert!(ada.chat_cooldowns.contains_key(&id("bo")));
        assert!(bo.chat_cooldowns.contains_key(&id("ada")));
        assert!(f.registry.recently_chatted(&id("ada"), &id("bo"), Utc::now(), TimeDelta::seconds(60)));
    }

    #[test]
    fn rejects_busy_agent() {
        let f = fixture();
        f.registry.try_start(&id("ada"), &id("bo"), Instant::now()).unwrap();
        f.roster.update(&id("cy"), |c| c.scene = "cabin".to_string());
        assert_eq!(
            f.registry.try_start(&id("cy"), &id("ada"), Instant::now()).unwrap_err(),
            Rejection::AlreadyChatting(id("ada"))
        );
        assert!(!f.roster.is_chatting(&id("cy")));
    }

    #[test]
    fn rejects_when_disabled_same_or_unknown() {
        let f = fixture();
        assert_eq!(
            f.registry.try_start(&id("ada"), &id("ada"), Instant::now()).unwrap_err(),
            Rejection::SameAgent
        );
        assert_eq!(
            f.registry.try_start(&id("ada"), &id("zed"), Instant::now()).unwrap_err(),
            Rejection::UnknownAgent(id("zed"))
        );
        f.switches.set_chat_enabled(false);
        assert_eq!(
            f.registry.try_start(&id("ada"), &id("bo"), Instant::now()).unwrap_err(),
            Rejection::ChatDisabled
        );
    }

    #[test]
    fn rejects_separated_agents() {
        let f = fixture();
        assert_eq!(
            f.registry.try_start(&id("ada"), &id("cy"), Instant::now()).unwrap_err(),
            Rejection::NotCoLocated
        );
    }

    #[test]
    fn rejects_past_bedtime() {
        let f = fixture();
        f.world.update(|w| w.hour = 23.5);
        assert_eq!(
            f.registry.try_start(&id("ada"), &id("bo"), Instant::now()).unwrap_err(),
            Rejection::Bedtime(id("ada"))
        );
    }

    #[test]
    fn rain_blocks_outdoor_conversations_only() {
        let f = fixture();
        f.world.update(|w| w.raining = true);
        assert_eq!(
            f.registry.try_start(&id("cy"), &id("di"), Instant::now()).unwrap_err(),
            Rejection::OutdoorWeather
        );
        assert!(f.registry.try_start(&id("ada"), &id("bo"), Instant::now()).is_ok());
    }

    #[test]
    fn recently_chatted_respects_window() {
        let f = fixture();
        f.registry.try_start(&id("ada"), &id("bo"), Instant::now()).unwrap();
        let later = Utc::now() + TimeDelta::minutes(5);
        assert!(!f.registry.recently_chatted(&id("ada"), &id("bo"), later, TimeDelta::seconds(60)));
        assert!(!f.registry.recently_chatted(&id("ada"), &id("cy"), Utc::now(), TimeDelta::seconds(60)));
    }
}
