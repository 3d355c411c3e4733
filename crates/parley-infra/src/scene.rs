//! Scene files: the agents and world state a simulation starts from.
//!
//! ```toml
//! [world]
//! hour = 9.0
//! outdoor_scenes = ["yard"]
//!
//! [[agents]]
//! id = "ada"
//! name = "Ada"
//! scene = "cabin"
//! personality = "warm and practical"
//! ```

use std::collections::HashSet;
use std::path::Path;

use parley_core::world::WorldSnapshot;
use parley_types::agent::Agent;
use parley_types::error::ConfigError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub world: WorldSnapshot,
    pub agents: Vec<Agent>,
}

impl SceneFile {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let scene: SceneFile = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut seen = HashSet::new();
        for agent in &scene.agents {
            if !seen.insert(&agent.id) {
                return Err(ConfigError::Parse(format!("duplicate agent id '{}'", agent.id)));
            }
        }
        Ok(scene)
    }
}

/// Read and parse a scene file. Unlike `parley.toml` there is no default
/// scene, so errors propagate.
pub async fn load_scene(path: &Path) -> Result<SceneFile, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
    SceneFile::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const SCENE: &str = r#"
[world]
hour = 14.5
day = 2
outdoor_scenes = ["yard"]

[[agents]]
id = "ada"
name = "Ada"
scene = "cabin"
occupation = "carpenter"

[[agents]]
id = "bo"
name = "Bo"
scene = "yard"
sanity = 25.0
"#;

    #[tokio::test]
    async fn loads_agents_and_world() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scene.toml");
        tokio::fs::write(&path, SCENE).await.unwrap();

        let scene = load_scene(&path).await.unwrap();

        assert_eq!(scene.agents.len(), 2);
        assert_eq!(scene.agents[0].occupation, "carpenter");
        assert_eq!(scene.agents[1].sanity, 25.0);
        assert_eq!(scene.agents[0].sanity, 80.0);
        assert_eq!(scene.world.day, 2);
        assert!(scene.world.outdoor_scenes.contains("yard"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let toml = r#"
[[agents]]
id = "ada"
name = "Ada"
scene = "cabin"

[[agents]]
id = "ada"
name = "Ada Again"
scene = "yard"
"#;
        let err = SceneFile::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate agent id 'ada'"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_scene(&tmp.path().join("nope.toml")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
