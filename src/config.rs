//! Server Configuration
//!
//! Loaded from `questline.toml`. Every field has a default so a missing file
//! or a partial one still starts a usable server.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::QuestError;
use crate::quest::Tag;
use crate::world::{PlayerId, SimulatedWorld, Vec3};

pub const DEFAULT_CONFIG_PATH: &str = "questline.toml";

/// A location trigger volume placed in the simulated world
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerConfig {
    pub location: Tag,
    #[serde(default)]
    pub position: Vec3,
}

/// A pre-placed actor that objectives and quests can reference by tag
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacedActorConfig {
    pub template: String,
    pub tag: Tag,
    #[serde(default)]
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Root of the data directory (quests live in `<data_dir>/quests`)
    pub data_dir: PathBuf,
    pub tick_interval_ms: u64,
    /// Extra `tracing` directive added to the env filter
    pub log_filter: String,
    /// Seed for spawn offsets; random when absent
    pub rng_seed: Option<u64>,
    pub players: Vec<PlayerId>,
    pub location_triggers: Vec<TriggerConfig>,
    pub placed_actors: Vec<PlacedActorConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tick_interval_ms: 50, // 20 Hz
            log_filter: "questline=info".to_string(),
            rng_seed: None,
            players: vec![PlayerId::new("player1")],
            location_triggers: Vec::new(),
            placed_actors: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, QuestError> {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| QuestError::Load(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_toml(&content)
            .map_err(|e| QuestError::Load(format!("failed to parse {:?}: {}", path, e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Populate a simulated world with the configured players and actors
    pub fn build_world(&self) -> SimulatedWorld {
        let mut world = SimulatedWorld::new();
        for player in &self.players {
            world.add_player(player.clone());
        }
        for trigger in &self.location_triggers {
            world.place_trigger(trigger.location.clone(), trigger.position);
        }
        for actor in &self.placed_actors {
            world.place_actor(&actor.template, actor.tag.clone(), actor.position);
        }
        info!(
            "World ready: {} players, {} triggers, {} placed actors",
            self.players.len(),
            self.location_triggers.len(),
            self.placed_actors.len()
        );
        world
    }
}
