//! World Collaborators
//!
//! The quest engine never spawns, renders or collides anything itself. It
//! talks to the host game through the traits below. `SimulatedWorld` is an
//! in-memory host used by the server binary and the tests.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::quest::{MarkerConfig, Tag};

// ============================================================================
// Shared value types
// ============================================================================

/// World-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// World-space rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Handle to an actor owned by the host world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque player/controller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Spawns and looks up world actors
pub trait ActorSpawner {
    fn spawn_actor(&mut self, template: &str, position: Vec3, rotation: Rotator) -> Option<ActorId>;

    /// Find a pre-placed actor carrying this reference tag
    fn find_tagged_actor(&self, tag: &Tag) -> Option<ActorId>;
}

/// Shows and hides objective markers on actors
pub trait MarkerDisplay {
    fn show_marker(&mut self, actor: ActorId, marker: &MarkerConfig);
    fn hide_marker(&mut self, actor: ActorId);
}

/// Placed location trigger volumes
pub trait LocationTriggers {
    fn location_triggers(&self) -> Vec<(ActorId, Tag)>;
}

/// Connected players
pub trait PlayerRoster {
    fn player_count(&self) -> usize;
}

/// Actors that change behaviour while they are relevant to a quest
pub trait QuestReactive {
    fn set_tag(&mut self, tag: &Tag);

    /// Single entry point for switching quest behaviour on or off.
    /// `reset` is true when the switch-off comes from a quest reset.
    fn set_quest_active(&mut self, active: bool, reset: bool);
}

/// Everything the quest engine needs from the host game
pub trait QuestWorld: ActorSpawner + MarkerDisplay + LocationTriggers + PlayerRoster {
    /// Quest-reactive capability of an actor, if it has one
    fn reactive(&mut self, actor: ActorId) -> Option<&mut dyn QuestReactive>;
}

// ============================================================================
// Simulated world
// ============================================================================

/// An actor tracked by the simulated world
#[derive(Debug, Clone)]
pub struct SimActor {
    pub template: String,
    pub position: Vec3,
    pub rotation: Rotator,
    /// Reference tag of a pre-placed actor
    pub reference: Option<Tag>,
    /// Entity tag assigned by a quest
    pub tag: Option<Tag>,
    /// Location tag for trigger volumes
    pub location: Option<Tag>,
    pub marker: Option<MarkerConfig>,
    pub quest_active: bool,
    /// Number of quest on/off notifications received
    pub notifications: u32,
}

impl SimActor {
    fn new(template: &str, position: Vec3, rotation: Rotator) -> Self {
        Self {
            template: template.to_string(),
            position,
            rotation,
            reference: None,
            tag: None,
            location: None,
            marker: None,
            quest_active: false,
            notifications: 0,
        }
    }

    pub fn marker_visible(&self) -> bool {
        self.marker.is_some()
    }
}

impl QuestReactive for SimActor {
    fn set_tag(&mut self, tag: &Tag) {
        self.tag = Some(tag.clone());
    }

    fn set_quest_active(&mut self, active: bool, _reset: bool) {
        self.quest_active = active;
        self.notifications += 1;
    }
}

/// In-memory host world
#[derive(Debug, Default)]
pub struct SimulatedWorld {
    actors: HashMap<ActorId, SimActor>,
    /// Spawn order, for inspection
    spawned: Vec<ActorId>,
    players: Vec<PlayerId>,
}

impl SimulatedWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a location trigger volume
    pub fn place_trigger(&mut self, location: Tag, position: Vec3) -> ActorId {
        let id = ActorId::new_v4();
        let mut actor = SimActor::new("LocationTrigger", position, Rotator::default());
        actor.location = Some(location);
        self.actors.insert(id, actor);
        id
    }

    /// Place an actor that quests can bind to by reference tag
    pub fn place_actor(&mut self, template: &str, tag: Tag, position: Vec3) -> ActorId {
        let id = ActorId::new_v4();
        let mut actor = SimActor::new(template, position, Rotator::default());
        actor.reference = Some(tag);
        self.actors.insert(id, actor);
        id
    }

    pub fn add_player(&mut self, player: PlayerId) {
        if !self.players.contains(&player) {
            self.players.push(player);
        }
    }

    pub fn remove_player(&mut self, player: &PlayerId) {
        self.players.retain(|p| p != player);
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn actor(&self, id: ActorId) -> Option<&SimActor> {
        self.actors.get(&id)
    }

    /// Actors spawned at runtime, in spawn order
    pub fn spawned(&self) -> impl Iterator<Item = (ActorId, &SimActor)> {
        self.spawned
            .iter()
            .filter_map(|id| self.actors.get(id).map(|actor| (*id, actor)))
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.len()
    }

    /// Actors currently showing a marker
    pub fn visible_markers(&self) -> usize {
        self.actors.values().filter(|a| a.marker_visible()).count()
    }
}

impl ActorSpawner for SimulatedWorld {
    fn spawn_actor(
        &mut self,
        template: &str,
        position: Vec3,
        rotation: Rotator,
    ) -> Option<ActorId> {
        let id = ActorId::new_v4();
        self.actors.insert(id, SimActor::new(template, position, rotation));
        self.spawned.push(id);
        debug!("Spawned {} ({}) at ({}, {}, {})", template, id, position.x, position.y, position.z);
        Some(id)
    }

    fn find_tagged_actor(&self, tag: &Tag) -> Option<ActorId> {
        self.actors
            .iter()
            .filter(|(_, actor)| actor.reference.as_ref() == Some(tag))
            .map(|(id, _)| *id)
            .min()
    }
}

impl MarkerDisplay for SimulatedWorld {
    fn show_marker(&mut self, actor: ActorId, marker: &MarkerConfig) {
        if let Some(actor) = self.actors.get_mut(&actor) {
            actor.marker = Some(marker.clone());
        }
    }

    fn hide_marker(&mut self, actor: ActorId) {
        if let Some(actor) = self.actors.get_mut(&actor) {
            actor.marker = None;
        }
    }
}

impl LocationTriggers for SimulatedWorld {
    fn location_triggers(&self) -> Vec<(ActorId, Tag)> {
        let mut triggers: Vec<_> = self
            .actors
            .iter()
            .filter_map(|(id, actor)| actor.location.clone().map(|tag| (*id, tag)))
            .collect();
        triggers.sort();
        triggers
    }
}

impl PlayerRoster for SimulatedWorld {
    fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl QuestWorld for SimulatedWorld {
    fn reactive(&mut self, actor: ActorId) -> Option<&mut dyn QuestReactive> {
        self.actors
            .get_mut(&actor)
            .map(|actor| actor as &mut dyn QuestReactive)
    }
}
