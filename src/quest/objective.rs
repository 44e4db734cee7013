//! Live Quest Objectives
//!
//! One `Objective` per step of a live quest. The type-specific data and
//! counters live in `ObjectiveKind`; completion, the all-players gate and
//! the activation side effects are handled here.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, warn};

use super::definition::{
    ActorSpawn, MarkerConfig, ObjectiveDefinition, ObjectiveSpec, QuestId, Rewards, SpawnBatch,
    StepIndex, Tag,
};
use super::events::QuestEvent;
use crate::world::{ActorId, PlayerId, QuestWorld, Rotator, Vec3};

/// Type tag of an objective, without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveType {
    GoTo,
    TalkWith,
    Kill,
    Gather,
    Catch,
}

impl ObjectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveType::GoTo => "go_to",
            ObjectiveType::TalkWith => "talk_with",
            ObjectiveType::Kill => "kill",
            ObjectiveType::Gather => "gather",
            ObjectiveType::Catch => "catch",
        }
    }
}

/// Type-specific target and progress of a live objective
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveKind {
    GoTo {
        place: Tag,
    },
    TalkWith {
        entity: Tag,
        spawn: Option<ActorSpawn>,
    },
    Kill {
        entity: Tag,
        amount: u32,
        killed: u32,
        spawn: Option<SpawnBatch>,
    },
    Gather {
        item: Tag,
        amount: f32,
        gathered: f32,
    },
    Catch {
        allowed: Vec<Tag>,
        amount: u32,
        caught: u32,
    },
}

impl ObjectiveKind {
    fn from_spec(spec: &ObjectiveSpec) -> Self {
        match spec {
            ObjectiveSpec::GoTo { place } => ObjectiveKind::GoTo {
                place: place.clone(),
            },
            ObjectiveSpec::TalkWith { entity, spawn } => ObjectiveKind::TalkWith {
                entity: entity.clone(),
                spawn: spawn.clone(),
            },
            ObjectiveSpec::Kill { entity, amount, spawn } => ObjectiveKind::Kill {
                entity: entity.clone(),
                amount: *amount,
                killed: 0,
                spawn: spawn.clone(),
            },
            ObjectiveSpec::Gather { item, amount } => ObjectiveKind::Gather {
                item: item.clone(),
                amount: *amount,
                gathered: 0.0,
            },
            ObjectiveSpec::Catch { allowed, amount } => ObjectiveKind::Catch {
                allowed: allowed.clone(),
                amount: *amount,
                caught: 0,
            },
        }
    }

    pub fn objective_type(&self) -> ObjectiveType {
        match self {
            ObjectiveKind::GoTo { .. } => ObjectiveType::GoTo,
            ObjectiveKind::TalkWith { .. } => ObjectiveType::TalkWith,
            ObjectiveKind::Kill { .. } => ObjectiveType::Kill,
            ObjectiveKind::Gather { .. } => ObjectiveType::Gather,
            ObjectiveKind::Catch { .. } => ObjectiveType::Catch,
        }
    }
}

/// Current/target progress of an objective, for notifications and UI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub current: f32,
    pub target: f32,
}

/// What feeding one event did to an objective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event did not match, or repeated a trigger already counted
    Unchanged,
    Progressed,
    Completed,
}

impl Applied {
    pub fn is_completed(self) -> bool {
        self == Applied::Completed
    }
}

/// A live objective owned by its quest
#[derive(Debug, Clone)]
pub struct Objective {
    pub step: StepIndex,
    pub quest_id: QuestId,
    pub description: String,
    pub actor_reference: Option<Tag>,
    pub requires_all_players: bool,
    pub rewards: Rewards,
    pub marker: MarkerConfig,
    pub kind: ObjectiveKind,
    completed: bool,
    completed_by: BTreeSet<PlayerId>,
    /// Players the gate waited for at the last matching event
    players_needed: usize,
    associated: Vec<ActorId>,
}

impl Objective {
    /// Deep-copy a template into a fresh, incomplete objective
    pub fn from_definition(quest_id: QuestId, def: &ObjectiveDefinition) -> Self {
        Self {
            step: def.step,
            quest_id,
            description: def.description.clone(),
            actor_reference: def.actor_reference.clone(),
            requires_all_players: def.requires_all_players,
            rewards: def.rewards.clone(),
            marker: def.marker.clone(),
            kind: ObjectiveKind::from_spec(&def.spec),
            completed: false,
            completed_by: BTreeSet::new(),
            players_needed: 1,
            associated: Vec::new(),
        }
    }

    pub fn objective_type(&self) -> ObjectiveType {
        self.kind.objective_type()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Players that have triggered completion so far (all-players gate)
    pub fn completed_by(&self) -> &BTreeSet<PlayerId> {
        &self.completed_by
    }

    /// Actors bound to this objective
    pub fn associated_actors(&self) -> &[ActorId] {
        &self.associated
    }

    /// Counter progress. Gated GoTo/TalkWith report players done out of players needed.
    pub fn progress(&self) -> Progress {
        match &self.kind {
            ObjectiveKind::GoTo { .. } | ObjectiveKind::TalkWith { .. } => {
                let target = if self.requires_all_players {
                    self.players_needed
                } else {
                    1
                };
                let current = if self.completed {
                    target
                } else {
                    self.completed_by.len().min(target)
                };
                Progress {
                    current: current as f32,
                    target: target as f32,
                }
            }
            ObjectiveKind::Kill { amount, killed, .. } => Progress {
                current: *killed as f32,
                target: *amount as f32,
            },
            ObjectiveKind::Gather { amount, gathered, .. } => Progress {
                current: *gathered,
                target: *amount,
            },
            ObjectiveKind::Catch { amount, caught, .. } => Progress {
                current: *caught as f32,
                target: *amount as f32,
            },
        }
    }

    /// Whether this incomplete objective is waiting for `event`
    pub fn matches(&self, event: &QuestEvent) -> bool {
        if self.completed {
            return false;
        }
        match (&self.kind, event) {
            (ObjectiveKind::GoTo { place }, QuestEvent::Arrived { place: arrived, .. }) => {
                place == arrived
            }
            (
                ObjectiveKind::TalkWith { entity, .. },
                QuestEvent::TalkedTo { entity: talked, .. },
            ) => entity == talked,
            (ObjectiveKind::Kill { entity, .. }, QuestEvent::Killed { entity: killed, .. }) => {
                entity == killed
            }
            (ObjectiveKind::Gather { item, .. }, QuestEvent::Gathered { item: gathered, .. }) => {
                item == gathered
            }
            (ObjectiveKind::Catch { allowed, .. }, QuestEvent::Caught { tag, .. }) => {
                allowed.contains(tag)
            }
            _ => false,
        }
    }

    /// Feed an event. Anything but `Unchanged` means state moved.
    pub fn apply(&mut self, event: &QuestEvent, player_count: usize) -> Applied {
        if !self.matches(event) {
            return Applied::Unchanged;
        }
        self.players_needed = player_count.max(1);

        let (counted, threshold_met) = match &mut self.kind {
            ObjectiveKind::GoTo { .. } | ObjectiveKind::TalkWith { .. } => (false, true),
            ObjectiveKind::Kill { amount, killed, .. } => {
                *killed = killed.saturating_add(1);
                (true, *killed >= *amount)
            }
            ObjectiveKind::Gather { amount, gathered, .. } => {
                let quantity = match event {
                    QuestEvent::Gathered { amount: q, .. } if *q > 0.0 => *q,
                    _ => 0.0,
                };
                *gathered += quantity;
                (quantity > 0.0, *gathered >= *amount)
            }
            ObjectiveKind::Catch { amount, caught, .. } => {
                *caught = caught.saturating_add(1);
                (true, *caught >= *amount)
            }
        };

        let recorded = threshold_met && self.record_completion(event.player_id());
        if self.completed {
            Applied::Completed
        } else if counted || recorded {
            Applied::Progressed
        } else {
            Applied::Unchanged
        }
    }

    /// All-players gate. Without the gate the first completion wins.
    /// Returns false for a player that was already counted.
    fn record_completion(&mut self, player: &PlayerId) -> bool {
        if !self.requires_all_players {
            self.completed = true;
            return true;
        }
        let inserted = self.completed_by.insert(player.clone());
        self.completed = self.completed_by.len() >= self.players_needed;
        debug!(
            "Quest {} step {}: {}/{} players done",
            self.quest_id,
            self.step,
            self.completed_by.len(),
            self.players_needed
        );
        inserted
    }

    /// Mark as completed without any event (fast-forward or authority push)
    pub fn set_completed(&mut self) {
        self.completed = true;
    }

    /// Clear completion state and counters
    pub fn reset(&mut self) {
        self.completed = false;
        self.completed_by.clear();
        self.players_needed = 1;
        match &mut self.kind {
            ObjectiveKind::GoTo { .. } | ObjectiveKind::TalkWith { .. } => {}
            ObjectiveKind::Kill { killed, .. } => *killed = 0,
            ObjectiveKind::Gather { gathered, .. } => *gathered = 0.0,
            ObjectiveKind::Catch { caught, .. } => *caught = 0,
        }
    }

    /// Bind or spawn the actors this objective needs and arm their markers
    pub fn activate<R: Rng>(&mut self, world: &mut dyn QuestWorld, rng: &mut R) {
        let reference = self
            .actor_reference
            .as_ref()
            .and_then(|tag| {
                let found = world.find_tagged_actor(tag);
                if found.is_none() {
                    warn!(
                        "Quest {} step {}: no placed actor with reference tag '{}'",
                        self.quest_id, self.step, tag
                    );
                }
                found
            });

        let mut bound = Vec::new();
        match &self.kind {
            ObjectiveKind::GoTo { place } => {
                if let Some(actor) = reference {
                    bound.push(actor);
                }
                bound.extend(
                    world
                        .location_triggers()
                        .into_iter()
                        .filter(|(_, location)| location == place)
                        .map(|(actor, _)| actor),
                );
            }
            ObjectiveKind::TalkWith { entity, spawn } => {
                let actor = reference.or_else(|| {
                    spawn
                        .as_ref()
                        .and_then(|s| world.spawn_actor(&s.template, s.position, s.rotation))
                });
                if let Some(actor) = actor {
                    if let Some(reactive) = world.reactive(actor) {
                        reactive.set_tag(entity);
                    }
                    bound.push(actor);
                }
            }
            ObjectiveKind::Kill { spawn, .. } => {
                if let Some(actor) = reference {
                    bound.push(actor);
                } else if let Some(batch) = spawn {
                    for template in &batch.templates {
                        for _ in 0..batch.count_each {
                            let position = scatter(batch.center, batch.range, rng);
                            let spawned =
                                world.spawn_actor(template, position, Rotator::default());
                            if let Some(actor) = spawned {
                                bound.push(actor);
                            }
                        }
                    }
                }
            }
            ObjectiveKind::Gather { .. } | ObjectiveKind::Catch { .. } => {
                if let Some(actor) = reference {
                    bound.push(actor);
                }
            }
        }

        for actor in bound {
            if !self.associated.contains(&actor) {
                self.associated.push(actor);
            }
        }

        for &actor in &self.associated {
            if let Some(reactive) = world.reactive(actor) {
                reactive.set_quest_active(true, false);
            }
        }
        self.show_markers(world);

        debug!(
            "Activated quest {} step {} ({}) with {} associated actors",
            self.quest_id,
            self.step,
            self.objective_type().as_str(),
            self.associated.len()
        );
    }

    /// Show markers on all associated actors, if this objective wants them
    pub fn show_markers(&self, world: &mut dyn QuestWorld) {
        if !self.marker.create_marker {
            return;
        }
        for &actor in &self.associated {
            world.show_marker(actor, &self.marker);
        }
    }

    /// Hide markers and tell associated actors they are no longer relevant
    pub fn deactivate(&self, world: &mut dyn QuestWorld, reset: bool) {
        for &actor in &self.associated {
            world.hide_marker(actor);
            if let Some(reactive) = world.reactive(actor) {
                reactive.set_quest_active(false, reset);
            }
        }
    }

    /// Drop associated-actor bindings (after a reset)
    pub fn clear_associated(&mut self) {
        self.associated.clear();
    }
}

/// Random X/Y offset within `range` of `center`
fn scatter<R: Rng>(center: Vec3, range: f32, rng: &mut R) -> Vec3 {
    if !range.is_finite() || range <= 0.0 {
        return center;
    }
    Vec3 {
        x: center.x + rng.gen_range(-range..=range),
        y: center.y + rng.gen_range(-range..=range),
        z: center.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::RewardKind;
    use crate::world::SimulatedWorld;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn objective(spec: ObjectiveSpec, all_players: bool) -> Objective {
        let def = ObjectiveDefinition {
            step: 0,
            description: String::new(),
            actor_reference: None,
            requires_all_players: all_players,
            rewards: Rewards::from([(RewardKind::Xp, 10.0)]),
            marker: MarkerConfig {
                create_marker: true,
                ..Default::default()
            },
            spec,
        };
        Objective::from_definition(1, &def)
    }

    fn killed(player: &str, entity: &str) -> QuestEvent {
        QuestEvent::Killed {
            player: PlayerId::new(player),
            entity: Tag::new(entity),
        }
    }

    fn progress(current: f32, target: f32) -> Progress {
        Progress { current, target }
    }

    fn kill_spec(entity: &str, amount: u32) -> ObjectiveSpec {
        ObjectiveSpec::Kill {
            entity: Tag::new(entity),
            amount,
            spawn: None,
        }
    }

    #[test]
    fn test_kill_threshold() {
        let mut obj = objective(kill_spec("Enemy.Slime", 3), false);
        let slime = killed("p1", "Enemy.Slime");

        assert_eq!(obj.apply(&slime, 1), Applied::Progressed);
        assert_eq!(obj.apply(&slime, 1), Applied::Progressed);
        assert!(!obj.is_completed());
        assert_eq!(obj.apply(&slime, 1), Applied::Completed);
        assert_eq!(obj.progress(), progress(3.0, 3.0));

        // Completed objectives no longer match
        assert!(!obj.matches(&slime));
        assert_eq!(obj.apply(&slime, 1), Applied::Unchanged);
    }

    #[test]
    fn test_wrong_tag_does_not_count() {
        let mut obj = objective(kill_spec("Enemy.Slime", 1), false);
        let wolf = killed("p1", "Enemy.Wolf");
        assert_eq!(obj.apply(&wolf, 1), Applied::Unchanged);
        assert_eq!(obj.progress().current, 0.0);
    }

    #[test]
    fn test_gather_below_exact_and_above() {
        let gathered = |amount: f32| QuestEvent::Gathered {
            player: PlayerId::new("p1"),
            item: Tag::new("Item.Herb"),
            amount,
        };
        let spec = ObjectiveSpec::Gather {
            item: Tag::new("Item.Herb"),
            amount: 2.5,
        };

        let mut below = objective(spec.clone(), false);
        assert_eq!(below.apply(&gathered(2.0), 1), Applied::Progressed);
        assert_eq!(below.apply(&gathered(0.0), 1), Applied::Unchanged);

        let mut exact = objective(spec.clone(), false);
        exact.apply(&gathered(1.5), 1);
        assert!(exact.apply(&gathered(1.0), 1).is_completed());

        let mut above = objective(spec, false);
        assert!(above.apply(&gathered(10.0), 1).is_completed());
        assert_eq!(above.progress().current, 10.0);
    }

    #[test]
    fn test_catch_uses_allowed_set() {
        let caught = |tag: &str| QuestEvent::Caught {
            player: PlayerId::new("p1"),
            tag: Tag::new(tag),
        };
        let spec = ObjectiveSpec::Catch {
            allowed: vec![Tag::new("Fish.Bass"), Tag::new("Fish.Trout")],
            amount: 2,
        };
        let mut obj = objective(spec, false);

        assert_eq!(obj.apply(&caught("Fish.Carp"), 1), Applied::Unchanged);
        assert_eq!(obj.apply(&caught("Fish.Bass"), 1), Applied::Progressed);
        assert_eq!(obj.apply(&caught("Fish.Trout"), 1), Applied::Completed);
    }

    #[test]
    fn test_all_players_gate() {
        let arrived = |player: &str| QuestEvent::Arrived {
            player: PlayerId::new(player),
            place: Tag::new("Location.Kanto"),
        };
        let spec = ObjectiveSpec::GoTo {
            place: Tag::new("Location.Kanto"),
        };
        let mut obj = objective(spec, true);

        assert_eq!(obj.apply(&arrived("a"), 3), Applied::Progressed);
        assert_eq!(obj.progress(), progress(1.0, 3.0));

        // A repeat trigger from a counted player changes nothing
        assert_eq!(obj.apply(&arrived("a"), 3), Applied::Unchanged);
        assert_eq!(obj.progress(), progress(1.0, 3.0));

        assert_eq!(obj.apply(&arrived("b"), 3), Applied::Progressed);
        assert_eq!(obj.completed_by().len(), 2);
        assert_eq!(obj.apply(&arrived("c"), 3), Applied::Completed);
        assert_eq!(obj.progress(), progress(3.0, 3.0));

        assert_eq!(obj.apply(&arrived("a"), 3), Applied::Unchanged);
        assert!(obj.is_completed());
        assert_eq!(obj.completed_by().len(), 3);
    }

    #[test]
    fn test_gate_completes_when_roster_shrinks() {
        let talked = |player: &str| QuestEvent::TalkedTo {
            player: PlayerId::new(player),
            entity: Tag::new("Npc.Elder"),
        };
        let spec = ObjectiveSpec::TalkWith {
            entity: Tag::new("Npc.Elder"),
            spawn: None,
        };
        let mut obj = objective(spec, true);

        assert_eq!(obj.apply(&talked("a"), 2), Applied::Progressed);
        assert_eq!(obj.apply(&talked("a"), 1), Applied::Completed);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut obj = objective(kill_spec("Enemy.Slime", 1), true);
        obj.apply(&killed("a", "Enemy.Slime"), 1);
        assert!(obj.is_completed());

        obj.reset();
        let once = (obj.is_completed(), obj.progress(), obj.completed_by().len());
        obj.reset();
        let twice = (obj.is_completed(), obj.progress(), obj.completed_by().len());

        assert_eq!(once, twice);
        assert_eq!(once, (false, progress(0.0, 1.0), 0));
    }

    #[test]
    fn test_scatter_ignores_non_finite_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let center = Vec3::new(10.0, 20.0, 0.0);

        assert_eq!(scatter(center, f32::NAN, &mut rng), center);
        assert_eq!(scatter(center, f32::INFINITY, &mut rng), center);
        assert_eq!(scatter(center, -1.0, &mut rng), center);
    }

    #[test]
    fn test_kill_activation_spawns_batch_within_range() {
        let mut world = SimulatedWorld::new();
        let mut rng = StdRng::seed_from_u64(7);
        let spec = ObjectiveSpec::Kill {
            entity: Tag::new("Enemy.Dinossaur"),
            amount: 2,
            spawn: Some(SpawnBatch {
                templates: vec!["Dinossaur".to_string()],
                count_each: 2,
                center: Vec3::new(100.0, 100.0, 0.0),
                range: 50.0,
            }),
        };
        let mut obj = objective(spec, false);

        obj.activate(&mut world, &mut rng);

        assert_eq!(world.spawned_count(), 2);
        assert_eq!(obj.associated_actors().len(), 2);
        for (_, actor) in world.spawned() {
            assert!((actor.position.x - 100.0).abs() <= 50.0);
            assert!((actor.position.y - 100.0).abs() <= 50.0);
            assert!(actor.marker_visible());
            assert!(actor.quest_active);
        }

        obj.deactivate(&mut world, false);
        assert_eq!(world.visible_markers(), 0);
        for (_, actor) in world.spawned() {
            assert!(!actor.quest_active);
            assert_eq!(actor.notifications, 2);
        }
    }

    #[test]
    fn test_talk_with_binds_reference_instead_of_spawning() {
        let mut world = SimulatedWorld::new();
        let mut rng = StdRng::seed_from_u64(1);
        let elder = world.place_actor("Elder", Tag::new("Reference.Elder"), Vec3::default());

        let spec = ObjectiveSpec::TalkWith {
            entity: Tag::new("Npc.Elder"),
            spawn: Some(ActorSpawn {
                template: "Elder".to_string(),
                position: Vec3::default(),
                rotation: Rotator::default(),
            }),
        };
        let mut obj = objective(spec, false);
        obj.actor_reference = Some(Tag::new("Reference.Elder"));

        obj.activate(&mut world, &mut rng);

        assert_eq!(world.spawned_count(), 0);
        assert_eq!(obj.associated_actors(), &[elder]);
        assert_eq!(world.actor(elder).unwrap().tag, Some(Tag::new("Npc.Elder")));
    }

    #[test]
    fn test_go_to_binds_matching_triggers() {
        let mut world = SimulatedWorld::new();
        let mut rng = StdRng::seed_from_u64(1);
        let kanto = world.place_trigger(Tag::new("Location.Kanto"), Vec3::default());
        world.place_trigger(Tag::new("Location.Johto"), Vec3::default());

        let spec = ObjectiveSpec::GoTo {
            place: Tag::new("Location.Kanto"),
        };
        let mut obj = objective(spec, false);
        obj.activate(&mut world, &mut rng);

        assert_eq!(obj.associated_actors(), &[kanto]);
        assert!(world.actor(kanto).unwrap().marker_visible());
    }
}
