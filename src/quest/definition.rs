//! Quest Definition Structures
//!
//! Raw rows are deserialized from TOML quest files and resolved into
//! immutable `QuestDefinition` templates. A row that fails validation is
//! rejected on its own; the registry keeps loading the rest.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QuestError;
use crate::world::{Rotator, Vec3};

/// Numeric quest identifier, unique across the registry
pub type QuestId = u32;

/// Step-order index of an objective inside its quest
pub type StepIndex = u32;

/// Gameplay tag (e.g. "Location.Kanto", "Enemy.Dinossaur")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Quest category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    #[default]
    Main,
    Side,
    Errand,
}

/// Kinds of reward handed out by the game when a step or quest completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Xp,
    Gold,
    Skill,
}

/// Reward table: reward kind -> amount
pub type Rewards = BTreeMap<RewardKind, f32>;

/// How a marker should be shown on an objective's associated actors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub create_marker: bool,
    /// Icon asset name handed to the marker display
    pub icon: Option<String>,
    pub show_on_compass: bool,
    pub show_on_screen: bool,
    /// Offset from the actor origin
    pub offset: Vec3,
}

/// A single actor spawned when a TalkWith step activates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpawn {
    /// Actor template name understood by the spawner
    pub template: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Rotator,
}

/// A batch of actors spawned around a point when a Kill step activates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnBatch {
    pub templates: Vec<String>,
    #[serde(default = "default_count_each")]
    pub count_each: u32,
    #[serde(default)]
    pub center: Vec3,
    /// Maximum X/Y offset from `center`
    #[serde(default)]
    pub range: f32,
}

fn default_count_each() -> u32 {
    1
}

// ============================================================================
// Raw rows (as they appear in TOML)
// ============================================================================

/// A quest data file: any number of `[[quest]]` rows
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuestFile {
    #[serde(default)]
    pub quest: Vec<RawQuest>,
}

/// One quest row. Objectives are keyed by step index, grouped per type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuest {
    pub id: QuestId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub quest_type: QuestType,
    #[serde(default)]
    pub rewards: Rewards,
    /// Placed actors switched quest-relevant while this quest is active
    #[serde(default)]
    pub references: Vec<Tag>,
    #[serde(default)]
    pub go_to: BTreeMap<String, RawGoTo>,
    #[serde(default)]
    pub talk_with: BTreeMap<String, RawTalkWith>,
    #[serde(default)]
    pub kill: BTreeMap<String, RawKill>,
    #[serde(default)]
    pub gather: BTreeMap<String, RawGather>,
    #[serde(default)]
    pub catch: BTreeMap<String, RawCatch>,
}

/// Fields shared by every objective row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObjectiveCommon {
    #[serde(default)]
    pub description: String,
    /// Bind to a pre-placed actor with this tag instead of spawning
    pub actor_reference: Option<Tag>,
    #[serde(default)]
    pub requires_all_players: bool,
    #[serde(default)]
    pub rewards: Rewards,
    #[serde(default)]
    pub marker: MarkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGoTo {
    #[serde(flatten)]
    pub common: RawObjectiveCommon,
    pub place: Tag,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTalkWith {
    #[serde(flatten)]
    pub common: RawObjectiveCommon,
    pub entity: Tag,
    pub spawn: Option<ActorSpawn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawKill {
    #[serde(flatten)]
    pub common: RawObjectiveCommon,
    pub entity: Tag,
    #[serde(default = "default_amount")]
    pub amount: u32,
    pub spawn: Option<SpawnBatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGather {
    #[serde(flatten)]
    pub common: RawObjectiveCommon,
    pub item: Tag,
    pub amount: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCatch {
    #[serde(flatten)]
    pub common: RawObjectiveCommon,
    pub allowed: Vec<Tag>,
    #[serde(default = "default_amount")]
    pub amount: u32,
}

fn default_amount() -> u32 {
    1
}

// ============================================================================
// Resolved definitions
// ============================================================================

/// Type-specific part of an objective template
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveSpec {
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
        spawn: Option<SpawnBatch>,
    },
    Gather {
        item: Tag,
        amount: f32,
    },
    Catch {
        allowed: Vec<Tag>,
        amount: u32,
    },
}

/// An objective template inside a quest definition
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDefinition {
    pub step: StepIndex,
    pub description: String,
    pub actor_reference: Option<Tag>,
    pub requires_all_players: bool,
    pub rewards: Rewards,
    pub marker: MarkerConfig,
    pub spec: ObjectiveSpec,
}

/// A fully resolved, immutable quest template
#[derive(Debug, Clone, PartialEq)]
pub struct QuestDefinition {
    pub id: QuestId,
    pub name: String,
    pub description: String,
    pub quest_type: QuestType,
    pub rewards: Rewards,
    pub references: Vec<Tag>,
    /// Sorted ascending by step
    pub objectives: Vec<ObjectiveDefinition>,
}

impl QuestDefinition {
    /// Resolve and validate a raw row
    pub fn from_raw(raw: &RawQuest) -> Result<Self, QuestError> {
        let invalid = |reason: String| {
            QuestError::InvalidDefinition(format!("quest {} ('{}'): {}", raw.id, raw.name, reason))
        };

        let mut objectives = Vec::new();

        for (key, row) in &raw.go_to {
            check_tag(&row.place, "go_to place").map_err(&invalid)?;
            let spec = ObjectiveSpec::GoTo {
                place: row.place.clone(),
            };
            objectives.push(resolve(key, &row.common, spec).map_err(&invalid)?);
        }

        for (key, row) in &raw.talk_with {
            check_tag(&row.entity, "talk_with entity").map_err(&invalid)?;
            let spec = ObjectiveSpec::TalkWith {
                entity: row.entity.clone(),
                spawn: row.spawn.clone(),
            };
            objectives.push(resolve(key, &row.common, spec).map_err(&invalid)?);
        }

        for (key, row) in &raw.kill {
            check_tag(&row.entity, "kill entity").map_err(&invalid)?;
            if row.amount == 0 {
                return Err(invalid(format!("kill step {} has amount 0", key)));
            }
            if let Some(batch) = &row.spawn {
                check_spawn_batch(batch)
                    .map_err(|reason| invalid(format!("kill step {}: {}", key, reason)))?;
            }
            let spec = ObjectiveSpec::Kill {
                entity: row.entity.clone(),
                amount: row.amount,
                spawn: row.spawn.clone(),
            };
            objectives.push(resolve(key, &row.common, spec).map_err(&invalid)?);
        }

        for (key, row) in &raw.gather {
            check_tag(&row.item, "gather item").map_err(&invalid)?;
            if !(row.amount.is_finite() && row.amount > 0.0) {
                return Err(invalid(format!(
                    "gather step {} needs a positive finite amount",
                    key
                )));
            }
            let spec = ObjectiveSpec::Gather {
                item: row.item.clone(),
                amount: row.amount,
            };
            objectives.push(resolve(key, &row.common, spec).map_err(&invalid)?);
        }

        for (key, row) in &raw.catch {
            if row.allowed.is_empty() {
                return Err(invalid(format!("catch step {} allows no tags", key)));
            }
            for tag in &row.allowed {
                check_tag(tag, "catch tag").map_err(&invalid)?;
            }
            if row.amount == 0 {
                return Err(invalid(format!("catch step {} has amount 0", key)));
            }
            let spec = ObjectiveSpec::Catch {
                allowed: row.allowed.clone(),
                amount: row.amount,
            };
            objectives.push(resolve(key, &row.common, spec).map_err(&invalid)?);
        }

        if objectives.is_empty() {
            return Err(invalid("no objectives".to_string()));
        }

        objectives.sort_by_key(|o| o.step);

        let mut seen = HashSet::new();
        for objective in &objectives {
            if !seen.insert(objective.step) {
                return Err(invalid(format!("step {} is defined more than once", objective.step)));
            }
        }

        Ok(Self {
            id: raw.id,
            name: raw.name.clone(),
            description: raw.description.clone(),
            quest_type: raw.quest_type,
            rewards: raw.rewards.clone(),
            references: raw.references.clone(),
            objectives,
        })
    }

    /// Get an objective template by step index
    pub fn objective(&self, step: StepIndex) -> Option<&ObjectiveDefinition> {
        self.objectives.iter().find(|o| o.step == step)
    }

    /// Number of objectives
    pub fn step_count(&self) -> usize {
        self.objectives.len()
    }
}

fn resolve(
    key: &str,
    common: &RawObjectiveCommon,
    spec: ObjectiveSpec,
) -> Result<ObjectiveDefinition, String> {
    let step: StepIndex = key
        .trim()
        .parse()
        .map_err(|_| format!("step key '{}' is not a step index", key))?;

    if let Some(reference) = &common.actor_reference {
        check_tag(reference, "actor_reference")?;
    }

    Ok(ObjectiveDefinition {
        step,
        description: common.description.clone(),
        actor_reference: common.actor_reference.clone(),
        requires_all_players: common.requires_all_players,
        rewards: common.rewards.clone(),
        marker: common.marker.clone(),
        spec,
    })
}

/// Spawn batches must scatter around a finite point within a finite range
fn check_spawn_batch(batch: &SpawnBatch) -> Result<(), String> {
    let center = batch.center;
    if ![center.x, center.y, center.z].iter().all(|c| c.is_finite()) {
        return Err("spawn center is not finite".to_string());
    }
    if !(batch.range.is_finite() && batch.range >= 0.0) {
        return Err(format!("spawn range {} is not a finite radius >= 0", batch.range));
    }
    Ok(())
}

fn check_tag(tag: &Tag, what: &str) -> Result<(), String> {
    if tag.is_empty() {
        Err(format!("{} is empty", what))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> RawQuestFile {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn test_resolve_orders_steps_across_types() {
        let source = r#"
[[quest]]
id = 1
name = "First Steps"
type = "main"
rewards = { xp = 100.0, gold = 20.0 }

[quest.kill.1]
description = "Defeat the dinosaurs"
entity = "Enemy.Dinossaur"
amount = 2

[quest.go_to.0]
description = "Travel to Kanto"
place = "Location.Kanto"
"#;
        let file = parse(source);
        let quest = QuestDefinition::from_raw(&file.quest[0]).unwrap();

        assert_eq!(quest.id, 1);
        assert_eq!(quest.quest_type, QuestType::Main);
        assert_eq!(quest.rewards.get(&RewardKind::Xp), Some(&100.0));
        let steps: Vec<_> = quest.objectives.iter().map(|o| o.step).collect();
        assert_eq!(steps, vec![0, 1]);
        assert!(matches!(quest.objectives[0].spec, ObjectiveSpec::GoTo { .. }));
        assert!(matches!(quest.objectives[1].spec, ObjectiveSpec::Kill { amount: 2, .. }));
    }

    #[test]
    fn test_rejects_duplicate_step() {
        let source = r#"
[[quest]]
id = 2
name = "Clash"

[quest.go_to.0]
place = "Location.A"

[quest.talk_with.0]
entity = "Npc.B"
"#;
        let file = parse(source);
        let err = QuestDefinition::from_raw(&file.quest[0]).unwrap_err();
        assert!(matches!(err, QuestError::InvalidDefinition(_)));
    }

    #[test]
    fn test_rejects_bad_rows() {
        let source = r#"
[[quest]]
id = 3
name = "Empty"

[[quest]]
id = 4
name = "Bad key"
[quest.go_to.first]
place = "Location.A"

[[quest]]
id = 5
name = "Zero kills"
[quest.kill.0]
entity = "Enemy.Slime"
amount = 0

[[quest]]
id = 6
name = "No catch tags"
[quest.catch.0]
allowed = []

[[quest]]
id = 8
name = "NaN spawn range"
[quest.kill.0]
entity = "Enemy.Slime"
amount = 1
spawn = { templates = ["Slime"], range = nan }

[[quest]]
id = 9
name = "Infinite spawn range"
[quest.kill.0]
entity = "Enemy.Slime"
amount = 1
spawn = { templates = ["Slime"], range = inf }

[[quest]]
id = 10
name = "Negative spawn range"
[quest.kill.0]
entity = "Enemy.Slime"
amount = 1
spawn = { templates = ["Slime"], range = -5.0 }

[[quest]]
id = 11
name = "Infinite spawn center"
[quest.kill.0]
entity = "Enemy.Slime"
amount = 1
spawn = { templates = ["Slime"], center = { x = -inf }, range = 10.0 }

[[quest]]
id = 12
name = "NaN gather amount"
[quest.gather.0]
item = "Item.Herb"
amount = nan
"#;
        let file = parse(source);
        assert_eq!(file.quest.len(), 9);
        for raw in &file.quest {
            assert!(
                QuestDefinition::from_raw(raw).is_err(),
                "quest {} should be rejected",
                raw.id
            );
        }
    }

    #[test]
    fn test_gather_accepts_fractional_amount() {
        let source = r#"
[[quest]]
id = 7
name = "Herbs"
type = "errand"

[quest.gather.0]
item = "Item.Herb"
amount = 2.5
marker = { create_marker = true, show_on_compass = true }
"#;
        let file = parse(source);
        let quest = QuestDefinition::from_raw(&file.quest[0]).unwrap();
        assert_eq!(quest.quest_type, QuestType::Errand);
        let objective = quest.objective(0).unwrap();
        assert!(objective.marker.create_marker);
        assert!(matches!(objective.spec, ObjectiveSpec::Gather { amount, .. } if amount == 2.5));
    }
}
