//! Quest Event Types
//!
//! Gameplay events routed into objectives, the per-objective results the
//! router hands back, and the notifications broadcast to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definition::{QuestId, Rewards, StepIndex, Tag};
use crate::world::PlayerId;

/// Events that can trigger quest progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestEvent {
    /// Player entered a location trigger
    Arrived {
        player: PlayerId,
        place: Tag,
    },

    /// Player left a location trigger
    Left {
        player: PlayerId,
        place: Tag,
    },

    /// Player talked to a tagged entity
    TalkedTo {
        player: PlayerId,
        entity: Tag,
    },

    /// Player killed a tagged entity
    Killed {
        player: PlayerId,
        entity: Tag,
    },

    /// Player gathered some quantity of an item
    Gathered {
        player: PlayerId,
        item: Tag,
        amount: f32,
    },

    /// Player caught something carrying this tag
    Caught {
        player: PlayerId,
        tag: Tag,
    },
}

impl QuestEvent {
    /// Get the player that triggered this event
    pub fn player_id(&self) -> &PlayerId {
        match self {
            QuestEvent::Arrived { player, .. } => player,
            QuestEvent::Left { player, .. } => player,
            QuestEvent::TalkedTo { player, .. } => player,
            QuestEvent::Killed { player, .. } => player,
            QuestEvent::Gathered { player, .. } => player,
            QuestEvent::Caught { player, .. } => player,
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::Arrived { .. } => "arrived",
            QuestEvent::Left { .. } => "left",
            QuestEvent::TalkedTo { .. } => "talked_to",
            QuestEvent::Killed { .. } => "killed",
            QuestEvent::Gathered { .. } => "gathered",
            QuestEvent::Caught { .. } => "caught",
        }
    }

    /// The tag this event carries
    pub fn tag(&self) -> &Tag {
        match self {
            QuestEvent::Arrived { place, .. } | QuestEvent::Left { place, .. } => place,
            QuestEvent::TalkedTo { entity, .. } | QuestEvent::Killed { entity, .. } => entity,
            QuestEvent::Gathered { item, .. } => item,
            QuestEvent::Caught { tag, .. } => tag,
        }
    }
}

/// Result of feeding an event to one objective
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveUpdate {
    pub quest_id: QuestId,
    pub step: StepIndex,
    /// Progress after the event
    pub current: f32,
    pub target: f32,
    /// Whether the objective just completed
    pub objective_completed: bool,
    /// Whether the whole quest is now complete (finalized next tick)
    pub quest_completed: bool,
}

/// Broadcast to observers and game systems (UI, reward granting)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestNotification {
    QuestActivated {
        quest_id: QuestId,
        step: StepIndex,
    },
    ObjectiveProgressed {
        quest_id: QuestId,
        step: StepIndex,
        current: f32,
        target: f32,
    },
    StepCompleted {
        quest_id: QuestId,
        step: StepIndex,
        rewards: Rewards,
    },
    QuestCompleted {
        quest_id: QuestId,
        rewards: Rewards,
        completed_at: DateTime<Utc>,
    },
    LocationEntered {
        player: PlayerId,
        place: Tag,
    },
    LocationLeft {
        player: PlayerId,
        place: Tag,
    },
}

impl QuestNotification {
    pub fn quest_id(&self) -> Option<QuestId> {
        match self {
            QuestNotification::QuestActivated { quest_id, .. }
            | QuestNotification::ObjectiveProgressed { quest_id, .. }
            | QuestNotification::StepCompleted { quest_id, .. }
            | QuestNotification::QuestCompleted { quest_id, .. } => Some(*quest_id),
            QuestNotification::LocationEntered { .. }
            | QuestNotification::LocationLeft { .. } => None,
        }
    }
}
