//! Quest System Module
//!
//! Quests are ordered sequences of typed objectives. Definitions load once
//! from TOML into the registry; the manager owns the live copies, routes
//! gameplay events into them and publishes the replicated state.

pub mod definition;
pub mod events;
pub mod instance;
pub mod manager;
pub mod objective;
pub mod registry;
pub mod router;
pub mod state;

pub use definition::{
    ActorSpawn, MarkerConfig, ObjectiveDefinition, ObjectiveSpec, QuestDefinition, QuestId,
    QuestType, RewardKind, Rewards, SpawnBatch, StepIndex, Tag,
};
pub use events::{ObjectiveUpdate, QuestEvent, QuestNotification};
pub use instance::Quest;
pub use manager::{QuestManager, Role};
pub use objective::{Applied, Objective, ObjectiveKind, ObjectiveType, Progress};
pub use registry::QuestRegistry;
pub use state::{ActiveQuestEntry, QuestStateTracker, ReplicatedQuestState};
