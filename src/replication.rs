//! Observer-side Replication
//!
//! Observers hold the statically loaded registry plus the last snapshot the
//! authority pushed. They never mutate quest state; player actions are
//! forwarded to the authority as `ClientMessage`s.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::quest::{
    ObjectiveDefinition, QuestEvent, QuestId, QuestNotification, QuestRegistry,
    ReplicatedQuestState, StepIndex,
};

/// Display state of one active quest, rebuilt from the registry
#[derive(Debug, Clone, PartialEq)]
pub struct QuestView<'a> {
    pub quest_id: QuestId,
    pub name: &'a str,
    pub current_step: StepIndex,
    pub focused: bool,
    /// Definition of the current step, if the step exists
    pub objective: Option<&'a ObjectiveDefinition>,
}

pub struct QuestObserver {
    registry: Arc<QuestRegistry>,
    state: ReplicatedQuestState,
    /// Whether any snapshot has been applied yet
    synced: bool,
}

impl QuestObserver {
    pub fn new(registry: Arc<QuestRegistry>) -> Self {
        Self {
            registry,
            state: ReplicatedQuestState::default(),
            synced: false,
        }
    }

    pub fn state(&self) -> &ReplicatedQuestState {
        &self.state
    }

    /// Apply a snapshot. Older revisions are ignored; returns whether it applied.
    pub fn apply(&mut self, snapshot: ReplicatedQuestState) -> bool {
        if self.synced && snapshot.revision <= self.state.revision {
            debug!(
                "Ignoring stale quest snapshot {} (have {})",
                snapshot.revision, self.state.revision
            );
            return false;
        }
        for entry in &snapshot.active {
            if !self.registry.contains(entry.quest_id) {
                warn!("Replicated quest {} is not in the local registry", entry.quest_id);
            }
        }
        self.state = snapshot;
        self.synced = true;
        true
    }

    /// Handle one message from the authority. Returns the notification, if any,
    /// for the UI layer.
    pub fn handle(&mut self, msg: ServerMessage) -> Option<QuestNotification> {
        match msg {
            ServerMessage::QuestState { state } => {
                self.apply(state);
                None
            }
            ServerMessage::Notification { notification } => Some(notification),
        }
    }

    pub fn is_completed(&self, quest_id: QuestId) -> bool {
        self.state.completed.contains(&quest_id)
    }

    /// Active quests as the UI shows them
    pub fn views(&self) -> Vec<QuestView<'_>> {
        self.state
            .active
            .iter()
            .filter_map(|entry| {
                let def = self.registry.find(entry.quest_id)?;
                Some(QuestView {
                    quest_id: entry.quest_id,
                    name: &def.name,
                    current_step: entry.current_step,
                    focused: entry.focused,
                    objective: def.objective(entry.current_step),
                })
            })
            .collect()
    }

    pub fn focused_view(&self) -> Option<QuestView<'_>> {
        self.views().into_iter().find(|v| v.focused)
    }

    /// Wrap a local player action for the authority
    pub fn forward(&self, event: QuestEvent) -> ClientMessage {
        ClientMessage::Gameplay { event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_server_message, encode_server_message};
    use crate::quest::definition::RawQuestFile;
    use crate::quest::{ActiveQuestEntry, QuestManager, Role, Tag};
    use crate::world::{PlayerId, SimulatedWorld, Vec3};

    fn registry() -> Arc<QuestRegistry> {
        let source = r#"
[[quest]]
id = 1
name = "Dino Trouble"

[quest.go_to.0]
description = "Travel to Kanto"
place = "Location.Kanto"

[quest.kill.1]
description = "Defeat 2 dinosaurs"
entity = "Enemy.Dinossaur"
amount = 2
"#;
        let file: RawQuestFile = toml::from_str(source).unwrap();
        Arc::new(QuestRegistry::load(file.quest))
    }

    fn snapshot(revision: u64, step: StepIndex) -> ReplicatedQuestState {
        ReplicatedQuestState {
            revision,
            active: vec![ActiveQuestEntry {
                quest_id: 1,
                current_step: step,
                focused: true,
            }],
            completed: Default::default(),
        }
    }

    #[test]
    fn test_stale_snapshots_are_ignored() {
        let mut observer = QuestObserver::new(registry());
        assert!(observer.apply(snapshot(0, 0)));
        assert!(observer.apply(snapshot(3, 1)));
        assert!(!observer.apply(snapshot(2, 0)));
        assert!(!observer.apply(snapshot(3, 0)));
        assert_eq!(observer.state().active[0].current_step, 1);
    }

    #[test]
    fn test_views_come_from_registry() {
        let mut observer = QuestObserver::new(registry());
        observer.apply(snapshot(1, 1));

        let view = observer.focused_view().unwrap();
        assert_eq!(view.name, "Dino Trouble");
        assert_eq!(
            view.objective.map(|o| o.description.as_str()),
            Some("Defeat 2 dinosaurs")
        );
    }

    #[test]
    fn test_views_skip_quests_missing_from_registry() {
        let mut observer = QuestObserver::new(registry());
        let mut state = snapshot(1, 0);
        state.active.push(ActiveQuestEntry {
            quest_id: 77,
            current_step: 0,
            focused: false,
        });
        observer.apply(state);

        let views = observer.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].quest_id, 1);
    }

    #[tokio::test]
    async fn test_authority_to_observer_over_channels() {
        let registry = registry();
        let mut authority = QuestManager::with_seed(registry.clone(), Role::Authority, 1);
        let mut observer = QuestObserver::new(registry);
        let mut world = SimulatedWorld::new();
        world.add_player(PlayerId::new("ash"));
        world.place_trigger(Tag::new("Location.Kanto"), Vec3::default());

        let (to_authority, mut from_observer) = tokio::sync::mpsc::channel::<ClientMessage>(8);
        let (broadcast_tx, mut broadcast_rx) = tokio::sync::broadcast::channel::<Vec<u8>>(8);

        authority.activate(&mut world, 1, 0, true).unwrap();
        to_authority
            .send(observer.forward(QuestEvent::Arrived {
                player: PlayerId::new("ash"),
                place: Tag::new("Location.Kanto"),
            }))
            .await
            .unwrap();

        let msg = from_observer.recv().await.unwrap();
        authority.handle_message(&mut world, msg).unwrap();
        let state = authority.take_replication().unwrap();
        broadcast_tx
            .send(encode_server_message(&ServerMessage::QuestState { state }).unwrap())
            .unwrap();

        let bytes = broadcast_rx.recv().await.unwrap();
        assert!(observer.handle(decode_server_message(&bytes).unwrap()).is_none());
        assert_eq!(observer.state().active[0].current_step, 1);
        assert!(!observer.is_completed(1));
    }
}
