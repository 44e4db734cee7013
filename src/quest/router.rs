//! Event Router
//!
//! Feeds one gameplay event into every matching incomplete objective of a
//! live quest. The manager walks active quests in insertion order and calls
//! into here once per quest; step advancement happens afterwards so no quest
//! is mutated while it is being scanned.

use super::definition::{QuestId, StepIndex};
use super::events::{ObjectiveUpdate, QuestEvent, QuestNotification};
use super::instance::Quest;
use super::objective::Applied;

/// What one event did to one quest
#[derive(Debug, Default)]
pub struct RoutedQuest {
    pub updates: Vec<ObjectiveUpdate>,
    /// Steps completed by this event, ascending
    pub completed_steps: Vec<StepIndex>,
}

impl RoutedQuest {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Apply `event` to every incomplete objective of `quest` that waits for it
pub fn dispatch(quest: &mut Quest, event: &QuestEvent, player_count: usize) -> RoutedQuest {
    let mut routed = RoutedQuest::default();

    for objective in quest.objectives_mut() {
        let applied = objective.apply(event, player_count);
        if applied == Applied::Unchanged {
            continue;
        }
        let completed = applied.is_completed();
        let progress = objective.progress();
        if completed {
            routed.completed_steps.push(objective.step);
        }
        routed.updates.push(ObjectiveUpdate {
            quest_id: objective.quest_id,
            step: objective.step,
            current: progress.current,
            target: progress.target,
            objective_completed: completed,
            quest_completed: false,
        });
    }

    if quest.is_completed() {
        for update in &mut routed.updates {
            update.quest_completed = true;
        }
    }
    routed
}

/// Location broadcasts that accompany arrival and departure events
pub fn location_notification(event: &QuestEvent) -> Option<QuestNotification> {
    match event {
        QuestEvent::Arrived { player, place } => Some(QuestNotification::LocationEntered {
            player: player.clone(),
            place: place.clone(),
        }),
        QuestEvent::Left { player, place } => Some(QuestNotification::LocationLeft {
            player: player.clone(),
            place: place.clone(),
        }),
        _ => None,
    }
}

/// Progress notifications for updates that did not complete their step
pub fn progress_notifications(
    updates: &[ObjectiveUpdate],
) -> impl Iterator<Item = QuestNotification> + '_ {
    updates
        .iter()
        .filter(|u| !u.objective_completed)
        .map(|u| QuestNotification::ObjectiveProgressed {
            quest_id: u.quest_id,
            step: u.step,
            current: u.current,
            target: u.target,
        })
}

/// Quests that an event touched, for logging
pub fn touched_quests(updates: &[ObjectiveUpdate]) -> Vec<QuestId> {
    let mut ids: Vec<QuestId> = updates.iter().map(|u| u.quest_id).collect();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::{QuestDefinition, RawQuestFile, Tag};
    use crate::world::PlayerId;

    fn hunt_quest() -> Quest {
        let source = r#"
[[quest]]
id = 3
name = "Hunt"

[quest.kill.0]
entity = "Enemy.Wolf"
amount = 2

[quest.kill.1]
entity = "Enemy.Wolf"
amount = 1

[quest.catch.2]
allowed = ["Fish.Bass"]
"#;
        let file: RawQuestFile = toml::from_str(source).unwrap();
        Quest::from_definition(&QuestDefinition::from_raw(&file.quest[0]).unwrap())
    }

    fn wolf() -> QuestEvent {
        QuestEvent::Killed {
            player: PlayerId::new("p1"),
            entity: Tag::new("Enemy.Wolf"),
        }
    }

    #[test]
    fn test_every_matching_objective_gets_the_event() {
        let mut quest = hunt_quest();
        let routed = dispatch(&mut quest, &wolf(), 1);

        assert_eq!(routed.updates.len(), 2);
        assert_eq!(routed.completed_steps, vec![1]);
        assert_eq!(routed.updates[0].current, 1.0);
        assert!(!routed.updates[0].objective_completed);
        assert!(!routed.updates[1].quest_completed);

        let routed = dispatch(&mut quest, &wolf(), 1);
        assert_eq!(routed.completed_steps, vec![0]);
        assert_eq!(progress_notifications(&routed.updates).count(), 0);
    }

    #[test]
    fn test_unmatched_event_is_empty() {
        let mut quest = hunt_quest();
        let carp = QuestEvent::Caught {
            player: PlayerId::new("p1"),
            tag: Tag::new("Fish.Carp"),
        };
        let routed = dispatch(&mut quest, &carp, 1);
        assert!(routed.is_empty());
        assert!(!quest.has_started());
    }

    #[test]
    fn test_location_notifications() {
        let left = QuestEvent::Left {
            player: PlayerId::new("p1"),
            place: Tag::new("Location.Kanto"),
        };
        assert!(matches!(
            location_notification(&left),
            Some(QuestNotification::LocationLeft { .. })
        ));
        assert!(location_notification(&wolf()).is_none());
    }
}
