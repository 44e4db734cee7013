//! Live Quest Instances
//!
//! A `Quest` is the mutable, per-session copy of a registry template. It
//! owns its objectives, sorted by step.

use rand::Rng;

use super::definition::{QuestDefinition, QuestId, QuestType, Rewards, StepIndex, Tag};
use super::objective::Objective;
use crate::error::QuestError;
use crate::world::QuestWorld;

#[derive(Debug, Clone)]
pub struct Quest {
    pub id: QuestId,
    pub name: String,
    pub description: String,
    pub quest_type: QuestType,
    pub rewards: Rewards,
    pub references: Vec<Tag>,
    objectives: Vec<Objective>,
}

impl Quest {
    /// Deep-copy a template into live objectives
    pub fn from_definition(def: &QuestDefinition) -> Self {
        Self {
            id: def.id,
            name: def.name.clone(),
            description: def.description.clone(),
            quest_type: def.quest_type,
            rewards: def.rewards.clone(),
            references: def.references.clone(),
            objectives: def
                .objectives
                .iter()
                .map(|o| Objective::from_definition(def.id, o))
                .collect(),
        }
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub(crate) fn objectives_mut(&mut self) -> &mut [Objective] {
        &mut self.objectives
    }

    /// True iff every objective is completed
    pub fn is_completed(&self) -> bool {
        self.objectives.iter().all(Objective::is_completed)
    }

    /// True iff any objective is completed
    pub fn has_started(&self) -> bool {
        self.objectives.iter().any(Objective::is_completed)
    }

    /// First incomplete objective in step order, `None` once the quest is done
    pub fn current_objective(&self) -> Option<&Objective> {
        self.objectives.iter().find(|o| !o.is_completed())
    }

    pub fn objective_by_step(&self, step: StepIndex) -> Result<&Objective, QuestError> {
        self.objectives
            .iter()
            .find(|o| o.step == step)
            .ok_or(QuestError::StepNotFound {
                quest_id: self.id,
                step,
            })
    }

    pub fn objective_by_step_mut(&mut self, step: StepIndex) -> Result<&mut Objective, QuestError> {
        let quest_id = self.id;
        self.objectives
            .iter_mut()
            .find(|o| o.step == step)
            .ok_or(QuestError::StepNotFound { quest_id, step })
    }

    /// Run the activation side effect of one step
    pub fn activate_objective<R: Rng>(
        &mut self,
        step: StepIndex,
        world: &mut dyn QuestWorld,
        rng: &mut R,
    ) -> Result<(), QuestError> {
        self.objective_by_step_mut(step)?.activate(world, rng);
        Ok(())
    }

    /// Re-arm every objective and drop associated-actor bindings
    pub fn reset(&mut self, world: &mut dyn QuestWorld) {
        for objective in &mut self.objectives {
            objective.deactivate(world, true);
            objective.clear_associated();
            objective.reset();
        }
    }

    /// Steps in order
    pub fn steps(&self) -> impl Iterator<Item = StepIndex> + '_ {
        self.objectives.iter().map(|o| o.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::definition::RawQuestFile;
    use crate::quest::events::QuestEvent;
    use crate::world::{PlayerId, SimulatedWorld};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn three_step_quest() -> Quest {
        let source = r#"
[[quest]]
id = 9
name = "Errands"
type = "side"

[quest.go_to.0]
place = "Location.Market"

[quest.talk_with.2]
entity = "Npc.Baker"

[quest.gather.5]
item = "Item.Flour"
amount = 3
"#;
        let file: RawQuestFile = toml::from_str(source).unwrap();
        Quest::from_definition(&QuestDefinition::from_raw(&file.quest[0]).unwrap())
    }

    fn complete_step(quest: &mut Quest, step: StepIndex) {
        quest.objective_by_step_mut(step).unwrap().set_completed();
    }

    #[test]
    fn test_completed_iff_all_objectives_complete() {
        // Complete in an arbitrary order
        for order in [[5, 0, 2], [2, 5, 0], [0, 2, 5]] {
            let mut quest = three_step_quest();
            for (i, step) in order.iter().enumerate() {
                assert!(!quest.is_completed());
                complete_step(&mut quest, *step);
                assert!(quest.has_started());
                assert_eq!(quest.is_completed(), i == order.len() - 1);
            }
        }
    }

    #[test]
    fn test_current_objective_is_lowest_incomplete() {
        let mut quest = three_step_quest();
        assert_eq!(quest.current_objective().map(|o| o.step), Some(0));

        complete_step(&mut quest, 0);
        assert_eq!(quest.current_objective().map(|o| o.step), Some(2));

        complete_step(&mut quest, 5);
        assert_eq!(quest.current_objective().map(|o| o.step), Some(2));

        complete_step(&mut quest, 2);
        assert!(quest.current_objective().is_none());
    }

    #[test]
    fn test_objective_by_step_not_found() {
        let quest = three_step_quest();
        assert!(quest.objective_by_step(2).is_ok());
        assert_eq!(
            quest.objective_by_step(1).unwrap_err(),
            QuestError::StepNotFound {
                quest_id: 9,
                step: 1
            }
        );
    }

    #[test]
    fn test_reset_twice_matches_reset_once() {
        let mut world = SimulatedWorld::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut quest = three_step_quest();

        quest.activate_objective(5, &mut world, &mut rng).unwrap();
        quest.objectives_mut()[2].apply(
            &QuestEvent::Gathered {
                player: PlayerId::new("p1"),
                item: Tag::new("Item.Flour"),
                amount: 1.0,
            },
            1,
        );
        complete_step(&mut quest, 0);

        quest.reset(&mut world);
        let state = |quest: &Quest| -> Vec<_> {
            quest
                .objectives()
                .iter()
                .map(|o| (o.is_completed(), o.progress()))
                .collect()
        };
        let once = state(&quest);
        quest.reset(&mut world);
        let twice = state(&quest);

        assert_eq!(once, twice);
        assert!(!quest.has_started());
        assert!(quest.objectives().iter().all(|o| o.progress().current == 0.0));
        assert!(quest.objectives().iter().all(|o| o.associated_actors().is_empty()));
    }
}
