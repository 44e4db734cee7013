//! Quest State Tracking
//!
//! Active quest entries with their step cursors, the focused quest, and the
//! set of completed quests. This is the only quest state that replicates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::definition::{QuestId, StepIndex};

/// Runtime record of a quest being pursued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveQuestEntry {
    pub quest_id: QuestId,
    pub current_step: StepIndex,
    /// The quest surfaced to the primary UI
    pub focused: bool,
}

/// Snapshot pushed from the authority to observers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplicatedQuestState {
    pub revision: u64,
    pub active: Vec<ActiveQuestEntry>,
    pub completed: BTreeSet<QuestId>,
}

impl ReplicatedQuestState {
    pub fn focused(&self) -> Option<&ActiveQuestEntry> {
        self.active.iter().find(|e| e.focused)
    }

    pub fn entry(&self, quest_id: QuestId) -> Option<&ActiveQuestEntry> {
        self.active.iter().find(|e| e.quest_id == quest_id)
    }
}

/// Tracks active and completed quests
#[derive(Debug, Clone, Default)]
pub struct QuestStateTracker {
    /// Insertion order is routing order
    active: Vec<ActiveQuestEntry>,
    completed: BTreeSet<QuestId>,
    revision: u64,
}

impl QuestStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn active(&self) -> &[ActiveQuestEntry] {
        &self.active
    }

    /// Active quest IDs in insertion order
    pub fn active_ids(&self) -> Vec<QuestId> {
        self.active.iter().map(|e| e.quest_id).collect()
    }

    pub fn entry(&self, quest_id: QuestId) -> Option<&ActiveQuestEntry> {
        self.active.iter().find(|e| e.quest_id == quest_id)
    }

    pub fn is_active(&self, quest_id: QuestId) -> bool {
        self.entry(quest_id).is_some()
    }

    pub fn is_completed(&self, quest_id: QuestId) -> bool {
        self.completed.contains(&quest_id)
    }

    pub fn completed(&self) -> &BTreeSet<QuestId> {
        &self.completed
    }

    /// Add an active entry. Returns false if the quest was already active,
    /// in which case only its cursor is moved.
    pub fn add_active(&mut self, quest_id: QuestId, step: StepIndex) -> bool {
        self.completed.remove(&quest_id);
        let added = match self.active.iter_mut().find(|e| e.quest_id == quest_id) {
            Some(entry) => {
                entry.current_step = step;
                false
            }
            None => {
                self.active.push(ActiveQuestEntry {
                    quest_id,
                    current_step: step,
                    focused: false,
                });
                true
            }
        };
        self.touch();
        added
    }

    /// Move the step cursor of an active quest
    pub fn set_step(&mut self, quest_id: QuestId, step: StepIndex) {
        if let Some(entry) = self.active.iter_mut().find(|e| e.quest_id == quest_id) {
            if entry.current_step != step {
                entry.current_step = step;
                self.touch();
            }
        }
    }

    /// Focus one active quest, unfocusing every other entry
    pub fn focus(&mut self, quest_id: QuestId) -> bool {
        if !self.is_active(quest_id) {
            return false;
        }
        for entry in &mut self.active {
            entry.focused = entry.quest_id == quest_id;
        }
        self.touch();
        true
    }

    pub fn focused(&self) -> Option<&ActiveQuestEntry> {
        self.active.iter().find(|e| e.focused)
    }

    /// Drop an active entry. If it held focus, the oldest remaining entry
    /// takes it.
    pub fn remove_active(&mut self, quest_id: QuestId) -> bool {
        let Some(index) = self.active.iter().position(|e| e.quest_id == quest_id) else {
            return false;
        };
        let removed = self.active.remove(index);
        if removed.focused {
            if let Some(next) = self.active.first_mut() {
                next.focused = true;
            }
        }
        self.touch();
        true
    }

    /// Move a quest from the active list into the completed set
    pub fn mark_completed(&mut self, quest_id: QuestId) {
        self.remove_active(quest_id);
        self.completed.insert(quest_id);
        self.touch();
    }

    /// Remove a quest from the completed set (before reactivation)
    pub fn unmark_completed(&mut self, quest_id: QuestId) -> bool {
        let removed = self.completed.remove(&quest_id);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn snapshot(&self) -> ReplicatedQuestState {
        ReplicatedQuestState {
            revision: self.revision,
            active: self.active.clone(),
            completed: self.completed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_focus_and_complete() {
        let mut tracker = QuestStateTracker::new();
        assert!(tracker.add_active(1, 0));
        assert!(tracker.add_active(2, 0));
        assert!(!tracker.add_active(1, 3));
        assert_eq!(tracker.entry(1).unwrap().current_step, 3);

        assert!(tracker.focus(1));
        assert!(tracker.focus(2));
        assert_eq!(tracker.focused().map(|e| e.quest_id), Some(2));
        assert_eq!(tracker.active().iter().filter(|e| e.focused).count(), 1);

        tracker.mark_completed(2);
        assert!(tracker.is_completed(2));
        assert!(!tracker.is_active(2));
        // Focus falls back to the oldest remaining quest
        assert_eq!(tracker.focused().map(|e| e.quest_id), Some(1));
    }

    #[test]
    fn test_never_active_and_completed() {
        let mut tracker = QuestStateTracker::new();
        tracker.add_active(5, 0);
        tracker.mark_completed(5);
        tracker.add_active(5, 0);
        assert!(tracker.is_active(5));
        assert!(!tracker.is_completed(5));
    }

    #[test]
    fn test_remove_active() {
        let mut tracker = QuestStateTracker::new();
        tracker.add_active(1, 0);
        tracker.add_active(2, 4);
        tracker.focus(2);

        assert!(tracker.remove_active(2));
        assert!(!tracker.remove_active(2));
        assert!(!tracker.is_completed(2));
        assert_eq!(tracker.active_ids(), vec![1]);
        assert_eq!(tracker.focused().map(|e| e.quest_id), Some(1));
    }

    #[test]
    fn test_focus_requires_active() {
        let mut tracker = QuestStateTracker::new();
        assert!(!tracker.focus(1));
        assert!(tracker.focused().is_none());
    }

    #[test]
    fn test_revision_moves_on_change() {
        let mut tracker = QuestStateTracker::new();
        let r0 = tracker.revision();
        tracker.add_active(1, 0);
        let r1 = tracker.revision();
        assert!(r1 > r0);

        tracker.set_step(1, 0);
        assert_eq!(tracker.revision(), r1);
        tracker.set_step(1, 1);
        assert!(tracker.revision() > r1);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.revision, tracker.revision());
        assert_eq!(snapshot.entry(1).map(|e| e.current_step), Some(1));
    }
}
