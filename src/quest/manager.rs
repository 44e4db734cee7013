//! Quest Manager
//!
//! The authoritative owner of live quest state. Every mutation goes through
//! here: activation, step advancement, deferred completion and event
//! routing. A manager built with `Role::Observer` rejects all of them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use super::definition::{QuestId, StepIndex, Tag};
use super::events::{ObjectiveUpdate, QuestEvent, QuestNotification};
use super::instance::Quest;
use super::objective::Objective;
use super::registry::QuestRegistry;
use super::router;
use super::state::{ActiveQuestEntry, QuestStateTracker, ReplicatedQuestState};
use crate::error::QuestError;
use crate::protocol::ClientMessage;
use crate::world::QuestWorld;

/// Who is allowed to mutate quest state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Observer,
}

pub struct QuestManager {
    role: Role,
    registry: Arc<QuestRegistry>,
    /// One live instance per registry entry, keyed by quest ID
    quests: BTreeMap<QuestId, Quest>,
    tracker: QuestStateTracker,
    /// Quests to finalize on the next tick
    pending_completions: Vec<QuestId>,
    notifications: Vec<QuestNotification>,
    rng: StdRng,
    published_revision: Option<u64>,
}

impl QuestManager {
    pub fn new(registry: Arc<QuestRegistry>, role: Role) -> Self {
        Self::with_rng(registry, role, StdRng::from_entropy())
    }

    /// Deterministic spawn offsets
    pub fn with_seed(registry: Arc<QuestRegistry>, role: Role, seed: u64) -> Self {
        Self::with_rng(registry, role, StdRng::seed_from_u64(seed))
    }

    fn with_rng(registry: Arc<QuestRegistry>, role: Role, rng: StdRng) -> Self {
        let quests = registry
            .iter()
            .map(|def| (def.id, Quest::from_definition(def)))
            .collect();

        Self {
            role,
            registry,
            quests,
            tracker: QuestStateTracker::new(),
            pending_completions: Vec::new(),
            notifications: Vec::new(),
            rng,
            published_revision: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn registry(&self) -> &Arc<QuestRegistry> {
        &self.registry
    }

    fn ensure_authority(&self, operation: &'static str) -> Result<(), QuestError> {
        if self.role == Role::Authority {
            return Ok(());
        }
        warn!("Rejected '{}' on a non-authoritative quest manager", operation);
        Err(QuestError::AuthorityViolation(operation))
    }

    // ========================================================================
    // Activation and completion
    // ========================================================================

    /// Start (or restart) a quest at `start_at`. Steps below it are marked
    /// completed without running their side effects.
    pub fn activate(
        &mut self,
        world: &mut dyn QuestWorld,
        quest_id: QuestId,
        start_at: StepIndex,
        make_focused: bool,
    ) -> Result<(), QuestError> {
        self.ensure_authority("activate")?;
        let quest = lookup_mut(&mut self.quests, quest_id)?;

        if self.tracker.is_completed(quest_id) {
            info!("Reactivating completed quest {}", quest_id);
            self.tracker.unmark_completed(quest_id);
            quest.reset(world);
        } else if self.tracker.is_active(quest_id) && !quest.has_started() {
            let fast_forward = quest.current_objective().is_some_and(|o| o.step < start_at);
            if fast_forward {
                info!("Quest {} already active, moving it to step {}", quest_id, start_at);
                for objective in quest.objectives_mut() {
                    if objective.step < start_at {
                        objective.set_completed();
                        objective.deactivate(world, false);
                    }
                }
                match quest.current_objective().map(|o| o.step) {
                    Some(step) => {
                        quest.activate_objective(step, world, &mut self.rng)?;
                        self.tracker.set_step(quest_id, step);
                    }
                    None => {
                        warn!("Quest {} fast-forwarded past its last step", quest_id);
                        if !self.pending_completions.contains(&quest_id) {
                            self.pending_completions.push(quest_id);
                        }
                    }
                }
            } else {
                debug!("Quest {} already active, reasserting focus", quest_id);
            }
            if make_focused || self.tracker.focused().is_none() {
                self.tracker.focus(quest_id);
            }
            return Ok(());
        } else if quest.has_started() {
            info!("Quest {} already in progress, resetting", quest_id);
            quest.reset(world);
        }
        self.pending_completions.retain(|id| *id != quest_id);

        for objective in quest.objectives_mut() {
            if objective.step < start_at {
                objective.set_completed();
            }
        }

        switch_references(world, &quest.references, true);

        let step = match quest.current_objective().map(|o| o.step) {
            Some(step) => {
                quest.activate_objective(step, world, &mut self.rng)?;
                step
            }
            None => {
                warn!("Quest {} fast-forwarded past its last step", quest_id);
                if !self.pending_completions.contains(&quest_id) {
                    self.pending_completions.push(quest_id);
                }
                quest.steps().last().unwrap_or(start_at)
            }
        };

        info!("Activated quest {} ('{}') at step {}", quest_id, quest.name, step);
        self.tracker.add_active(quest_id, step);
        if make_focused || self.tracker.focused().is_none() {
            self.tracker.focus(quest_id);
        }
        self.notifications.push(QuestNotification::QuestActivated { quest_id, step });
        Ok(())
    }

    /// Finish one step and move the cursor to the next incomplete one
    pub fn advance_step(
        &mut self,
        world: &mut dyn QuestWorld,
        quest_id: QuestId,
        completed_step: StepIndex,
    ) -> Result<(), QuestError> {
        self.ensure_authority("advance_step")?;
        let Some(cursor) = self.tracker.entry(quest_id).map(|e| e.current_step) else {
            warn!("Cannot advance quest {}: not active", quest_id);
            return Ok(());
        };
        let quest = lookup_mut(&mut self.quests, quest_id)?;

        let objective = quest.objective_by_step_mut(completed_step).map_err(|e| {
            error!("{}", e);
            e
        })?;
        objective.set_completed();
        objective.deactivate(world, false);
        self.notifications.push(QuestNotification::StepCompleted {
            quest_id,
            step: completed_step,
            rewards: objective.rewards.clone(),
        });
        info!("Quest {} step {} completed", quest_id, completed_step);

        match quest.current_objective().map(|o| o.step) {
            Some(next) if next != cursor => {
                quest.activate_objective(next, world, &mut self.rng)?;
                self.tracker.set_step(quest_id, next);
            }
            Some(_) => {}
            None => self.complete_quest(quest_id)?,
        }
        Ok(())
    }

    /// Schedule finalization for the next tick
    pub fn complete_quest(&mut self, quest_id: QuestId) -> Result<(), QuestError> {
        self.ensure_authority("complete_quest")?;
        lookup_mut(&mut self.quests, quest_id)?;
        if !self.pending_completions.contains(&quest_id) {
            debug!("Quest {} scheduled for completion", quest_id);
            self.pending_completions.push(quest_id);
        }
        Ok(())
    }

    /// Finalize scheduled completions. Returns the quests that completed.
    pub fn tick(&mut self, world: &mut dyn QuestWorld) -> Vec<QuestId> {
        let pending = std::mem::take(&mut self.pending_completions);
        let mut finalized = Vec::new();

        for quest_id in pending {
            let Some(quest) = self.quests.get(&quest_id) else {
                continue;
            };
            if !quest.is_completed() {
                debug!("Quest {} is no longer complete, dropping completion", quest_id);
                continue;
            }

            self.tracker.mark_completed(quest_id);
            switch_references(world, &quest.references, false);
            self.notifications.push(QuestNotification::QuestCompleted {
                quest_id,
                rewards: quest.rewards.clone(),
                completed_at: Utc::now(),
            });
            info!("Quest {} ('{}') completed", quest_id, quest.name);
            finalized.push(quest_id);
        }
        finalized
    }

    /// Re-arm a quest and restart it at its first step
    pub fn reset_quest(
        &mut self,
        world: &mut dyn QuestWorld,
        quest_id: QuestId,
    ) -> Result<(), QuestError> {
        self.ensure_authority("reset_quest")?;
        let quest = lookup_mut(&mut self.quests, quest_id)?;

        let was_focused = self.tracker.focused().is_some_and(|e| e.quest_id == quest_id);
        quest.reset(world);
        switch_references(world, &quest.references, false);
        self.tracker.remove_active(quest_id);
        self.tracker.unmark_completed(quest_id);
        self.pending_completions.retain(|id| *id != quest_id);

        self.activate(world, quest_id, 0, was_focused)
    }

    /// Deactivate every active quest's actors (session teardown)
    pub fn shutdown(&mut self, world: &mut dyn QuestWorld) -> Result<(), QuestError> {
        self.ensure_authority("shutdown")?;
        for entry in self.tracker.active() {
            let Some(quest) = self.quests.get(&entry.quest_id) else {
                continue;
            };
            for objective in quest.objectives() {
                objective.deactivate(world, false);
            }
            switch_references(world, &quest.references, false);
        }
        info!("Quest manager shut down with {} active quests", self.tracker.active().len());
        Ok(())
    }

    // ========================================================================
    // Focus
    // ========================================================================

    /// Returns false if the quest is not active
    pub fn focus_quest(&mut self, quest_id: QuestId) -> Result<bool, QuestError> {
        self.ensure_authority("focus_quest")?;
        lookup_mut(&mut self.quests, quest_id)?;
        let focused = self.tracker.focus(quest_id);
        if !focused {
            warn!("Cannot focus quest {}: not active", quest_id);
        }
        Ok(focused)
    }

    pub fn focused_quest(&self) -> Option<&ActiveQuestEntry> {
        self.tracker.focused()
    }

    /// Current objective of the focused quest
    pub fn focused_objective(&self) -> Option<&Objective> {
        let entry = self.tracker.focused()?;
        self.quests.get(&entry.quest_id)?.current_objective()
    }

    pub fn is_current_objective(&self, quest_id: QuestId, step: StepIndex) -> bool {
        self.tracker
            .entry(quest_id)
            .is_some_and(|e| e.current_step == step)
            && self
                .quests
                .get(&quest_id)
                .and_then(Quest::current_objective)
                .is_some_and(|o| o.step == step)
    }

    // ========================================================================
    // Event routing
    // ========================================================================

    /// Feed a gameplay event to every matching objective of every active quest
    pub fn route(
        &mut self,
        world: &mut dyn QuestWorld,
        event: &QuestEvent,
    ) -> Result<Vec<ObjectiveUpdate>, QuestError> {
        self.ensure_authority("route")?;

        if let Some(notification) = router::location_notification(event) {
            self.notifications.push(notification);
        }

        let player_count = world.player_count();
        let mut updates = Vec::new();

        for quest_id in self.tracker.active_ids() {
            let Some(quest) = self.quests.get_mut(&quest_id) else {
                continue;
            };
            let routed = router::dispatch(quest, event, player_count);
            for step in &routed.completed_steps {
                self.advance_step(world, quest_id, *step)?;
            }
            self.notifications.extend(router::progress_notifications(&routed.updates));
            updates.extend(routed.updates);
        }

        if updates.is_empty() {
            debug!(
                "Event {} '{}' from {} matched no active objective",
                event.event_type(),
                event.tag(),
                event.player_id()
            );
        } else {
            info!(
                "Event {} '{}' from {} updated quests {:?}",
                event.event_type(),
                event.tag(),
                event.player_id(),
                router::touched_quests(&updates)
            );
        }
        Ok(updates)
    }

    /// Apply a message forwarded by an observer
    pub fn handle_message(
        &mut self,
        world: &mut dyn QuestWorld,
        msg: ClientMessage,
    ) -> Result<(), QuestError> {
        match msg {
            ClientMessage::ActivateQuest { quest_id, start_at, focus } => {
                self.activate(world, quest_id, start_at, focus)
            }
            ClientMessage::FocusQuest { quest_id } => self.focus_quest(quest_id).map(|_| ()),
            ClientMessage::Gameplay { event } => self.route(world, &event).map(|_| ()),
        }
    }

    // ========================================================================
    // Queries and outputs
    // ========================================================================

    pub fn quest(&self, quest_id: QuestId) -> Result<&Quest, QuestError> {
        self.quests.get(&quest_id).ok_or_else(|| {
            error!("Quest {} has no live instance", quest_id);
            QuestError::QuestNotFound(quest_id)
        })
    }

    /// Active entries in insertion order
    pub fn active_quests(&self) -> &[ActiveQuestEntry] {
        self.tracker.active()
    }

    pub fn completed_quests(&self) -> &BTreeSet<QuestId> {
        self.tracker.completed()
    }

    pub fn has_pending_completions(&self) -> bool {
        !self.pending_completions.is_empty()
    }

    pub fn take_notifications(&mut self) -> Vec<QuestNotification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn snapshot(&self) -> ReplicatedQuestState {
        self.tracker.snapshot()
    }

    /// Snapshot to push to observers, if anything changed since the last one
    pub fn take_replication(&mut self) -> Option<ReplicatedQuestState> {
        let revision = self.tracker.revision();
        if self.published_revision == Some(revision) {
            return None;
        }
        self.published_revision = Some(revision);
        Some(self.tracker.snapshot())
    }
}

fn lookup_mut(
    quests: &mut BTreeMap<QuestId, Quest>,
    quest_id: QuestId,
) -> Result<&mut Quest, QuestError> {
    quests.get_mut(&quest_id).ok_or_else(|| {
        error!("Quest {} has no live instance", quest_id);
        QuestError::QuestNotFound(quest_id)
    })
}

/// Toggle quest relevance of the placed actors a quest references
fn switch_references(world: &mut dyn QuestWorld, references: &[Tag], active: bool) {
    for tag in references {
        let Some(actor) = world.find_tagged_actor(tag) else {
            warn!("No placed actor with quest reference tag '{}'", tag);
            continue;
        };
        if let Some(reactive) = world.reactive(actor) {
            reactive.set_quest_active(active, false);
        }
    }
}
