//! Quest Engine Errors

use crate::quest::{QuestId, StepIndex};

/// Errors surfaced by the quest engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuestError {
    /// A quest ID that does not exist in the registry
    #[error("quest {0} not found")]
    QuestNotFound(QuestId),

    /// A step index that does not exist inside its quest
    #[error("quest {quest_id} has no step {step}")]
    StepNotFound { quest_id: QuestId, step: StepIndex },

    /// A mutating operation invoked on a non-authoritative manager
    #[error("'{0}' can only run on the authority")]
    AuthorityViolation(&'static str),

    /// A quest definition row that failed validation
    #[error("invalid quest definition: {0}")]
    InvalidDefinition(String),

    /// Failure reading or parsing data files
    #[error("failed to load quest data: {0}")]
    Load(String),

    /// Failure encoding or decoding a wire message
    #[error("protocol error: {0}")]
    Protocol(String),
}
