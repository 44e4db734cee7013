//! Questline
//!
//! Quest and objective tracking for an authoritative game server. The
//! `quest` module holds the engine; `world` describes what it needs from
//! the host game; `replication` and `protocol` carry its state to observers.

pub mod config;
pub mod console;
pub mod error;
pub mod protocol;
pub mod quest;
pub mod replication;
pub mod world;

pub use error::QuestError;
