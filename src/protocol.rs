use serde::{Deserialize, Serialize};

use crate::error::QuestError;
use crate::quest::{QuestEvent, QuestId, QuestNotification, ReplicatedQuestState, StepIndex};

/// Leading element of every frame
pub const PROTOCOL_CODE: u8 = 13;

// ============================================================================
// Observer -> Authority Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ActivateQuest {
        quest_id: QuestId,
        #[serde(default)]
        start_at: StepIndex,
        #[serde(default)]
        focus: bool,
    },
    FocusQuest {
        quest_id: QuestId,
    },
    /// A player action observed locally, applied by the authority
    Gameplay {
        event: QuestEvent,
    },
}

impl ClientMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ClientMessage::ActivateQuest { .. } => "activate_quest",
            ClientMessage::FocusQuest { .. } => "focus_quest",
            ClientMessage::Gameplay { .. } => "gameplay",
        }
    }
}

// ============================================================================
// Authority -> Observer Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    QuestState {
        state: ReplicatedQuestState,
    },
    Notification {
        notification: QuestNotification,
    },
}

impl ServerMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ServerMessage::QuestState { .. } => "quest_state",
            ServerMessage::Notification { .. } => "notification",
        }
    }
}

// ============================================================================
// Encoding/Decoding
// ============================================================================

/// Frame layout: [13, "msg_type", {message}]
fn encode<T: Serialize>(msg_type: &str, msg: &T) -> Result<Vec<u8>, QuestError> {
    rmp_serde::to_vec_named(&(PROTOCOL_CODE, msg_type, msg))
        .map_err(|e| QuestError::Protocol(format!("Failed to encode message: {}", e)))
}

fn decode<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<(String, T), QuestError> {
    let (code, msg_type, msg): (u8, String, T) = rmp_serde::from_slice(data)
        .map_err(|e| QuestError::Protocol(format!("Failed to decode MessagePack: {}", e)))?;

    if code != PROTOCOL_CODE {
        return Err(QuestError::Protocol(format!("Unexpected protocol code: {}", code)));
    }
    Ok((msg_type, msg))
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, QuestError> {
    encode(msg.msg_type(), msg)
}

pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, QuestError> {
    let (msg_type, msg): (String, ServerMessage) = decode(data)?;
    if msg_type != msg.msg_type() {
        return Err(QuestError::Protocol(format!(
            "Frame type '{}' does not match payload '{}'",
            msg_type,
            msg.msg_type()
        )));
    }
    Ok(msg)
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, QuestError> {
    encode(msg.msg_type(), msg)
}

pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, QuestError> {
    let (msg_type, msg): (String, ClientMessage) = decode(data)?;
    if msg_type != msg.msg_type() {
        return Err(QuestError::Protocol(format!(
            "Frame type '{}' does not match payload '{}'",
            msg_type,
            msg.msg_type()
        )));
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::{ActiveQuestEntry, RewardKind, Rewards, Tag};
    use crate::world::PlayerId;
    use std::collections::BTreeSet;

    #[test]
    fn test_snapshot_survives_the_wire() {
        let state = ReplicatedQuestState {
            revision: 7,
            active: vec![ActiveQuestEntry {
                quest_id: 1,
                current_step: 1,
                focused: true,
            }],
            completed: BTreeSet::from([2, 5]),
        };
        let msg = ServerMessage::QuestState { state };

        let bytes = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_notification_and_gameplay_messages() {
        let msg = ServerMessage::Notification {
            notification: QuestNotification::StepCompleted {
                quest_id: 1,
                step: 0,
                rewards: Rewards::from([(RewardKind::Gold, 10.0)]),
            },
        };
        let bytes = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&bytes).unwrap(), msg);

        let msg = ClientMessage::Gameplay {
            event: QuestEvent::Gathered {
                player: PlayerId::new("p1"),
                item: Tag::new("Item.Herb"),
                amount: 0.5,
            },
        };
        let bytes = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_rejects_bad_frames() {
        let wrong_code = rmp_serde::to_vec_named(&(
            1u8,
            "focus_quest",
            ClientMessage::FocusQuest { quest_id: 1 },
        ))
        .unwrap();
        assert!(matches!(
            decode_client_message(&wrong_code),
            Err(QuestError::Protocol(_))
        ));

        let mismatched = rmp_serde::to_vec_named(&(
            PROTOCOL_CODE,
            "gameplay",
            ClientMessage::FocusQuest { quest_id: 1 },
        ))
        .unwrap();
        assert!(decode_client_message(&mismatched).is_err());

        assert!(decode_client_message(&[0xc1]).is_err());
    }
}
