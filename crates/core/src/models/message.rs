//! Message model for room chat

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum message body length after trimming
pub const MAX_BODY_LEN: usize = 4096;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderRole {
    Supplier,
    Buyer,
    System,
}

impl SenderRole {
    pub fn as_u8(self) -> u8 {
        match self {
            SenderRole::Supplier => 1,
            SenderRole::Buyer => 2,
            SenderRole::System => 3,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SenderRole::Supplier,
            2 => SenderRole::Buyer,
            _ => SenderRole::System,
        }
    }
}

/// Message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    /// Automatic messages (e.g. the room greeting). May have an empty body.
    System,
}

impl MessageKind {
    pub fn as_u8(self) -> u8 {
        match self {
            MessageKind::Text => 1,
            MessageKind::System => 2,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            2 => MessageKind::System,
            _ => MessageKind::Text,
        }
    }
}

/// A chat message in a room
///
/// Immutable once appended. `seq` is allocated by the log: strictly
/// increasing per room with no gaps, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub seq: u64,
    pub sender_id: Uuid,
    pub sender_role: SenderRole,
    pub body: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether the recipient has read this message, given their watermark
    pub fn is_read_at(&self, watermark: u64) -> bool {
        watermark >= self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_read_at_watermark_boundary() {
        let message = Message {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            seq: 5,
            sender_id: Uuid::new_v4(),
            sender_role: SenderRole::Supplier,
            body: "offer stands".to_string(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
        };

        assert!(!message.is_read_at(4));
        assert!(message.is_read_at(5));
        assert!(message.is_read_at(6));
    }
}
